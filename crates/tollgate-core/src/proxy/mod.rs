// Proxy mediation modules
pub mod config_cache;
pub mod config_resolver;
pub mod effective_config;
pub mod envelope;
pub mod gatekeeper;
pub mod headers;
pub mod orchestrator;
pub mod pipeline;
pub mod processors;
pub mod server;
pub mod stats;
pub mod upstream;
pub mod wordlist;

#[cfg(test)]
mod tests;

pub use config_cache::{spawn_sweeper, Clock, ConfigCache, SystemClock};
pub use config_resolver::{ConfigFailure, ConfigResolver, Resolution};
pub use effective_config::EffectiveConfig;
pub use envelope::ProxyResponse;
pub use gatekeeper::{Credentials, Denial, Gatekeeper};
pub use orchestrator::{InboundCall, Orchestrator};
pub use pipeline::{CallContext, CallState, PolicyPipeline, Processor, Stage};
pub use server::{build_proxy_router, AppState};
pub use stats::{StatsReporter, StatsUpload};
pub use upstream::{UpstreamForwarder, UpstreamReply};
pub use wordlist::{WordlistMatch, WordlistMatcher, WordlistSource};
