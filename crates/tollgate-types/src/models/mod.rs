//! Core domain models for Tollgate.

mod config;
mod lenient;
mod policy;
mod stats;

pub use config::{AutoReplyRule, CompletionKind, ProxyConfig, ReflectionMode};
pub use policy::{PolicyAction, PolicyFlag};
pub use stats::{StatsMetadata, StatsRecord};
