//! # Tollgate Core
//!
//! Mediation pipeline between API clients and an upstream LLM service.
//!
//! ## Architecture
//!
//! ```text
//! tollgate-core/src/
//! ├── modules/                # local config loading, logging setup
//! └── proxy/
//!     ├── gatekeeper.rs       # credential validation
//!     ├── config_cache.rs     # bulk-swept tenant config cache
//!     ├── config_resolver.rs  # cache / fetch / fallback resolution
//!     ├── pipeline/           # processor contract + staged execution
//!     ├── processors/         # concrete policy checks
//!     ├── wordlist.rs         # regex wordlist scanning + redaction
//!     ├── upstream.rs         # upstream forwarder
//!     ├── stats.rs            # stats reporter
//!     ├── orchestrator.rs     # end-to-end call lifecycle
//!     └── server.rs           # axum entry adapter
//! ```
//!
//! Per call: Gatekeeper → Config Resolver → pre-call processors → Upstream
//! Forwarder → post-call processors → Stats Reporter.

#![cfg_attr(
    test,
    allow(clippy::panic, clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)
)]

pub mod error;
pub mod modules;
pub mod proxy;

pub use error::{AppError, AppResult};
pub use tollgate_types::{ErrorKind, ProxyConfig, StatsRecord};
