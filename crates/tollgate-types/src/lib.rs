//! # Tollgate Types
//!
//! Core types, models, and error definitions for Tollgate.
//!
//! - **`error`** - Client-facing error taxonomy and configuration errors
//! - **`models`** - Proxy configuration and per-call stats records
//!
//! ## Architecture Role
//!
//! `tollgate-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        tollgate-types (this crate)
//!                │
//!                ▼
//!          tollgate-core
//!                │
//!                ▼
//!         tollgate-server
//! ```

pub mod error;
pub mod models;

pub use error::{ConfigError, ErrorKind};
pub use models::{
    AutoReplyRule, CompletionKind, PolicyAction, PolicyFlag, ProxyConfig, ReflectionMode,
    StatsMetadata, StatsRecord,
};
