//! Typed error definitions for Tollgate.
//!
//! - **`ErrorKind`** is the client-visible taxonomy carried in every error body
//! - **`ConfigError`** covers loading and validating the local configuration

mod config;
mod kind;

pub use config::ConfigError;
pub use kind::ErrorKind;
