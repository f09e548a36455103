//! Process-level concerns: local configuration and logging setup.

pub mod config;
pub mod logger;
