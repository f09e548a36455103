//! Logging setup.
//!
//! Structured logs go through `tracing`; the subscriber is installed once by
//! the binary. Per-call spans carry the `proxy_id` tag.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Install the global subscriber.
///
/// `filter` accepts anything `EnvFilter` does (`info`, `tollgate_core=debug,warn`).
pub fn init_logger(filter: &str, format: LogFormat) -> AppResult<()> {
    let env_filter = EnvFilter::try_new(filter)
        .map_err(|e| AppError::Config(format!("invalid log filter '{}': {}", filter, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false);
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| AppError::Config(format!("failed to install logger: {}", e)))
}
