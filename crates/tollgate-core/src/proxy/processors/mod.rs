//! Built-in policy processors.
//!
//! Each one reads its activation value (header override or config field) and
//! either flags the call, rewrites a body, or answers the call itself.

mod autoreply;
mod limits;
mod logging;
mod models;
mod reflection;
mod user_id;
mod wordlist;

pub use autoreply::AutoReply;
pub use limits::{MaxPromptChars, MaxTokens};
pub use logging::{LogRequest, LogResponse};
pub use models::DisabledModels;
pub use reflection::PromptReflection;
pub use user_id::EnforceUserIds;
pub use wordlist::{parse_wordlist_selection, WordlistProcessor};

use serde_json::Value;

/// Activation value as a string, if it is one.
fn value_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

/// True only for the literal (lowercased) `"true"`.
fn is_enabled(value: Option<&Value>) -> bool {
    value_str(value) == Some("true")
}

/// Positive numeric limit; anything else means disabled.
fn positive_limit(value: Option<&Value>) -> Option<u64> {
    value_str(value).and_then(|s| s.trim().parse::<u64>().ok()).filter(|n| *n > 0)
}
