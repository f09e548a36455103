//! Policy actions and the flags processors attach to a call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a policy check does when it fires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    /// Record a flag, let the call through unchanged
    #[default]
    Audit,
    /// Replace the offending text, record a flag
    Redact,
    /// Record a flag and fail the call
    Block,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Redact => "redact",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "audit" => Ok(Self::Audit),
            "redact" => Ok(Self::Redact),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown policy action '{}'", other)),
        }
    }
}

/// A non-fatal (or, with `Block`, fatal) finding recorded during a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyFlag {
    /// Human-readable description, surfaced in aggregated error messages
    pub description: String,
    /// Name of the processor that raised the flag
    pub processor: String,
    /// Action taken for this finding
    pub action: PolicyAction,
}

impl PolicyFlag {
    pub fn new(processor: &str, action: PolicyAction, description: impl Into<String>) -> Self {
        Self { description: description.into(), processor: processor.to_string(), action }
    }

    pub fn is_blocking(&self) -> bool {
        self.action == PolicyAction::Block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!("BLOCK".parse::<PolicyAction>(), Ok(PolicyAction::Block));
        assert_eq!(" redact ".parse::<PolicyAction>(), Ok(PolicyAction::Redact));
        assert!("deny".parse::<PolicyAction>().is_err());
    }

    #[test]
    fn test_flag_serializes_action_lowercase() {
        let flag = PolicyFlag::new("request_wordlist", PolicyAction::Block, "matched");
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["action"], "block");
        assert_eq!(json["processor"], "request_wordlist");
        assert!(flag.is_blocking());
    }
}
