//! Per-call statistics record uploaded to the policy service.

use super::policy::{PolicyAction, PolicyFlag};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller metadata captured at the start of a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StatsMetadata {
    /// Deployment tag from `PROXY_ID` (string or object)
    pub proxy_id: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub organization: Option<String>,
    pub trace_id: Option<String>,
}

/// Statistics for a single mediated call.
///
/// Created when a mutating call arrives, mutated by every stage, and handed to
/// the stats reporter exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StatsRecord {
    /// Normalized endpoint path (e.g. `/v1/chat/completions`)
    pub endpoint: String,
    /// Whether the effective config came from the cache (or local mode)
    pub config_cached: bool,
    pub flags: Vec<PolicyFlag>,
    /// True once any stage decided the call failed
    pub error: bool,
    pub autorouted: Map<String, Value>,
    pub metadata: StatsMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl StatsRecord {
    pub fn new(endpoint: impl Into<String>, metadata: StatsMetadata) -> Self {
        Self { endpoint: endpoint.into(), metadata, ..Default::default() }
    }

    /// Append a flag. Blocking flags mark the call as failed.
    pub fn push_flag(&mut self, flag: PolicyFlag) {
        if flag.is_blocking() {
            self.error = true;
        }
        self.flags.push(flag);
    }

    pub fn flag(&mut self, processor: &str, action: PolicyAction, description: impl Into<String>) {
        self.push_flag(PolicyFlag::new(processor, action, description));
    }

    /// All flag descriptions joined for a single error message.
    pub fn flag_summary(&self) -> String {
        self.flags.iter().map(|f| f.description.as_str()).collect::<Vec<_>>().join(", ")
    }
}
