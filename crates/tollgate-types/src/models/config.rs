//! Proxy configuration model.
//!
//! The same shape serves as the process-wide local defaults and as the typed
//! view over a tenant's effective (remote-over-local) configuration. JSON keys
//! are SCREAMING_SNAKE_CASE so remote payloads and processor field lookups use
//! the same names.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::lenient;

// ============================================================================
// Enums
// ============================================================================

/// Completion schema an auto-reply rule answers with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    #[default]
    Chat,
    Completion,
}

/// Prompt-reflection detection mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionMode {
    #[default]
    None,
    Audit,
    Redact,
    Block,
}

impl fmt::Display for ReflectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReflectionMode::None => write!(f, "none"),
            ReflectionMode::Audit => write!(f, "audit"),
            ReflectionMode::Redact => write!(f, "redact"),
            ReflectionMode::Block => write!(f, "block"),
        }
    }
}

impl FromStr for ReflectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "false" => Ok(ReflectionMode::None),
            "audit" => Ok(ReflectionMode::Audit),
            "redact" => Ok(ReflectionMode::Redact),
            "block" => Ok(ReflectionMode::Block),
            other => Err(format!("unknown prompt reflection mode '{}'", other)),
        }
    }
}

// ============================================================================
// Auto-reply
// ============================================================================

/// Canned answer returned without contacting the upstream service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoReplyRule {
    #[serde(rename = "type", default)]
    pub kind: CompletionKind,
    /// Prompt (or last user message) that triggers the rule
    pub request: String,
    /// Text returned to the caller
    pub response: String,
}

// ============================================================================
// Proxy configuration
// ============================================================================

/// Proxy configuration: local defaults and the typed view of effective config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ProxyConfig {
    /// Process requests without contacting the policy service
    #[serde(deserialize_with = "lenient::scalar")]
    pub local_mode: bool,
    /// Tag attached to logs and stats (string or object)
    pub proxy_id: Value,
    /// Policy-configuration service base URL
    #[validate(length(min = 1))]
    pub policy_api_url: String,
    /// Fallback tenant credential when the header is omitted
    pub policy_api_key: Option<String>,
    /// Fallback upstream credential when the header is omitted
    pub upstream_api_key: Option<String>,
    /// Upstream LLM base URL
    #[validate(length(min = 1))]
    pub llm_api_base_path: String,
    /// Config cache sweep period
    #[validate(range(min = 1))]
    #[serde(deserialize_with = "lenient::scalar")]
    pub config_cache_minutes: u64,
    pub cors_headers: BTreeMap<String, String>,
    #[validate(length(min = 1))]
    pub redaction_string: String,
    /// Extra attempts for the upstream call (0 = no retries)
    #[validate(range(max = 10))]
    #[serde(deserialize_with = "lenient::scalar")]
    pub policy_retry_count: u32,
    #[validate(length(min = 1))]
    pub prompt_reflection_delimiter: String,
    #[serde(deserialize_with = "lenient::string_list")]
    pub policy_disabled_models: Vec<String>,
    pub policy_autoreply: Vec<AutoReplyRule>,
    /// `name:action` pairs, comma separated (e.g. `profanity:block,custom:audit`)
    pub policy_request_wordlist: String,
    pub policy_response_wordlist: String,
    /// Patterns used when the `custom` wordlist is selected
    pub policy_custom_wordlist: Vec<String>,
    /// 0 = disabled
    #[serde(deserialize_with = "lenient::scalar")]
    pub policy_max_tokens: u64,
    /// 0 = disabled
    #[serde(deserialize_with = "lenient::scalar")]
    pub policy_max_prompt_chars: u64,
    #[serde(deserialize_with = "lenient::scalar")]
    pub policy_auto_moderate: bool,
    #[serde(deserialize_with = "lenient::scalar")]
    pub policy_enforce_user_ids: bool,
    #[serde(deserialize_with = "lenient::scalar")]
    pub policy_log_request: bool,
    #[serde(deserialize_with = "lenient::scalar")]
    pub policy_log_response: bool,
    #[serde(deserialize_with = "lenient::scalar")]
    pub policy_prompt_reflection: ReflectionMode,
    /// Alternate hosting: resource name for deployment-style URLs
    pub azure_resource_name: Option<String>,
    /// Model name -> deployment id
    pub azure_deployment_map: HashMap<String, String>,
    pub azure_api_version: String,
    /// Return to the client without waiting for the stats upload
    #[serde(deserialize_with = "lenient::scalar")]
    pub async_stats_upload: bool,
    /// Use local defaults when the tenant config cannot be loaded
    #[serde(deserialize_with = "lenient::scalar")]
    pub fail_open_on_config_error: bool,
    /// Directory holding `<name>.txt` wordlists
    pub wordlist_dir: String,
    /// Set by the policy service on configs that may be cached
    #[serde(deserialize_with = "lenient::scalar")]
    pub cache_enabled: bool,
}

fn default_cors_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Access-Control-Allow-Headers".to_string(), "*".to_string()),
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ("Access-Control-Allow-Methods".to_string(), "OPTIONS,POST,GET".to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ])
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            local_mode: false,
            proxy_id: Value::String("tollgate".to_string()),
            policy_api_url: "http://127.0.0.1:8046/v1".to_string(),
            policy_api_key: None,
            upstream_api_key: None,
            llm_api_base_path: "https://api.openai.com".to_string(),
            config_cache_minutes: 5,
            cors_headers: default_cors_headers(),
            redaction_string: "****".to_string(),
            policy_retry_count: 0,
            prompt_reflection_delimiter: "||".to_string(),
            policy_disabled_models: Vec::new(),
            policy_autoreply: Vec::new(),
            policy_request_wordlist: String::new(),
            policy_response_wordlist: String::new(),
            policy_custom_wordlist: Vec::new(),
            policy_max_tokens: 0,
            policy_max_prompt_chars: 0,
            policy_auto_moderate: false,
            policy_enforce_user_ids: false,
            policy_log_request: false,
            policy_log_response: false,
            policy_prompt_reflection: ReflectionMode::None,
            azure_resource_name: None,
            azure_deployment_map: HashMap::new(),
            azure_api_version: "2023-05-15".to_string(),
            async_stats_upload: false,
            fail_open_on_config_error: false,
            wordlist_dir: "wordlists".to_string(),
            cache_enabled: false,
        }
    }
}

impl ProxyConfig {
    /// Human-readable proxy id for log fields.
    pub fn proxy_id_label(&self) -> String {
        match &self.proxy_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProxyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cors_headers.len(), 4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ProxyConfig = serde_json::from_value(serde_json::json!({
            "LLM_API_BASE_PATH": "https://llm.internal",
            "POLICY_MAX_TOKENS": 512,
            "POLICY_PROMPT_REFLECTION": "redact",
            "POLICY_AUTOREPLY": [{"type": "completion", "request": "ping", "response": "pong"}]
        }))
        .unwrap();

        assert_eq!(config.llm_api_base_path, "https://llm.internal");
        assert_eq!(config.policy_max_tokens, 512);
        assert_eq!(config.policy_prompt_reflection, ReflectionMode::Redact);
        assert_eq!(config.policy_autoreply[0].kind, CompletionKind::Completion);
        assert_eq!(config.redaction_string, "****");
    }

    #[test]
    fn test_zero_cache_minutes_rejected() {
        let config = ProxyConfig { config_cache_minutes: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialized_keys_are_screaming_snake() {
        let json = serde_json::to_value(ProxyConfig::default()).unwrap();
        assert!(json.get("FAIL_OPEN_ON_CONFIG_ERROR").is_some());
        assert!(json.get("POLICY_LOG_RESPONSE").is_some());
        assert_eq!(json["POLICY_PROMPT_REFLECTION"], "none");
    }

    #[test]
    fn test_reflection_mode_parse() {
        assert_eq!("Block".parse::<ReflectionMode>(), Ok(ReflectionMode::Block));
        assert_eq!("".parse::<ReflectionMode>(), Ok(ReflectionMode::None));
        assert!("sometimes".parse::<ReflectionMode>().is_err());
    }
}
