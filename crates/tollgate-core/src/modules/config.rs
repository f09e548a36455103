//! Local (process-wide) configuration loading.
//!
//! Defaults come from `ProxyConfig::default()`, optionally overridden by a JSON
//! file and then by environment variables. The result is validated once at
//! startup and shared read-only for the life of the process.

use std::path::Path;
use tollgate_types::{ConfigError, ProxyConfig};
use validator::Validate;

use crate::error::AppResult;

/// Environment variables that override file/default values.
const ENV_LOCAL_MODE: &str = "TOLLGATE_LOCAL_MODE";
const ENV_POLICY_API_URL: &str = "POLICY_API_URL";
const ENV_POLICY_API_KEY: &str = "POLICY_API_KEY";
const ENV_UPSTREAM_API_KEY: &str = "UPSTREAM_API_KEY";
const ENV_LLM_API_BASE_PATH: &str = "LLM_API_BASE_PATH";

/// Load local configuration from `path` (if any) and the process environment.
pub fn load_config(path: Option<&Path>) -> AppResult<ProxyConfig> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> AppResult<ProxyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, env);
    validate_config(&config)?;

    if config.policy_auto_moderate {
        tracing::warn!(
            "POLICY_AUTO_MODERATE is enabled but no moderation stage is registered; ignoring"
        );
    }
    if config.local_mode {
        tracing::info!("Local mode enabled: tenant config and stats upload are disabled");
    }

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound { path: path.display().to_string() }
        } else {
            ConfigError::ParseError { message: format!("{}: {}", path.display(), e) }
        }
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))
}

fn apply_env_overrides<F>(config: &mut ProxyConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = non_empty(ENV_LOCAL_MODE) {
        config.local_mode = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = non_empty(ENV_POLICY_API_URL) {
        config.policy_api_url = v;
    }
    if let Some(v) = non_empty(ENV_POLICY_API_KEY) {
        config.policy_api_key = Some(v);
    }
    if let Some(v) = non_empty(ENV_UPSTREAM_API_KEY) {
        config.upstream_api_key = Some(v);
    }
    if let Some(v) = non_empty(ENV_LLM_API_BASE_PATH) {
        config.llm_api_base_path = v;
    }
}

fn validate_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;

    for (field, value) in [
        ("POLICY_API_URL", &config.policy_api_url),
        ("LLM_API_BASE_PATH", &config.llm_api_base_path),
    ] {
        if url::Url::parse(value).is_err() {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: format!("'{}' is not a valid URL", value),
            });
        }
    }
    Ok(())
}
