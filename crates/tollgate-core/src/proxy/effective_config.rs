//! Effective configuration: remote tenant fields layered over local defaults.

use serde_json::{Map, Value};
use tollgate_types::ProxyConfig;

use crate::error::{AppError, AppResult};

/// Resolved configuration for one call. Immutable once built.
///
/// Keeps both the merged field map (for name-based lookups by processors) and
/// a typed view of the same values.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    values: Map<String, Value>,
    settings: ProxyConfig,
}

impl EffectiveConfig {
    /// Local defaults only.
    pub fn from_defaults(defaults: &ProxyConfig) -> AppResult<Self> {
        Ok(Self { values: to_map(defaults)?, settings: defaults.clone() })
    }

    /// Overlay `remote` on `defaults`. Remote fields win; null remote fields
    /// count as unset and keep the default.
    pub fn merged(defaults: &ProxyConfig, remote: &Map<String, Value>) -> AppResult<Self> {
        let mut values = to_map(defaults)?;
        for (key, value) in remote {
            if !value.is_null() {
                values.insert(key.clone(), value.clone());
            }
        }

        let settings: ProxyConfig = serde_json::from_value(Value::Object(values.clone()))
            .map_err(|e| AppError::Config(format!("malformed tenant configuration: {}", e)))?;

        Ok(Self { values, settings })
    }

    /// Raw field lookup by configuration name (e.g. `POLICY_LOG_RESPONSE`).
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn settings(&self) -> &ProxyConfig {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn to_map(config: &ProxyConfig) -> AppResult<Map<String, Value>> {
    match serde_json::to_value(config)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Config(format!("config serialized to non-object: {}", other))),
    }
}
