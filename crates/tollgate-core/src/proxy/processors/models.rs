use serde_json::Value;
use tollgate_types::{PolicyAction, StatsRecord};

use crate::error::AppResult;
use crate::proxy::envelope::ProxyResponse;
use crate::proxy::headers::X_TOLLGATE_DISABLED_MODELS;
use crate::proxy::pipeline::{CallState, Processor};

/// Blocks requests for models (or image sizes) on the disabled list.
pub struct DisabledModels;

impl DisabledModels {
    fn disabled_list(value: &Value) -> Vec<String> {
        match value {
            // Header form: comma separated
            Value::String(s) => {
                s.split(',').map(|m| m.trim().to_lowercase()).filter(|m| !m.is_empty()).collect()
            },
            Value::Array(items) => {
                items.iter().filter_map(Value::as_str).map(str::to_lowercase).collect()
            },
            _ => Vec::new(),
        }
    }
}

impl Processor for DisabledModels {
    fn name(&self) -> &'static str {
        "disabled_models"
    }

    fn header(&self) -> Option<&'static str> {
        Some(X_TOLLGATE_DISABLED_MODELS)
    }

    fn config_field(&self) -> Option<&'static str> {
        Some("POLICY_DISABLED_MODELS")
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let disabled = Self::disabled_list(value);
        if disabled.is_empty() {
            return Ok(None);
        }

        for field in ["model", "size"] {
            let Some(requested) = call.request.get(field).and_then(Value::as_str) else {
                continue;
            };
            if disabled.iter().any(|d| d.eq_ignore_ascii_case(requested)) {
                tracing::warn!("Request for disabled {} '{}'", field, requested);
                stats.flag(
                    self.name(),
                    PolicyAction::Block,
                    format!("The {} '{}' is disabled", field, requested),
                );
            }
        }
        Ok(None)
    }
}
