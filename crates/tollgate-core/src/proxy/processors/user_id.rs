use serde_json::Value;
use tollgate_types::{PolicyAction, StatsRecord};

use super::is_enabled;
use crate::error::AppResult;
use crate::proxy::envelope::ProxyResponse;
use crate::proxy::gatekeeper::CHAT_COMPLETIONS_ENDPOINT;
use crate::proxy::headers::X_TOLLGATE_ENFORCE_USER_IDS;
use crate::proxy::pipeline::{CallState, Processor};

const COMPLETIONS_ENDPOINT: &str = "/v1/completions";

/// Requires a non-empty `user` field on completion and chat calls.
pub struct EnforceUserIds;

impl Processor for EnforceUserIds {
    fn name(&self) -> &'static str {
        "enforce_user_ids"
    }

    fn header(&self) -> Option<&'static str> {
        Some(X_TOLLGATE_ENFORCE_USER_IDS)
    }

    fn config_field(&self) -> Option<&'static str> {
        Some("POLICY_ENFORCE_USER_IDS")
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        if !is_enabled(value) {
            return Ok(None);
        }
        let endpoint = call.context.endpoint.as_str();
        if endpoint != COMPLETIONS_ENDPOINT && endpoint != CHAT_COMPLETIONS_ENDPOINT {
            return Ok(None);
        }

        let has_user = call
            .request
            .get("user")
            .and_then(Value::as_str)
            .is_some_and(|u| !u.trim().is_empty());
        if !has_user {
            stats.flag(
                self.name(),
                PolicyAction::Block,
                "A user field is required for this endpoint",
            );
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::processors::test_support::Harness;
    use serde_json::json;

    #[test]
    fn test_missing_user_blocks() {
        let mut h = Harness::new(COMPLETIONS_ENDPOINT, json!({"prompt": "hi"}));
        h.run(&EnforceUserIds, Some(json!("true"))).unwrap();
        assert!(h.stats.error);

        let mut h = Harness::new(CHAT_COMPLETIONS_ENDPOINT, json!({"messages": [], "user": " "}));
        h.run(&EnforceUserIds, Some(json!("true"))).unwrap();
        assert!(h.stats.error);
    }

    #[test]
    fn test_present_user_passes() {
        let mut h = Harness::new(CHAT_COMPLETIONS_ENDPOINT, json!({"user": "user-1234"}));
        h.run(&EnforceUserIds, Some(json!("true"))).unwrap();
        assert!(h.stats.flags.is_empty());
    }

    #[test]
    fn test_other_endpoints_and_disabled_value_skip() {
        let mut h = Harness::new("/v1/embeddings", json!({"input": "x"}));
        h.run(&EnforceUserIds, Some(json!("true"))).unwrap();
        assert!(h.stats.flags.is_empty());

        let mut h = Harness::new(COMPLETIONS_ENDPOINT, json!({"prompt": "x"}));
        h.run(&EnforceUserIds, Some(json!("false"))).unwrap();
        assert!(h.stats.flags.is_empty());
    }
}
