//! Size limits on the request.

use serde_json::Value;
use tollgate_types::{PolicyAction, StatsRecord};

use super::positive_limit;
use crate::error::AppResult;
use crate::proxy::envelope::ProxyResponse;
use crate::proxy::headers::{X_TOLLGATE_MAX_PROMPT_CHARS, X_TOLLGATE_MAX_TOKENS};
use crate::proxy::pipeline::{body, CallState, Processor};

/// Caps the requested `max_tokens`.
pub struct MaxTokens;

impl Processor for MaxTokens {
    fn name(&self) -> &'static str {
        "max_tokens"
    }

    fn header(&self) -> Option<&'static str> {
        Some(X_TOLLGATE_MAX_TOKENS)
    }

    fn config_field(&self) -> Option<&'static str> {
        Some("POLICY_MAX_TOKENS")
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        let Some(limit) = positive_limit(value) else {
            return Ok(None);
        };
        let Some(requested) = call.request.get("max_tokens").and_then(Value::as_u64) else {
            return Ok(None);
        };

        if requested > limit {
            stats.flag(
                self.name(),
                PolicyAction::Block,
                format!("max_tokens of {} exceeds the limit of {}", requested, limit),
            );
        }
        Ok(None)
    }
}

/// Caps the total number of characters across all request text.
pub struct MaxPromptChars;

impl Processor for MaxPromptChars {
    fn name(&self) -> &'static str {
        "max_prompt_chars"
    }

    fn header(&self) -> Option<&'static str> {
        Some(X_TOLLGATE_MAX_PROMPT_CHARS)
    }

    fn config_field(&self) -> Option<&'static str> {
        Some("POLICY_MAX_PROMPT_CHARS")
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        let Some(limit) = positive_limit(value) else {
            return Ok(None);
        };

        let total: u64 =
            body::request_texts(call.request).iter().map(|t| t.chars().count() as u64).sum();
        if total > limit {
            stats.flag(
                self.name(),
                PolicyAction::Block,
                format!("Prompt length of {} characters exceeds the limit of {}", total, limit),
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
    fn test_max_tokens_over_limit_blocks() {
        let mut h = Harness::new("/v1/completions", json!({"max_tokens": 500}));
        h.run(&MaxTokens, Some(json!("256"))).unwrap();
        assert!(h.stats.error);
        assert_eq!(h.stats.flags[0].description, "max_tokens of 500 exceeds the limit of 256");
    }

    #[test]
    fn test_max_tokens_at_limit_or_disabled_passes() {
        let mut h = Harness::new("/v1/completions", json!({"max_tokens": 256}));
        h.run(&MaxTokens, Some(json!("256"))).unwrap();
        h.run(&MaxTokens, Some(json!("0"))).unwrap();
        h.run(&MaxTokens, Some(json!("not-a-number"))).unwrap();
        assert!(h.stats.flags.is_empty());
    }

    #[test]
    fn test_prompt_chars_counts_characters_not_bytes() {
        // 4 chars, 8 bytes
        let mut h = Harness::new("/v1/completions", json!({"prompt": "日本語!"}));
        h.run(&MaxPromptChars, Some(json!("4"))).unwrap();
        assert!(h.stats.flags.is_empty());

        h.run(&MaxPromptChars, Some(json!("3"))).unwrap();
        assert!(h.stats.error);
    }

    #[test]
    fn test_prompt_chars_sums_chat_messages() {
        let mut h = Harness::new(
            "/v1/chat/completions",
            json!({"messages": [
                {"role": "system", "content": "12345"},
                {"role": "user", "content": "67890"}
            ]}),
        );
        h.run(&MaxPromptChars, Some(json!("9"))).unwrap();
        assert!(h.stats.error);
    }
}
