//! Canned answers for configured prompts, returned without calling upstream.

use serde_json::Value;
use tollgate_types::{AutoReplyRule, CompletionKind, PolicyAction, StatsRecord};

use crate::error::{AppError, AppResult};
use crate::proxy::envelope::ProxyResponse;
use crate::proxy::pipeline::{body, CallState, Processor};

/// Answers known prompts directly, without calling upstream.
pub struct AutoReply;

impl AutoReply {
    fn rules(value: &Value) -> AppResult<Vec<AutoReplyRule>> {
        serde_json::from_value(value.clone())
            .map_err(|e| AppError::Config(format!("invalid POLICY_AUTOREPLY: {}", e)))
    }

    fn matches(rule: &AutoReplyRule, request: &Value) -> bool {
        let candidate = match rule.kind {
            CompletionKind::Chat => body::last_user_message(request),
            CompletionKind::Completion => body::first_prompt(request).map(str::to_string),
        };
        candidate.is_some_and(|text| text.trim().eq_ignore_ascii_case(rule.request.trim()))
    }
}

impl Processor for AutoReply {
    fn name(&self) -> &'static str {
        "autoreply"
    }

    fn config_field(&self) -> Option<&'static str> {
        Some("POLICY_AUTOREPLY")
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        let Some(value @ Value::Array(_)) = value else {
            return Ok(None);
        };

        let request: &Value = call.request;
        let rules = Self::rules(value)?;
        let Some(rule) = rules.iter().find(|rule| Self::matches(rule, request)) else {
            return Ok(None);
        };

        tracing::debug!("Auto-reply rule matched; skipping upstream");
        stats.flag(self.name(), PolicyAction::Audit, "Auto-reply rule matched");
        stats.autorouted.insert("autoreply".to_string(), Value::Bool(true));

        let model = request.get("model").and_then(Value::as_str);
        let response = match rule.kind {
            CompletionKind::Chat => ProxyResponse::chat_completion(model, &rule.response),
            CompletionKind::Completion => ProxyResponse::completion(model, &rule.response),
        };
        Ok(Some(response))
    }
}
