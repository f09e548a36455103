//! Prompt-reflection detection.
//!
//! Callers mark protected prompt text by wrapping it in the configured
//! delimiter (`||like this||`). If any protected segment shows up in the
//! response, the response is flagged, redacted, or blocked.

use regex::{NoExpand, RegexBuilder};
use serde_json::Value;
use tollgate_types::{PolicyAction, ReflectionMode, StatsRecord};

use super::value_str;
use crate::error::{AppError, AppResult};
use crate::proxy::envelope::ProxyResponse;
use crate::proxy::headers::X_TOLLGATE_PROMPT_REFLECTION;
use crate::proxy::pipeline::{body, CallState, Processor};

pub struct PromptReflection;

/// Text enclosed by complete delimiter pairs.
fn protected_segments(text: &str, delimiter: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split(delimiter).collect();
    parts
        .iter()
        .enumerate()
        // Odd parts sit between delimiters; the last part has no closing one
        .filter(|(i, _)| i % 2 == 1 && *i + 1 < parts.len())
        .map(|(_, part)| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

impl Processor for PromptReflection {
    fn name(&self) -> &'static str {
        "prompt_reflection"
    }

    fn header(&self) -> Option<&'static str> {
        Some(X_TOLLGATE_PROMPT_REFLECTION)
    }

    fn config_field(&self) -> Option<&'static str> {
        Some("POLICY_PROMPT_REFLECTION")
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        let mode = match value_str(value) {
            Some(raw) => raw.parse::<ReflectionMode>().map_err(AppError::Config)?,
            None => ReflectionMode::None,
        };
        let action = match mode {
            ReflectionMode::None => return Ok(None),
            ReflectionMode::Audit => PolicyAction::Audit,
            ReflectionMode::Redact => PolicyAction::Redact,
            ReflectionMode::Block => PolicyAction::Block,
        };
        let Some(response) = call.response.as_deref_mut() else {
            return Ok(None);
        };

        let settings = call.config.settings();
        let segments =
            protected_segments(&body::request_text(call.request), &settings.prompt_reflection_delimiter);
        if segments.is_empty() {
            return Ok(None);
        }

        let response_lower = body::response_text(response).to_lowercase();
        let reflected: Vec<&String> =
            segments.iter().filter(|s| response_lower.contains(&s.to_lowercase())).collect();
        if reflected.is_empty() {
            return Ok(None);
        }

        tracing::warn!("Response reflected {} protected prompt segment(s)", reflected.len());
        if action == PolicyAction::Redact {
            for segment in &reflected {
                let pattern =
                    RegexBuilder::new(&regex::escape(segment)).case_insensitive(true).build()?;
                for slot in body::response_texts_mut(response) {
                    *slot = pattern
                        .replace_all(slot, NoExpand(&settings.redaction_string))
                        .into_owned();
                }
            }
        }

        stats.flag(self.name(), action, "Response contained protected prompt text");
        Ok(None)
    }
}
