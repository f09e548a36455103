//! Policy pipeline: the processor contract and staged execution.
//!
//! Two fixed stages run around the upstream call. Each processor sees the
//! mutations of the ones before it; a terminal response stops the stage, and
//! a blocking flag turns the end of the stage into an `invalid_request`.

pub mod body;

use axum::http::HeaderMap;
use serde_json::Value;
use std::sync::Arc;
use tollgate_types::{ErrorKind, StatsRecord};

use super::effective_config::EffectiveConfig;
use super::envelope::ProxyResponse;
use super::processors;
use super::wordlist::WordlistMatcher;
use crate::error::AppResult;

/// Call-scoped data derived while handling one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Normalized endpoint path
    pub endpoint: String,
    /// Validated `authorization` value
    pub upstream_key: String,
    pub organization: Option<String>,
    pub tenant: Option<String>,
}

/// Everything a processor may read or rewrite.
pub struct CallState<'a> {
    pub config: &'a EffectiveConfig,
    pub context: &'a CallContext,
    pub request: &'a mut Value,
    /// Present only in the post-call stage
    pub response: Option<&'a mut Value>,
}

/// One policy check.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Per-call override header.
    fn header(&self) -> Option<&'static str> {
        None
    }

    /// Configuration field holding the activation value.
    fn config_field(&self) -> Option<&'static str> {
        None
    }

    /// Run against the call. `Some` ends the stage with that response.
    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>>;
}

/// Activation value: header override (lowercased), else the config field.
///
/// Scalar config values are stringified and lowercased; lists and maps are
/// returned unchanged. Null counts as absent.
pub fn activation_value(
    processor: &dyn Processor,
    headers: &HeaderMap,
    config: &EffectiveConfig,
) -> Option<Value> {
    if let Some(header) = processor.header() {
        if let Some(value) = headers.get(header).and_then(|v| v.to_str().ok()) {
            return Some(Value::String(value.to_lowercase()));
        }
    }

    match config.get(processor.config_field()?)? {
        Value::Null => None,
        Value::String(s) => Some(Value::String(s.to_lowercase())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        Value::Number(n) => Some(Value::String(n.to_string())),
        other => Some(other.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreCall,
    PostCall,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PreCall => "pre-call",
            Stage::PostCall => "post-call",
        }
    }
}

/// Ordered processor lists for both stages.
pub struct PolicyPipeline {
    pre_call: Vec<Box<dyn Processor>>,
    post_call: Vec<Box<dyn Processor>>,
}

impl PolicyPipeline {
    pub fn new(pre_call: Vec<Box<dyn Processor>>, post_call: Vec<Box<dyn Processor>>) -> Self {
        Self { pre_call, post_call }
    }

    /// The built-in processors in their fixed order.
    pub fn standard(wordlists: Arc<WordlistMatcher>) -> Self {
        Self::new(
            vec![
                Box::new(processors::DisabledModels),
                Box::new(processors::EnforceUserIds),
                Box::new(processors::MaxTokens),
                Box::new(processors::MaxPromptChars),
                Box::new(processors::AutoReply),
                Box::new(processors::WordlistProcessor::request(Arc::clone(&wordlists))),
                Box::new(processors::LogRequest),
            ],
            vec![
                Box::new(processors::WordlistProcessor::response(wordlists)),
                Box::new(processors::PromptReflection),
                Box::new(processors::LogResponse),
            ],
        )
    }

    pub fn names(&self, stage: Stage) -> Vec<&'static str> {
        self.processors(stage).iter().map(|p| p.name()).collect()
    }

    fn processors(&self, stage: Stage) -> &[Box<dyn Processor>] {
        match stage {
            Stage::PreCall => &self.pre_call,
            Stage::PostCall => &self.post_call,
        }
    }

    /// Run one stage. `Ok(Some)` means the call ends here with that response.
    pub fn run_stage(
        &self,
        stage: Stage,
        headers: &HeaderMap,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        for processor in self.processors(stage) {
            let value = activation_value(processor.as_ref(), headers, call.config);
            if let Some(terminal) = processor.run(value.as_ref(), call, stats)? {
                tracing::debug!(
                    "Processor {} ended the {} stage with status {}",
                    processor.name(),
                    stage.as_str(),
                    terminal.status
                );
                return Ok(Some(terminal));
            }
        }

        if stats.error {
            let message = format!("Policy violation: {}", stats.flag_summary());
            tracing::warn!("{} stage rejected call: {}", stage.as_str(), message);
            return Ok(Some(ProxyResponse::error(ErrorKind::InvalidRequest, message)));
        }
        Ok(None)
    }
}
