//! Copies of the request and response bodies for the stats record.
//!
//! Content fields are dropped unless logging is explicitly enabled with
//! `"true"`; the rest of the body (model, usage, ids) is always kept.

use serde_json::Value;
use tollgate_types::StatsRecord;

use super::is_enabled;
use crate::error::AppResult;
use crate::proxy::envelope::ProxyResponse;
use crate::proxy::headers::{X_TOLLGATE_LOG_REQUEST, X_TOLLGATE_LOG_RESPONSE};
use crate::proxy::pipeline::{CallState, Processor};

const REQUEST_CONTENT_FIELDS: [&str; 4] = ["prompt", "messages", "input", "instruction"];
const RESPONSE_CONTENT_FIELDS: [&str; 2] = ["choices", "data"];

pub struct LogRequest;

impl Processor for LogRequest {
    fn name(&self) -> &'static str {
        "log_request"
    }

    fn header(&self) -> Option<&'static str> {
        Some(X_TOLLGATE_LOG_REQUEST)
    }

    fn config_field(&self) -> Option<&'static str> {
        Some("POLICY_LOG_REQUEST")
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        let mut copy = call.request.clone();
        if !is_enabled(value) {
            strip(&mut copy, &REQUEST_CONTENT_FIELDS);
        }
        stats.request = Some(copy);
        Ok(None)
    }
}

pub struct LogResponse;

impl Processor for LogResponse {
    fn name(&self) -> &'static str {
        "log_response"
    }

    fn header(&self) -> Option<&'static str> {
        Some(X_TOLLGATE_LOG_RESPONSE)
    }

    fn config_field(&self) -> Option<&'static str> {
        Some("POLICY_LOG_RESPONSE")
    }

    fn run(
        &self,
        value: Option<&Value>,
        call: &mut CallState<'_>,
        stats: &mut StatsRecord,
    ) -> AppResult<Option<ProxyResponse>> {
        let Some(response) = call.response.as_deref() else {
            return Ok(None);
        };

        let mut copy = response.clone();
        // Embedding vectors are never worth keeping
        if copy.pointer("/data/0/object").and_then(Value::as_str) == Some("embedding") {
            strip(&mut copy, &["data"]);
        }
        if !is_enabled(value) {
            strip(&mut copy, &RESPONSE_CONTENT_FIELDS);
        }
        stats.response = Some(copy);
        Ok(None)
    }
}

fn strip(body: &mut Value, fields: &[&str]) {
    if let Some(obj) = body.as_object_mut() {
        for field in fields {
            obj.remove(*field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::processors::test_support::Harness;
    use serde_json::json;

    #[test]
    fn test_request_content_stripped_by_default() {
        let mut h = Harness::new(
            "/v1/chat/completions",
            json!({"model": "gpt-4", "messages": [{"role": "user", "content": "secret"}]}),
        );
        h.run(&LogRequest, Some(json!("false"))).unwrap();
        assert_eq!(h.stats.request, Some(json!({"model": "gpt-4"})));

        // The live request is untouched
        assert_eq!(h.request["messages"][0]["content"], "secret");
    }

    #[test]
    fn test_request_kept_when_enabled() {
        let mut h = Harness::new("/v1/completions", json!({"model": "m", "prompt": "hello"}));
        h.run(&LogRequest, Some(json!("true"))).unwrap();
        assert_eq!(h.stats.request, Some(json!({"model": "m", "prompt": "hello"})));
    }

    #[test]
    fn test_response_choices_stripped_by_default() {
        let mut h = Harness::new("/v1/completions", json!({})).with_response(json!({
            "id": "cmpl-1",
            "choices": [{"text": "hi"}],
            "usage": {"total_tokens": 3}
        }));
        h.run(&LogResponse, Some(json!("false"))).unwrap();
        assert_eq!(
            h.stats.response,
            Some(json!({"id": "cmpl-1", "usage": {"total_tokens": 3}}))
        );
    }

    #[test]
    fn test_embeddings_always_dropped() {
        let mut h = Harness::new("/v1/embeddings", json!({})).with_response(json!({
            "object": "list",
            "data": [{"object": "embedding", "embedding": [0.1, 0.2]}],
            "model": "text-embedding-ada-002"
        }));
        h.run(&LogResponse, Some(json!("true"))).unwrap();
        assert_eq!(
            h.stats.response,
            Some(json!({"object": "list", "model": "text-embedding-ada-002"}))
        );
    }

    #[test]
    fn test_response_kept_when_enabled() {
        let body = json!({"choices": [{"text": "hi"}]});
        let mut h = Harness::new("/v1/completions", json!({})).with_response(body.clone());
        h.run(&LogResponse, Some(json!("true"))).unwrap();
        assert_eq!(h.stats.response, Some(body));
    }
}
