//! Response envelope shared by every outcome.
//!
//! Whatever produced the answer (gatekeeper, resolver, a processor, or the
//! upstream service), the caller receives a status, the configured CORS
//! headers, and a JSON body.

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tollgate_types::ErrorKind;

/// Id prefix for synthesized (non-upstream) completion bodies.
const COMPLETION_ID: &str = "cmpl-tollgate";
const CHAT_COMPLETION_ID: &str = "chatcmpl-tollgate";
const DEFAULT_COMPLETION_MODEL: &str = "text-davinci-003";
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// A buffered response ready to be returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ProxyResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Answer to an `OPTIONS` pre-flight.
    pub fn preflight() -> Self {
        Self::new(StatusCode::OK, json!({}))
    }

    /// Error envelope using the kind's default status.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        let status = StatusCode::from_u16(kind.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::error_with_status(status, kind, message)
    }

    pub fn error_with_status(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(
            status,
            json!({
                "error": {
                    "message": message.into(),
                    "type": kind.as_str(),
                    "param": null,
                    "code": null,
                }
            }),
        )
    }

    /// Synthesized text-completion body.
    pub fn completion(model: Option<&str>, text: &str) -> Self {
        Self::new(
            StatusCode::OK,
            json!({
                "id": COMPLETION_ID,
                "object": "text_completion",
                "created": chrono::Utc::now().timestamp(),
                "model": model.unwrap_or(DEFAULT_COMPLETION_MODEL),
                "choices": [{
                    "text": text,
                    "index": 0,
                    "logprobs": null,
                    "finish_reason": "stop",
                }],
                "usage": zero_usage(),
            }),
        )
    }

    /// Synthesized chat-completion body.
    pub fn chat_completion(model: Option<&str>, text: &str) -> Self {
        Self::new(
            StatusCode::OK,
            json!({
                "id": CHAT_COMPLETION_ID,
                "object": "chat.completion",
                "created": chrono::Utc::now().timestamp(),
                "model": model.unwrap_or(DEFAULT_CHAT_MODEL),
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": text},
                    "finish_reason": "stop",
                }],
                "usage": zero_usage(),
            }),
        )
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Error `type` if this is an error envelope.
    pub fn error_type(&self) -> Option<&str> {
        self.body.get("error").and_then(|e| e.get("type")).and_then(Value::as_str)
    }

    /// Convert to an HTTP response carrying `cors_headers`.
    pub fn into_http(self, cors_headers: &BTreeMap<String, String>) -> Response {
        let bytes = serde_json::to_vec(&self.body).unwrap_or_default();
        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in cors_headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                },
                _ => tracing::warn!("Skipping invalid CORS header '{}'", name),
            }
        }
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        response
    }
}

fn zero_usage() -> Value {
    json!({"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0})
}
