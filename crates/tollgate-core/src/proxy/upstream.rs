//! Upstream forwarder.
//!
//! Sends the (possibly rewritten) call to the LLM service and buffers the
//! reply. Never fails: transport problems become a 502 reply so the caller can
//! still run the remaining stages and report stats.

use axum::http::{Method, StatusCode};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tollgate_types::{ErrorKind, ProxyConfig};

use super::effective_config::EffectiveConfig;
use super::envelope::ProxyResponse;
use super::headers::{API_KEY, OPENAI_ORGANIZATION};
use super::pipeline::CallContext;

const RETRY_BACKOFF_MS: u64 = 250;
const API_VERSION_PREFIX: &str = "/v1";
const BEARER_PREFIX: &str = "Bearer ";

/// Prepend `/v1` unless the path already starts with it (case-insensitive).
pub fn normalize_endpoint(path: &str) -> String {
    let path = if path.starts_with('/') { path.to_string() } else { format!("/{}", path) };
    if path.to_lowercase().starts_with(API_VERSION_PREFIX) {
        path
    } else {
        format!("{}{}", API_VERSION_PREFIX, path)
    }
}

/// Base URL without a trailing `/v1`, since endpoints always carry it.
pub fn normalize_base_path(base: &str) -> &str {
    let base = base.trim_end_matches('/');
    base.strip_suffix(API_VERSION_PREFIX).unwrap_or(base)
}

/// Target URL and auth header for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UpstreamTarget {
    url: String,
    auth_header: &'static str,
    auth_value: String,
}

fn upstream_target(
    settings: &ProxyConfig,
    context: &CallContext,
    query: Option<&str>,
    model: Option<&str>,
) -> UpstreamTarget {
    let endpoint = context.endpoint.as_str();

    match settings.azure_resource_name.as_deref().filter(|r| !r.is_empty()) {
        Some(resource) => {
            let model = model.unwrap_or_default();
            let deployment =
                settings.azure_deployment_map.get(model).map(String::as_str).unwrap_or(model);
            let path = endpoint.strip_prefix(API_VERSION_PREFIX).unwrap_or(endpoint);
            let mut url = format!(
                "https://{}.openai.azure.com/openai/deployments/{}{}?api-version={}",
                resource, deployment, path, settings.azure_api_version
            );
            if let Some(query) = query.filter(|q| !q.is_empty()) {
                url.push('&');
                url.push_str(query);
            }
            let key = context.upstream_key.strip_prefix(BEARER_PREFIX).unwrap_or(&context.upstream_key);
            UpstreamTarget { url, auth_header: API_KEY, auth_value: key.to_string() }
        },
        None => {
            let mut url = format!("{}{}", normalize_base_path(&settings.llm_api_base_path), endpoint);
            if let Some(query) = query.filter(|q| !q.is_empty()) {
                url.push('?');
                url.push_str(query);
            }
            UpstreamTarget {
                url,
                auth_header: "authorization",
                auth_value: context.upstream_key.clone(),
            }
        },
    }
}

/// Buffered upstream answer.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Value,
    /// Non-2xx status or a top-level `error` in the body
    pub failed: bool,
}

impl UpstreamReply {
    pub fn new(status: StatusCode, body: Value) -> Self {
        let failed = !status.is_success() || body.get("error").is_some();
        Self { status, body, failed }
    }

    /// No response at all (connection refused, timeout, ...).
    pub fn unreachable() -> Self {
        let status = StatusCode::from_u16(ErrorKind::UpstreamError.http_status_code())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        Self::new(status, json!({}))
    }

    pub fn into_response(self) -> ProxyResponse {
        ProxyResponse::new(self.status, self.body)
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Empty → `{}`, JSON → parsed, anything else → JSON string.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return json!({});
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

pub struct UpstreamForwarder {
    http: Client,
}

impl UpstreamForwarder {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Forward one call. `body` is sent as JSON when present.
    ///
    /// Transport errors, 429 and 5xx are retried `POLICY_RETRY_COUNT` times
    /// with a linear backoff; the last outcome is returned as-is.
    pub async fn forward(
        &self,
        method: &Method,
        query: Option<&str>,
        body: Option<&Value>,
        config: &EffectiveConfig,
        context: &CallContext,
    ) -> UpstreamReply {
        let settings = config.settings();
        let model = body.and_then(|b| b.get("model")).and_then(Value::as_str);
        let target = upstream_target(settings, context, query, model);
        let attempts = settings.policy_retry_count.saturating_add(1);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let reply = self.send_once(method, &target, body, context).await;
            let retryable = match &reply {
                Ok(reply) => should_retry(reply.status),
                Err(_) => true,
            };

            if !retryable || attempt >= attempts {
                return match reply {
                    Ok(reply) => {
                        if reply.failed {
                            tracing::warn!(
                                "Upstream returned error status {} for {}",
                                reply.status,
                                context.endpoint
                            );
                        }
                        reply
                    },
                    Err(e) => {
                        tracing::error!("Upstream request to {} failed: {}", context.endpoint, e);
                        UpstreamReply::unreachable()
                    },
                };
            }

            let delay = RETRY_BACKOFF_MS * u64::from(attempt);
            tracing::warn!(
                "Upstream attempt {}/{} for {} failed, retrying in {}ms",
                attempt,
                attempts,
                context.endpoint,
                delay
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        target: &UpstreamTarget,
        body: Option<&Value>,
        context: &CallContext,
    ) -> Result<UpstreamReply, reqwest::Error> {
        let mut request = self
            .http
            .request(method.clone(), &target.url)
            .header(target.auth_header, &target.auth_value);
        if let Some(org) = context.organization.as_deref() {
            request = request.header(OPENAI_ORGANIZATION, org);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        Ok(UpstreamReply::new(status, parse_body(&bytes)))
    }
}
