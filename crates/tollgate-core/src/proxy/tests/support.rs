//! Shared fixtures: a policy service and an upstream LLM, both mocked.

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use reqwest::Client;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tollgate_types::ProxyConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::proxy::config_cache::ConfigCache;
use crate::proxy::headers::X_TOLLGATE_API_KEY;
use crate::proxy::orchestrator::Orchestrator;
use crate::proxy::server::build_proxy_router;

pub const TENANT: &str = "up-abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUV";
pub const UPSTREAM_KEY: &str = "Bearer sk-abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUV";

pub struct Fixture {
    pub policy: MockServer,
    pub upstream: MockServer,
    pub wordlists: TempDir,
}

impl Fixture {
    pub async fn start() -> Self {
        let wordlists = TempDir::new().unwrap();
        fs::write(wordlists.path().join("secrets.txt"), "hunter2\nlaunch code\n").unwrap();
        Self { policy: MockServer::start().await, upstream: MockServer::start().await, wordlists }
    }

    pub fn defaults(&self) -> ProxyConfig {
        ProxyConfig {
            policy_api_url: format!("{}/v1", self.policy.uri()),
            llm_api_base_path: self.upstream.uri(),
            wordlist_dir: self.wordlists.path().display().to_string(),
            ..Default::default()
        }
    }

    pub fn server(&self, defaults: ProxyConfig) -> TestServer {
        let cache = Arc::new(ConfigCache::from_minutes(defaults.config_cache_minutes));
        let orchestrator = Orchestrator::new(Arc::new(defaults), cache, Client::new()).unwrap();
        TestServer::new(build_proxy_router(Arc::new(orchestrator))).unwrap()
    }

    /// Serve a tenant config pointing at the mock upstream, plus `extra` fields.
    pub async fn mount_tenant_config(&self, extra: Value) {
        let mut config = json!({"LLM_API_BASE_PATH": self.upstream.uri()});
        if let (Some(config), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            config.extend(extra.clone());
        }
        Mock::given(method("GET"))
            .and(path("/v1/proxy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(config))
            .mount(&self.policy)
            .await;
    }

    /// Accept stats uploads, asserting the exact number received.
    pub async fn expect_stats(&self, uploads: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/proxy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(uploads)
            .named("stats upload")
            .mount(&self.policy)
            .await;
    }

    pub async fn mount_upstream(&self, endpoint: &str, status: u16, body: Value) {
        Mock::given(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .named("upstream")
            .mount(&self.upstream)
            .await;
    }

    /// Bodies of every stats upload received so far.
    pub async fn uploaded_stats(&self) -> Vec<Value> {
        self.policy
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .map(|r| r.body_json::<Value>().unwrap())
            .collect()
    }

    pub async fn upstream_calls(&self) -> usize {
        self.upstream.received_requests().await.unwrap_or_default().len()
    }
}

/// Attach valid tenant and upstream credentials.
pub fn authorized(request: TestRequest) -> TestRequest {
    request
        .add_header(
            HeaderName::from_static(X_TOLLGATE_API_KEY),
            HeaderValue::from_static(TENANT),
        )
        .add_header(HeaderName::from_static("authorization"), HeaderValue::from_static(UPSTREAM_KEY))
}

pub fn completion_body(text: &str) -> Value {
    json!({
        "id": "cmpl-upstream",
        "object": "text_completion",
        "model": "gpt-3.5-turbo-instruct",
        "choices": [{"text": text, "index": 0, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 3, "completion_tokens": 5, "total_tokens": 8}
    })
}
