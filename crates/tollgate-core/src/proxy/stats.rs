//! Stats reporting.
//!
//! Every mediated call binds one [`StatsUpload`] and consumes it with
//! [`StatsUpload::report`], so a call reports exactly once, denied calls
//! included. Upload failures are logged and never reach the caller.

use axum::http::Method;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tollgate_types::{ProxyConfig, StatsRecord};

use super::headers::X_TOLLGATE_KEY;

const UPLOAD_TIMEOUT: Duration = Duration::from_millis(3500);

pub struct StatsReporter {
    config: Arc<ProxyConfig>,
    http: Client,
    stats_url: String,
}

impl StatsReporter {
    pub fn new(config: Arc<ProxyConfig>, http: Client) -> Self {
        let stats_url = format!("{}/proxy", config.policy_api_url.trim_end_matches('/'));
        Self { config, http, stats_url }
    }

    /// Prepare the single upload for a call.
    ///
    /// `tenant` is the credential the caller presented, validated or not. A
    /// call that presented none is still uploaded, just without the key header.
    pub fn bind(&self, method: &Method, endpoint: &str, tenant: Option<String>) -> StatsUpload {
        let skip = if *method != Method::POST {
            Some("non-POST call")
        } else if self.config.local_mode {
            Some("local mode")
        } else {
            None
        };

        let target = skip.is_none().then(|| UploadTarget {
            http: self.http.clone(),
            url: self.stats_url.clone(),
            tenant,
            detached: self.config.async_stats_upload,
        });

        StatsUpload { endpoint: endpoint.to_string(), skip_reason: skip, target }
    }
}

struct UploadTarget {
    http: Client,
    url: String,
    tenant: Option<String>,
    detached: bool,
}

impl UploadTarget {
    async fn send(self, record: StatsRecord) {
        let mut request = self.http.post(&self.url).timeout(UPLOAD_TIMEOUT).json(&record);
        if let Some(tenant) = &self.tenant {
            request = request.header(X_TOLLGATE_KEY, tenant);
        }
        let result = request.send().await.and_then(|r| r.error_for_status());

        match result {
            Ok(_) => tracing::debug!("[Stats] Uploaded stats for {}", record.endpoint),
            Err(e) => tracing::error!("[Stats] Error uploading stats; failing open: {}", e),
        }
    }
}

/// One-shot upload handle for a single call.
pub struct StatsUpload {
    endpoint: String,
    skip_reason: Option<&'static str>,
    target: Option<UploadTarget>,
}

impl StatsUpload {
    pub fn will_upload(&self) -> bool {
        self.target.is_some()
    }

    /// Hand the record off. Detached uploads return immediately.
    pub async fn report(self, record: StatsRecord) {
        let Some(target) = self.target else {
            tracing::debug!(
                "[Stats] Skipping stats upload for {} ({})",
                self.endpoint,
                self.skip_reason.unwrap_or("disabled")
            );
            return;
        };

        if target.detached {
            tracing::debug!("[Stats] Async stats upload enabled; not waiting");
            // Handle dropped on purpose; errors are logged inside the task
            tokio::spawn(target.send(record));
        } else {
            target.send(record).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tollgate_types::StatsMetadata;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TENANT: &str = "up-abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUV";

    fn reporter(server_uri: &str, tweak: impl FnOnce(&mut ProxyConfig)) -> StatsReporter {
        let mut config = ProxyConfig { policy_api_url: format!("{}/v1", server_uri), ..Default::default() };
        tweak(&mut config);
        StatsReporter::new(Arc::new(config), Client::new())
    }

    fn record() -> StatsRecord {
        let mut record = StatsRecord::new("/v1/completions", StatsMetadata::default());
        record.config_cached = true;
        record
    }

    #[test]
    fn test_bind_skips() {
        let r = reporter("http://127.0.0.1:1", |_| {});
        assert!(!r.bind(&Method::GET, "/v1/models", Some(TENANT.to_string())).will_upload());
        assert!(r.bind(&Method::POST, "/v1/completions", None).will_upload());
        assert!(r.bind(&Method::POST, "/v1/completions", Some(TENANT.to_string())).will_upload());

        let local = reporter("http://127.0.0.1:1", |c| c.local_mode = true);
        assert!(!local.bind(&Method::POST, "/v1/completions", Some(TENANT.to_string())).will_upload());
    }

    #[tokio::test]
    async fn test_sync_upload_posts_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/proxy"))
            .and(header(X_TOLLGATE_KEY, TENANT))
            .and(body_partial_json(json!({"endpoint": "/v1/completions", "config_cached": true})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let r = reporter(&server.uri(), |_| {});
        r.bind(&Method::POST, "/v1/completions", Some(TENANT.to_string())).report(record()).await;
    }

    #[tokio::test]
    async fn test_upload_without_tenant_omits_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/proxy"))
            .and(body_partial_json(json!({"error": true})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut denied = record();
        denied.error = true;
        reporter(&server.uri(), |_| {})
            .bind(&Method::POST, "/v1/completions", None)
            .report(denied)
            .await;

        let received = server.received_requests().await.unwrap_or_default();
        assert!(received[0].headers.get(X_TOLLGATE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_upload_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let r = reporter(&server.uri(), |_| {});
        // Completes without panicking
        r.bind(&Method::POST, "/v1/completions", Some(TENANT.to_string())).report(record()).await;
    }

    #[tokio::test]
    async fn test_detached_upload_returns_before_slow_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let r = reporter(&server.uri(), |c| c.async_stats_upload = true);
        let started = std::time::Instant::now();
        r.bind(&Method::POST, "/v1/completions", Some(TENANT.to_string())).report(record()).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
