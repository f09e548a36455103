//! Tenant configuration resolution.
//!
//! Order: local mode → cache → policy service. Any failure still yields the
//! local defaults so the caller can choose between failing open and closed.

use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tollgate_types::{ErrorKind, ProxyConfig};

use super::config_cache::{ConfigCache, RemoteConfig};
use super::effective_config::EffectiveConfig;
use super::envelope::ProxyResponse;
use super::headers::X_TOLLGATE_KEY;
use crate::error::AppResult;

/// Field every valid remote configuration must carry.
const REQUIRED_REMOTE_FIELD: &str = "LLM_API_BASE_PATH";
const CACHE_ENABLED_FIELD: &str = "CACHE_ENABLED";

/// Why the tenant configuration could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigFailure {
    #[error("Error loading tenant config")]
    Invalid,
    #[error("Server error loading tenant config")]
    Unreachable,
}

impl ConfigFailure {
    pub fn into_response(self) -> ProxyResponse {
        ProxyResponse::error(ErrorKind::ServerError, self.to_string())
    }
}

/// Result of resolving the configuration for one call.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: EffectiveConfig,
    /// True for cache hits and local mode
    pub from_cache: bool,
    /// Set when `config` is the local fallback after a failure
    pub failure: Option<ConfigFailure>,
}

pub struct ConfigResolver {
    defaults: Arc<ProxyConfig>,
    default_config: EffectiveConfig,
    cache: Arc<ConfigCache>,
    http: Client,
    config_url: String,
}

impl ConfigResolver {
    pub fn new(defaults: Arc<ProxyConfig>, cache: Arc<ConfigCache>, http: Client) -> AppResult<Self> {
        let default_config = EffectiveConfig::from_defaults(&defaults)?;
        let config_url = format!("{}/proxy", defaults.policy_api_url.trim_end_matches('/'));
        Ok(Self { defaults, default_config, cache, http, config_url })
    }

    pub async fn resolve(&self, tenant: Option<&str>) -> Resolution {
        if self.defaults.local_mode {
            tracing::debug!("Local mode enabled; using local config");
            return self.fallback(true, None);
        }

        let Some(tenant) = tenant else {
            tracing::warn!("No tenant key available for config lookup");
            return self.fallback(true, Some(ConfigFailure::Invalid));
        };

        if let Some(cached) = self.cache.get(tenant) {
            match EffectiveConfig::merged(&self.defaults, &cached) {
                Ok(config) => {
                    tracing::debug!("Using cached tenant config");
                    return Resolution { config, from_cache: true, failure: None };
                },
                Err(e) => tracing::warn!("Discarding unusable cached config: {}", e),
            }
        }

        tracing::debug!("No cached config; fetching from policy service");
        let remote = match self.fetch(tenant).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::error!("Failed to fetch tenant config: {}", e);
                return self.fallback(true, Some(ConfigFailure::Unreachable));
            },
        };

        let Some(remote) = remote.filter(has_required_field) else {
            tracing::error!("Tenant config missing {}", REQUIRED_REMOTE_FIELD);
            return self.fallback(true, Some(ConfigFailure::Invalid));
        };

        let config = match EffectiveConfig::merged(&self.defaults, &remote) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Tenant config rejected: {}", e);
                return self.fallback(true, Some(ConfigFailure::Invalid));
            },
        };

        // Remote opt-in only
        if remote.contains_key(CACHE_ENABLED_FIELD) && config.settings().cache_enabled {
            self.cache.insert(tenant, remote);
        }
        tracing::debug!("Loaded tenant config from policy service ({} fields)", config.len());

        Resolution { config, from_cache: false, failure: None }
    }

    async fn fetch(&self, tenant: &str) -> AppResult<Option<RemoteConfig>> {
        let body: Value = self
            .http
            .get(&self.config_url)
            .header(X_TOLLGATE_KEY, tenant)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(match body {
            Value::Object(map) => Some(map),
            _ => None,
        })
    }

    fn fallback(&self, from_cache: bool, failure: Option<ConfigFailure>) -> Resolution {
        Resolution { config: self.default_config.clone(), from_cache, failure }
    }
}

fn has_required_field(remote: &RemoteConfig) -> bool {
    remote.get(REQUIRED_REMOTE_FIELD).is_some_and(|v| !v.is_null() && v.as_str() != Some(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TENANT: &str = "up-abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUV";

    fn resolver(server: &MockServer, local_mode: bool) -> (ConfigResolver, Arc<ConfigCache>) {
        let defaults = Arc::new(ProxyConfig {
            local_mode,
            policy_api_url: format!("{}/v1", server.uri()),
            ..Default::default()
        });
        let cache = Arc::new(ConfigCache::new(Duration::from_secs(300)));
        let resolver = ConfigResolver::new(defaults, cache.clone(), Client::new()).unwrap();
        (resolver, cache)
    }

    #[tokio::test]
    async fn test_fetch_merges_and_caches_when_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/proxy"))
            .and(header(X_TOLLGATE_KEY, TENANT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "LLM_API_BASE_PATH": "https://tenant.example",
                "POLICY_MAX_TOKENS": 64,
                "CACHE_ENABLED": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (resolver, cache) = resolver(&server, false);

        let first = resolver.resolve(Some(TENANT)).await;
        assert!(first.failure.is_none());
        assert!(!first.from_cache);
        assert_eq!(first.config.settings().policy_max_tokens, 64);
        assert_eq!(cache.len(), 1);

        // Second call is served from cache; the mock's expect(1) verifies no refetch
        let second = resolver.resolve(Some(TENANT)).await;
        assert!(second.from_cache);
        assert_eq!(second.config.settings().llm_api_base_path, "https://tenant.example");
        assert_eq!(second.config.settings().redaction_string, "****");
    }

    #[tokio::test]
    async fn test_not_cached_without_opt_in() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/proxy"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"LLM_API_BASE_PATH": "https://tenant.example"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let (resolver, cache) = resolver(&server, false);
        assert!(!resolver.resolve(Some(TENANT)).await.from_cache);
        assert!(!resolver.resolve(Some(TENANT)).await.from_cache);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_missing_base_field_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/proxy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"CACHE_ENABLED": true})))
            .mount(&server)
            .await;

        let (resolver, cache) = resolver(&server, false);
        let resolution = resolver.resolve(Some(TENANT)).await;

        assert_eq!(resolution.failure, Some(ConfigFailure::Invalid));
        assert_eq!(resolution.config.settings(), &ProxyConfig {
            policy_api_url: format!("{}/v1", server.uri()),
            ..Default::default()
        });
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_service_error_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/proxy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (resolver, _) = resolver(&server, false);
        let resolution = resolver.resolve(Some(TENANT)).await;
        assert_eq!(resolution.failure, Some(ConfigFailure::Unreachable));

        let resp = ConfigFailure::Unreachable.into_response();
        assert_eq!(resp.status.as_u16(), 500);
        assert_eq!(resp.error_type(), Some("server_error"));
    }

    #[tokio::test]
    async fn test_malformed_remote_value_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/proxy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "LLM_API_BASE_PATH": "https://tenant.example",
                "POLICY_MAX_TOKENS": "many"
            })))
            .mount(&server)
            .await;

        let (resolver, _) = resolver(&server, false);
        assert_eq!(resolver.resolve(Some(TENANT)).await.failure, Some(ConfigFailure::Invalid));
    }

    #[tokio::test]
    async fn test_string_scalars_are_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/proxy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "LLM_API_BASE_PATH": "https://tenant.example",
                "POLICY_LOG_REQUEST": "true",
                "POLICY_MAX_TOKENS": "16",
                "POLICY_DISABLED_MODELS": "davinci, babbage",
                "CACHE_ENABLED": "true"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (resolver, cache) = resolver(&server, false);
        let resolution = resolver.resolve(Some(TENANT)).await;

        assert!(resolution.failure.is_none());
        let settings = resolution.config.settings();
        assert!(settings.policy_log_request);
        assert_eq!(settings.policy_max_tokens, 16);
        assert_eq!(settings.policy_disabled_models, vec!["davinci", "babbage"]);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_local_mode_never_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

        let (resolver, _) = resolver(&server, true);
        let resolution = resolver.resolve(None).await;
        assert!(resolution.from_cache);
        assert!(resolution.failure.is_none());
        assert!(resolution.config.settings().local_mode);
    }
}
