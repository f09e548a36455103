//! Request gatekeeper: credential shape and scope validation.
//!
//! Runs before any network call. A rejection is final for the call.

use axum::http::{header, HeaderMap};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tollgate_types::{ErrorKind, ProxyConfig};

use super::envelope::ProxyResponse;
use super::headers::X_TOLLGATE_API_KEY;

/// Endpoint chat-scoped tenant keys are restricted to.
pub const CHAT_COMPLETIONS_ENDPOINT: &str = "/v1/chat/completions";
const CHAT_SCOPE_PREFIX: &str = "up-chat";

static TENANT_KEY_REGEX: OnceLock<Regex> = OnceLock::new();
static UPSTREAM_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

fn tenant_key_regex() -> &'static Regex {
    TENANT_KEY_REGEX
        .get_or_init(|| Regex::new(r"^up-[0-9A-Za-z]{48}$").expect("Tenant key regex is valid"))
}

fn upstream_key_regex() -> &'static Regex {
    UPSTREAM_KEY_REGEX.get_or_init(|| {
        Regex::new(r"^Bearer (sk-[0-9A-Za-z]{48}|[a-z0-9]{32})$")
            .expect("Upstream key regex is valid")
    })
}

/// Why a call was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Invalid tenant API key")]
    InvalidTenantKey,
    #[error("Invalid upstream API key")]
    InvalidUpstreamKey,
    #[error("Chat API keys can only be used for the /v1/chat/completions endpoint")]
    ChatScopeViolation,
}

impl Denial {
    pub fn into_response(self) -> ProxyResponse {
        ProxyResponse::error(ErrorKind::AccessDenied, self.to_string())
    }
}

/// Credentials that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Tenant key. `None` only in local mode when no key was supplied.
    pub tenant: Option<String>,
    /// Full `authorization` value, e.g. `Bearer sk-...`
    pub upstream: String,
}

pub struct Gatekeeper {
    config: Arc<ProxyConfig>,
}

impl Gatekeeper {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        Self { config }
    }

    /// Validate the inbound credentials for a call to `endpoint` (normalized path).
    pub fn check(&self, headers: &HeaderMap, endpoint: &str) -> Result<Credentials, Denial> {
        let tenant = self.presented_tenant(headers);

        if !self.config.local_mode
            && !tenant.as_deref().is_some_and(|k| tenant_key_regex().is_match(k))
        {
            tracing::warn!(
                "Invalid tenant API key. Pass the {} header or set POLICY_API_KEY",
                X_TOLLGATE_API_KEY
            );
            return Err(Denial::InvalidTenantKey);
        }

        let upstream = header_str(headers, header::AUTHORIZATION.as_str())
            .map(str::to_string)
            .or_else(|| self.config.upstream_api_key.as_ref().map(|k| format!("Bearer {}", k)));

        let Some(upstream) = upstream.filter(|k| upstream_key_regex().is_match(k)) else {
            tracing::warn!(
                "Invalid upstream API key. Pass the authorization header or set UPSTREAM_API_KEY"
            );
            return Err(Denial::InvalidUpstreamKey);
        };

        if tenant.as_deref().is_some_and(|k| k.starts_with(CHAT_SCOPE_PREFIX))
            && endpoint != CHAT_COMPLETIONS_ENDPOINT
        {
            tracing::warn!("Chat-scoped tenant key used for non-chat endpoint {}", endpoint);
            return Err(Denial::ChatScopeViolation);
        }

        Ok(Credentials { tenant, upstream })
    }

    /// Tenant credential as presented (header, else `POLICY_API_KEY`), unvalidated.
    ///
    /// Stats for a denied call are still attributed to this key.
    pub fn presented_tenant(&self, headers: &HeaderMap) -> Option<String> {
        header_str(headers, X_TOLLGATE_API_KEY)
            .map(str::to_string)
            .or_else(|| self.config.policy_api_key.clone())
            .filter(|k| !k.is_empty())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}
