//! Request orchestrator: the full lifecycle of one inbound call.
//!
//! ```text
//! OPTIONS  → pre-flight
//! non-POST → gatekeeper → resolver → pass-through
//! POST     → gatekeeper → resolver → body → pre-call → forward → post-call
//!            └──────────── every exit ────────────┘→ stats (once)
//! ```

use axum::http::{header, HeaderMap, Method, StatusCode};
use bytes::Bytes;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tollgate_types::{ErrorKind, ProxyConfig, StatsMetadata, StatsRecord};
use tracing::Instrument;

use super::config_cache::ConfigCache;
use super::config_resolver::{ConfigResolver, Resolution};
use super::effective_config::EffectiveConfig;
use super::envelope::ProxyResponse;
use super::gatekeeper::{Credentials, Gatekeeper};
use super::headers::{OPENAI_ORGANIZATION, X_TOLLGATE_TRACE_ID};
use super::pipeline::{CallContext, CallState, PolicyPipeline, Stage};
use super::stats::StatsReporter;
use super::upstream::{normalize_endpoint, UpstreamForwarder};
use super::wordlist::WordlistMatcher;
use crate::error::{AppError, AppResult};

/// Inbound call as seen by the orchestrator, independent of the HTTP server.
#[derive(Debug, Clone)]
pub struct InboundCall {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<String>,
}

impl InboundCall {
    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    }
}

/// Result of mediating a POST call, before stats are reported.
struct Mediated {
    response: ProxyResponse,
    /// Tenant credential the stats upload is attributed to
    tenant: Option<String>,
}

pub struct Orchestrator {
    defaults: Arc<ProxyConfig>,
    gatekeeper: Gatekeeper,
    resolver: ConfigResolver,
    pipeline: PolicyPipeline,
    forwarder: UpstreamForwarder,
    reporter: StatsReporter,
}

impl Orchestrator {
    /// Build with the standard processor pipeline.
    pub fn new(defaults: Arc<ProxyConfig>, cache: Arc<ConfigCache>, http: Client) -> AppResult<Self> {
        let wordlists = Arc::new(WordlistMatcher::new(&defaults.wordlist_dir));
        Self::with_pipeline(defaults, cache, http, PolicyPipeline::standard(wordlists))
    }

    pub fn with_pipeline(
        defaults: Arc<ProxyConfig>,
        cache: Arc<ConfigCache>,
        http: Client,
        pipeline: PolicyPipeline,
    ) -> AppResult<Self> {
        Ok(Self {
            gatekeeper: Gatekeeper::new(Arc::clone(&defaults)),
            resolver: ConfigResolver::new(Arc::clone(&defaults), cache, http.clone())?,
            pipeline,
            forwarder: UpstreamForwarder::new(http.clone()),
            reporter: StatsReporter::new(Arc::clone(&defaults), http),
            defaults,
        })
    }

    /// CORS headers attached to every response (always from local config).
    pub fn cors_headers(&self) -> &BTreeMap<String, String> {
        &self.defaults.cors_headers
    }

    pub async fn handle(&self, call: InboundCall) -> ProxyResponse {
        if call.method == Method::OPTIONS {
            tracing::debug!("CORS pre-flight");
            return ProxyResponse::preflight();
        }

        let endpoint = normalize_endpoint(&call.path);
        let span = tracing::info_span!(
            "call",
            proxy_id = %self.defaults.proxy_id_label(),
            method = %call.method,
            endpoint = %endpoint,
        );

        async move {
            if call.method == Method::POST {
                self.handle_mediated(call, endpoint).await
            } else {
                self.handle_passthrough(call, endpoint).await
            }
        }
        .instrument(span)
        .await
    }

    async fn handle_passthrough(&self, call: InboundCall, endpoint: String) -> ProxyResponse {
        let credentials = match self.gatekeeper.check(&call.headers, &endpoint) {
            Ok(credentials) => credentials,
            Err(denial) => return denial.into_response(),
        };

        let config = match self.resolve(credentials.tenant.as_deref()).await {
            Ok(resolution) => resolution.config,
            Err(response) => return response,
        };

        let context = self.call_context(&call, endpoint, credentials);
        self.forwarder
            .forward(&call.method, call.query.as_deref(), None, &config, &context)
            .await
            .into_response()
    }

    async fn handle_mediated(&self, call: InboundCall, endpoint: String) -> ProxyResponse {
        let mut stats = StatsRecord::new(endpoint.clone(), self.metadata(&call));

        let Mediated { response, tenant } = self.mediate(&call, endpoint.clone(), &mut stats).await;

        if !response.is_success() {
            stats.error = true;
            stats.response = Some(response.body.clone());
        }

        self.reporter.bind(&call.method, &endpoint, tenant).report(stats).await;
        response
    }

    async fn mediate(&self, call: &InboundCall, endpoint: String, stats: &mut StatsRecord) -> Mediated {
        let credentials = match self.gatekeeper.check(&call.headers, &endpoint) {
            Ok(credentials) => credentials,
            Err(denial) => {
                return Mediated {
                    response: denial.into_response(),
                    tenant: self.gatekeeper.presented_tenant(&call.headers),
                }
            },
        };
        let tenant = credentials.tenant.clone();
        let done = |response: ProxyResponse| Mediated { response, tenant: tenant.clone() };

        let resolution = match self.resolve(credentials.tenant.as_deref()).await {
            Ok(resolution) => resolution,
            Err(response) => return done(response),
        };
        stats.config_cached = resolution.from_cache;
        let config = resolution.config;

        let mut request: Value = match serde_json::from_slice(&call.body) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Rejecting unparseable request body: {}", e);
                return done(ProxyResponse::error_with_status(
                    StatusCode::BAD_REQUEST,
                    ErrorKind::InvalidRequest,
                    "Invalid JSON request body",
                ));
            },
        };

        let context = self.call_context(call, endpoint, credentials);
        done(self.run_policy(call, &config, &context, &mut request, stats).await)
    }

    /// Pre-call stage, forward, post-call stage.
    async fn run_policy(
        &self,
        call: &InboundCall,
        config: &EffectiveConfig,
        context: &CallContext,
        request: &mut Value,
        stats: &mut StatsRecord,
    ) -> ProxyResponse {
        let pre = {
            let mut state = CallState { config, context, request: &mut *request, response: None };
            self.pipeline.run_stage(Stage::PreCall, &call.headers, &mut state, stats)
        };
        match pre {
            Ok(Some(terminal)) => return terminal,
            Ok(None) => {},
            Err(e) => return processor_failure(Stage::PreCall, e),
        }

        let mut reply = self
            .forwarder
            .forward(&call.method, call.query.as_deref(), Some(&*request), config, context)
            .await;
        if reply.failed {
            stats.error = true;
            stats.response = Some(reply.body.clone());
            return reply.into_response();
        }

        let post = {
            let mut state =
                CallState { config, context, request, response: Some(&mut reply.body) };
            self.pipeline.run_stage(Stage::PostCall, &call.headers, &mut state, stats)
        };
        match post {
            Ok(Some(terminal)) => terminal,
            Ok(None) => reply.into_response(),
            Err(e) => processor_failure(Stage::PostCall, e),
        }
    }

    /// Resolve the tenant config, honouring fail-open from the local defaults.
    async fn resolve(&self, tenant: Option<&str>) -> Result<Resolution, ProxyResponse> {
        let resolution = self.resolver.resolve(tenant).await;
        match resolution.failure.clone() {
            None => Ok(resolution),
            Some(failure) if self.defaults.fail_open_on_config_error => {
                tracing::warn!("{}; failing open with local config", failure);
                Ok(resolution)
            },
            Some(failure) => Err(failure.into_response()),
        }
    }

    fn call_context(&self, call: &InboundCall, endpoint: String, credentials: Credentials) -> CallContext {
        CallContext {
            endpoint,
            upstream_key: credentials.upstream,
            organization: call.header(OPENAI_ORGANIZATION),
            tenant: credentials.tenant,
        }
    }

    fn metadata(&self, call: &InboundCall) -> StatsMetadata {
        StatsMetadata {
            proxy_id: self.defaults.proxy_id.clone(),
            ip_address: call.client_ip.clone(),
            user_agent: call.header(header::USER_AGENT.as_str()),
            organization: call.header(OPENAI_ORGANIZATION),
            trace_id: call.header(X_TOLLGATE_TRACE_ID),
        }
    }
}

fn processor_failure(stage: Stage, e: AppError) -> ProxyResponse {
    tracing::error!("{} processor failed: {}", stage.as_str(), e);
    ProxyResponse::error(ErrorKind::ServerError, format!("Error running {} processors", stage.as_str()))
}
