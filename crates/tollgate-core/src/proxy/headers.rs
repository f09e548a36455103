//! Header names recognized by the proxy.

/// Tenant credential selecting the policy configuration.
pub const X_TOLLGATE_API_KEY: &str = "x-tollgate-api-key";
/// Header the policy service expects the tenant credential in.
pub const X_TOLLGATE_KEY: &str = "x-tollgate-key";
/// Caller-supplied trace id recorded in stats metadata.
pub const X_TOLLGATE_TRACE_ID: &str = "x-tollgate-trace-id";
/// Organization scope forwarded verbatim to the upstream service.
pub const OPENAI_ORGANIZATION: &str = "openai-organization";
/// Upstream auth header for deployment-style (Azure) hosting.
pub const API_KEY: &str = "api-key";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

// Per-processor overrides
pub const X_TOLLGATE_DISABLED_MODELS: &str = "x-tollgate-disabled-models";
pub const X_TOLLGATE_ENFORCE_USER_IDS: &str = "x-tollgate-enforce-user-ids";
pub const X_TOLLGATE_MAX_TOKENS: &str = "x-tollgate-max-tokens";
pub const X_TOLLGATE_MAX_PROMPT_CHARS: &str = "x-tollgate-max-prompt-chars";
pub const X_TOLLGATE_REQUEST_WORDLIST: &str = "x-tollgate-request-wordlist";
pub const X_TOLLGATE_RESPONSE_WORDLIST: &str = "x-tollgate-response-wordlist";
pub const X_TOLLGATE_LOG_REQUEST: &str = "x-tollgate-log-request";
pub const X_TOLLGATE_LOG_RESPONSE: &str = "x-tollgate-log-response";
pub const X_TOLLGATE_PROMPT_REFLECTION: &str = "x-tollgate-prompt-reflection";
