//! Client-visible error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error `type` reported in `{error: {message, type, param, code}}` bodies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials missing, malformed, or used outside their scope
    AccessDenied,
    /// Rejected by the policy pipeline or unparseable request
    InvalidRequest,
    /// Tenant configuration could not be resolved, or a policy stage failed
    ServerError,
    /// The upstream service itself reported an error
    UpstreamError,
}

impl ErrorKind {
    /// Wire name used in error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::InvalidRequest => "invalid_request",
            Self::ServerError => "server_error",
            Self::UpstreamError => "upstream_error",
        }
    }

    /// Status code used when the proxy itself produces the error.
    ///
    /// Upstream errors keep whatever status the upstream returned; 502 is only
    /// the fallback when no response was received at all.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::AccessDenied => 403,
            Self::InvalidRequest => 422,
            Self::ServerError => 500,
            Self::UpstreamError => 502,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
