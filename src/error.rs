//! Gateway error taxonomy.
//!
//! # Responsibilities
//! - Distinguish routing, decode, handler and upstream failures
//! - Map each failure to one HTTP status and one error-body code
//! - Report registration and dial failures at startup
//!
//! # Design Decisions
//! - Routing and decode errors are resolved before any handler runs
//! - Handler statuses pass through with their code and message untouched
//! - Upstream transport failures are 502, never confused with a handler's 503

use axum::http::StatusCode;
use thiserror::Error;

use crate::call::{Code, Status};
use crate::metadata::Metadata;

/// Request body could not be turned into a request value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for DecodeError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Response value could not be marshaled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to encode message: {0}")]
pub struct EncodeError(pub String);

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for EncodeError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self(err.to_string())
    }
}

/// Failure of a single dispatched request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no binding for {method} {path}")]
    NotFound { method: String, path: String },

    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Call(Status),

    #[error("upstream unavailable: {0}")]
    Upstream(String),
}

impl From<Status> for GatewayError {
    fn from(status: Status) -> Self {
        if status.is_upstream_failure() {
            GatewayError::Upstream(status.message().to_string())
        } else {
            GatewayError::Call(status)
        }
    }
}

impl GatewayError {
    /// Code reported in the error body.
    pub fn code(&self) -> Code {
        match self {
            GatewayError::NotFound { .. } => Code::NotFound,
            GatewayError::Decode(_) => Code::InvalidArgument,
            GatewayError::Call(status) => status.code(),
            GatewayError::Upstream(_) => Code::Unavailable,
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            other => other.code().http_status(),
        }
    }

    /// Message reported in the error body.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Call(status) => status.message().to_string(),
            other => other.to_string(),
        }
    }

    pub fn details(&self) -> &[serde_json::Value] {
        match self {
            GatewayError::Call(status) => status.details(),
            _ => &[],
        }
    }

    /// Header and trailer metadata captured before the failure, if any.
    pub fn metadata(&self) -> Option<(&Metadata, &Metadata)> {
        match self {
            GatewayError::Call(status) => Some((&status.headers, &status.trailers)),
            _ => None,
        }
    }
}

/// Failure to open the backing connection.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
}

/// Startup-time registration failure.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: crate::routing::PatternError,
    },

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("invalid RPC method path {0:?}")]
    InvalidRpcPath(String),

    #[error("duplicate binding for {method} {pattern}")]
    Conflict { method: String, pattern: String },

    #[error("{rpc} is a streaming method; only unary methods can be bound")]
    Streaming { rpc: String },

    #[error(transparent)]
    Dial(#[from] DialError),
}
