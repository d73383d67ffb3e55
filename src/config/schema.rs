//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::BodyPolicy;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// RPC server that forwarded calls are sent to.
    pub upstream: Option<UpstreamConfig>,

    /// Header ⇄ metadata filtering.
    pub metadata: MetadataConfig,

    /// Body encodings.
    pub marshal: MarshalConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// HTTP bindings.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for one call) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Largest request body read, in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 4 * 1024 * 1024,
        }
    }
}

/// Forwarding target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// RPC server URL (e.g., "http://127.0.0.1:50051").
    pub endpoint: String,

    /// Connect at startup instead of on the first call.
    #[serde(default)]
    pub block: bool,
}

/// Which headers cross the HTTP ⇄ RPC boundary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Request headers forwarded as call metadata (exact names).
    pub forward_headers: Vec<String>,

    /// Request header prefixes forwarded as call metadata.
    pub forward_prefixes: Vec<String>,

    /// Outcome metadata keys exposed as response headers (exact names).
    pub response_headers: Vec<String>,

    /// Outcome metadata key prefixes exposed as response headers.
    pub response_prefixes: Vec<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            forward_headers: vec!["authorization".to_string(), "x-request-id".to_string()],
            forward_prefixes: vec!["x-".to_string()],
            response_headers: Vec::new(),
            response_prefixes: vec!["x-".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarshalConfig {
    /// Indent JSON responses.
    pub pretty_json: bool,

    /// Accept and produce `application/msgpack`.
    pub msgpack: bool,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            pretty_json: false,
            msgpack: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One HTTP binding to a forwarded RPC method.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging.
    pub name: String,

    /// HTTP method, uppercase (e.g., "POST").
    pub method: String,

    /// Path template (e.g., "/v1/faces/{face_id}").
    pub pattern: String,

    /// RPC method path (e.g., "/com.sekirocc.face_service.FaceService/Detect").
    pub rpc: String,

    /// Whether the body is decoded into the request ("*") or ignored ("none").
    #[serde(default)]
    pub body: BodyPolicy,
}
