//! Header ⇄ metadata bridging.
//!
//! # Responsibilities
//! - Select which request headers become call metadata
//! - Strip the `grpc-metadata-` prefix from explicitly tunnelled headers
//! - Annotate `x-forwarded-host` / `x-forwarded-for`
//! - Select which outcome metadata becomes response headers
//!
//! # Design Decisions
//! - Allowed keys are copied verbatim; nothing is renamed on the way out
//! - Trailers are merged after headers, once, before the status line is written
//! - Reserved and hop-by-hop names never cross in either direction

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::MetadataConfig;
use crate::metadata::Metadata;

/// Request headers with this prefix are forwarded with the prefix removed.
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

const RESERVED: &[&str] = &[
    "content-type",
    "content-length",
    "content-encoding",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
    "host",
];

fn is_reserved(key: &str) -> bool {
    key.starts_with(':') || key.starts_with("grpc-") || RESERVED.contains(&key)
}

/// Filtering policy applied at both boundary crossings.
#[derive(Debug, Clone)]
pub struct MetadataBridge {
    forward_headers: Vec<String>,
    forward_prefixes: Vec<String>,
    response_headers: Vec<String>,
    response_prefixes: Vec<String>,
}

impl Default for MetadataBridge {
    fn default() -> Self {
        Self::from_config(&MetadataConfig::default())
    }
}

impl MetadataBridge {
    pub fn from_config(config: &MetadataConfig) -> Self {
        let lower = |v: &[String]| v.iter().map(|s| s.to_ascii_lowercase()).collect();
        Self {
            forward_headers: lower(&config.forward_headers),
            forward_prefixes: lower(&config.forward_prefixes),
            response_headers: lower(&config.response_headers),
            response_prefixes: lower(&config.response_prefixes),
        }
    }

    fn forwards(&self, key: &str) -> bool {
        !is_reserved(key)
            && (self.forward_headers.iter().any(|h| h == key)
                || self.forward_prefixes.iter().any(|p| key.starts_with(p.as_str())))
    }

    fn exposes(&self, key: &str) -> bool {
        !is_reserved(key)
            && (self.response_headers.iter().any(|h| h == key)
                || self.response_prefixes.iter().any(|p| key.starts_with(p.as_str())))
    }

    /// Build call metadata from inbound request headers.
    pub fn incoming(&self, headers: &HeaderMap, remote: Option<SocketAddr>) -> Metadata {
        let mut md = Metadata::new();

        for (name, value) in headers {
            let key = name.as_str();
            let value = match value.to_str() {
                Ok(v) => v,
                Err(_) => {
                    tracing::debug!(header = %key, "Skipping non-UTF-8 header");
                    continue;
                }
            };

            if let Some(stripped) = key.strip_prefix(METADATA_HEADER_PREFIX) {
                if !stripped.is_empty() && !is_reserved(stripped) {
                    md.append(stripped, value);
                }
                continue;
            }

            if self.forwards(key) {
                md.append(key, value);
            }
        }

        if !md.contains_key(X_FORWARDED_HOST) {
            if let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
                md.append(X_FORWARDED_HOST, host);
            }
        }

        if let Some(addr) = remote {
            let forwarded = match headers.get(X_FORWARDED_FOR).and_then(|h| h.to_str().ok()) {
                Some(existing) if !existing.is_empty() => format!("{}, {}", existing, addr.ip()),
                _ => addr.ip().to_string(),
            };
            md.insert(X_FORWARDED_FOR, forwarded);
        }

        md
    }

    /// Build response headers from outcome metadata. Trailers land after headers.
    pub fn outgoing(&self, headers_md: &Metadata, trailers_md: &Metadata) -> HeaderMap {
        let mut out = HeaderMap::new();
        for (key, value) in headers_md.iter().chain(trailers_md.iter()) {
            if !self.exposes(key) {
                continue;
            }
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                tracing::debug!(key = %key, "Dropping metadata not representable as a header");
                continue;
            };
            out.append(name, value);
        }
        out
    }
}
