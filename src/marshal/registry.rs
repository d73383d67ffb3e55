//! Content negotiation.
//!
//! # Responsibilities
//! - Hold the marshalers the gateway can speak, keyed by MIME essence
//! - Pick the inbound marshaler from `Content-Type`
//! - Pick the outbound marshaler from `Accept`, falling back to the inbound one

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use mime::Mime;

use crate::config::MarshalConfig;
use crate::marshal::{JsonMarshaler, Marshaler, MsgPackMarshaler};

/// Marshalers by media type plus a default.
#[derive(Debug, Clone)]
pub struct MarshalerRegistry {
    default: Arc<dyn Marshaler>,
    entries: Vec<(String, Arc<dyn Marshaler>)>,
}

impl Default for MarshalerRegistry {
    fn default() -> Self {
        Self::from_config(&MarshalConfig::default())
    }
}

fn essence(raw: &str) -> Option<String> {
    raw.trim()
        .parse::<Mime>()
        .ok()
        .map(|m| m.essence_str().to_ascii_lowercase())
}

impl MarshalerRegistry {
    /// A registry with only `default`, registered under its own content type.
    pub fn new(default: Arc<dyn Marshaler>) -> Self {
        let mut registry = Self {
            default: Arc::clone(&default),
            entries: Vec::new(),
        };
        registry.insert(default.content_type(), default);
        registry
    }

    pub fn from_config(config: &MarshalConfig) -> Self {
        let json: Arc<dyn Marshaler> = if config.pretty_json {
            Arc::new(JsonMarshaler::pretty())
        } else {
            Arc::new(JsonMarshaler::new())
        };
        let mut registry = Self::new(json);
        if config.msgpack {
            let msgpack: Arc<dyn Marshaler> = Arc::new(MsgPackMarshaler);
            registry.insert("application/msgpack", Arc::clone(&msgpack));
            registry.insert("application/x-msgpack", msgpack);
        }
        registry
    }

    /// Register `marshaler` for `media_type`, replacing any previous entry.
    pub fn insert(&mut self, media_type: &str, marshaler: Arc<dyn Marshaler>) {
        let key = essence(media_type).unwrap_or_else(|| media_type.to_ascii_lowercase());
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, marshaler));
    }

    pub fn default_marshaler(&self) -> Arc<dyn Marshaler> {
        Arc::clone(&self.default)
    }

    /// Marshaler for a single media type, ignoring parameters.
    pub fn get(&self, media_type: &str) -> Option<Arc<dyn Marshaler>> {
        let key = essence(media_type)?;
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, m)| Arc::clone(m))
    }

    /// Returns `(inbound, outbound)` for a request.
    pub fn for_request(&self, headers: &HeaderMap) -> (Arc<dyn Marshaler>, Arc<dyn Marshaler>) {
        let inbound = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| self.get(ct))
            .unwrap_or_else(|| self.default_marshaler());

        let outbound = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .find_map(|entry| {
                if essence(entry).as_deref() == Some("*/*") {
                    return Some(self.default_marshaler());
                }
                self.get(entry)
            })
            .unwrap_or_else(|| Arc::clone(&inbound));

        (inbound, outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn registry() -> MarshalerRegistry {
        MarshalerRegistry::from_config(&MarshalConfig {
            pretty_json: false,
            msgpack: true,
        })
    }

    #[test]
    fn test_defaults_to_json() {
        let (inbound, outbound) = registry().for_request(&HeaderMap::new());
        assert_eq!(inbound.content_type(), "application/json");
        assert_eq!(outbound.content_type(), "application/json");
    }

    #[test]
    fn test_content_type_with_params() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-msgpack; charset=binary"),
        );
        let (inbound, outbound) = registry().for_request(&headers);
        assert_eq!(inbound.content_type(), "application/msgpack");
        // no Accept: answer in the request's encoding
        assert_eq!(outbound.content_type(), "application/msgpack");
    }

    #[test]
    fn test_accept_picks_first_supported() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html, application/msgpack;q=0.9, */*"),
        );
        let (inbound, outbound) = registry().for_request(&headers);
        assert_eq!(inbound.content_type(), "application/json");
        assert_eq!(outbound.content_type(), "application/msgpack");
    }

    #[test]
    fn test_unknown_content_type_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let (inbound, _) = registry().for_request(&headers);
        assert_eq!(inbound.content_type(), "application/json");

        let json_only = MarshalerRegistry::from_config(&MarshalConfig {
            pretty_json: false,
            msgpack: false,
        });
        assert!(json_only.get("application/msgpack").is_none());
        assert!(MarshalerRegistry::default().get("application/msgpack").is_some());
    }
}
