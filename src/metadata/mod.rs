//! Call metadata subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound HTTP headers
//!     → bridge.rs (allow-list / prefix filter)
//!     → Metadata attached to CallContext
//!     → handler / upstream call
//!
//! Outcome header + trailer Metadata
//!     → bridge.rs (response-visible subset, trailers merged last)
//!     → HTTP response headers
//! ```
//!
//! # Design Decisions
//! - One ordered multi-map type for both directions
//! - Keys are lower-cased on insert, so lookups are case-insensitive
//! - Insertion order of keys and of values per key is preserved

pub mod bridge;
pub mod timeout;

pub use bridge::MetadataBridge;
pub use timeout::{parse_timeout, InvalidTimeout, TIMEOUT_HEADER};

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Ordered multi-map of metadata keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, Vec<String>)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any existing values for the key.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Replace all values for the key with a single value.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => *values = vec![value],
            None => self.entries.push((key, vec![value])),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let key = key.to_ascii_lowercase();
        let idx = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// First value for the key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// All values for the key, in insertion order.
    pub fn get_all(&self, key: &str) -> &[String] {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        !self.get_all(key).is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterate over every (key, value) pair, one item per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every value of `other` after the values already present.
    pub fn join(&mut self, other: Metadata) {
        for (key, values) in other.entries {
            for value in values {
                self.append(&key, value);
            }
        }
    }

    /// Copy every header with a UTF-8 value.
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut md = Self::new();
        for (name, value) in headers {
            match value.to_str() {
                Ok(v) => md.append(name.as_str(), v),
                Err(_) => tracing::debug!(header = %name, "Skipping non-UTF-8 metadata value"),
            }
        }
        md
    }

    /// Convert to a header map, skipping entries that are not valid HTTP headers.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, value) in self.iter() {
            let name = match HeaderName::from_bytes(key.as_bytes()) {
                Ok(n) => n,
                Err(_) => {
                    tracing::debug!(key = %key, "Skipping invalid metadata key");
                    continue;
                }
            };
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.append(name, v);
                }
                Err(_) => tracing::debug!(key = %key, "Skipping invalid metadata value"),
            }
        }
        headers
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut md = Self::new();
        for (k, v) in iter {
            md.append(k, v);
        }
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut md = Metadata::new();
        md.append("X-Trace-Id", "abc");
        assert_eq!(md.get("x-trace-id"), Some("abc"));
        assert_eq!(md.get("X-TRACE-ID"), Some("abc"));
        assert_eq!(md.keys().collect::<Vec<_>>(), vec!["x-trace-id"]);
    }

    #[test]
    fn test_repeated_values_keep_order() {
        let mut md = Metadata::new();
        md.append("x-b", "1");
        md.append("x-a", "first");
        md.append("X-B", "2");
        assert_eq!(md.get_all("x-b"), &["1".to_string(), "2".to_string()]);
        assert_eq!(md.keys().collect::<Vec<_>>(), vec!["x-b", "x-a"]);
        assert_eq!(md.len(), 2);
    }

    #[test]
    fn test_insert_replaces() {
        let mut md: Metadata = [("x-a", "1"), ("x-a", "2")].into_iter().collect();
        md.insert("x-a", "3");
        assert_eq!(md.get_all("x-a"), &["3".to_string()]);
    }

    #[test]
    fn test_join_appends_after_existing() {
        let mut headers: Metadata = [("x-a", "1")].into_iter().collect();
        let trailers: Metadata = [("x-a", "2"), ("x-b", "3")].into_iter().collect();
        headers.join(trailers);
        assert_eq!(headers.get_all("x-a"), &["1".to_string(), "2".to_string()]);
        assert_eq!(headers.get("x-b"), Some("3"));
    }

    #[test]
    fn test_header_map_conversion() {
        let mut headers = HeaderMap::new();
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));
        let md = Metadata::from_header_map(&headers);
        assert_eq!(md.get_all("x-multi").len(), 2);

        let back = md.to_header_map();
        let values: Vec<_> = back.get_all("x-multi").iter().collect();
        assert_eq!(values, vec!["a", "b"]);
    }
}
