//! Marshaling subsystem.
//!
//! # Data Flow
//! ```text
//! Request body bytes
//!     → registry.rs (pick inbound marshaler by Content-Type)
//!     → Marshaler::decode → serde_json::Value
//!     ... call ...
//! serde_json::Value (response or error body)
//!     → registry.rs (pick outbound marshaler by Accept)
//!     → Marshaler::encode → response body bytes
//! ```
//!
//! # Design Decisions
//! - `serde_json::Value` is the wire-neutral value for every encoding
//! - An empty body decodes to `Value::Null`, never an error
//! - Unknown media types fall back to the default (JSON) marshaler

pub mod json;
pub mod msgpack;
pub mod registry;

pub use json::JsonMarshaler;
pub use msgpack::MsgPackMarshaler;
pub use registry::MarshalerRegistry;

use bytes::Bytes;
use serde_json::Value;

use crate::error::{DecodeError, EncodeError};

/// Converts between a byte encoding and the wire-neutral value.
pub trait Marshaler: Send + Sync + std::fmt::Debug {
    /// Media type written to the `Content-Type` response header.
    fn content_type(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError>;

    fn encode(&self, value: &Value) -> Result<Bytes, EncodeError>;
}

pub(crate) fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}
