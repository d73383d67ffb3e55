//! JSON marshaler.

use bytes::Bytes;
use serde_json::Value;

use crate::error::{DecodeError, EncodeError};
use crate::marshal::{is_blank, Marshaler};

#[derive(Debug, Clone, Default)]
pub struct JsonMarshaler {
    pretty: bool,
}

impl JsonMarshaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent encoded output.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Marshaler for JsonMarshaler {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        if is_blank(bytes) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    fn encode(&self, value: &Value) -> Result<Bytes, EncodeError> {
        let out = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(Bytes::from(out))
    }
}
