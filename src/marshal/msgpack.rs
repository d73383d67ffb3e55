//! MessagePack marshaler (`application/msgpack`).

use bytes::Bytes;
use serde_json::Value;

use crate::error::{DecodeError, EncodeError};
use crate::marshal::Marshaler;

/// Maps are written with field names so bodies stay self-describing.
#[derive(Debug, Clone, Default)]
pub struct MsgPackMarshaler;

impl Marshaler for MsgPackMarshaler {
    fn content_type(&self) -> &'static str {
        "application/msgpack"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(rmp_serde::from_slice(bytes)?)
    }

    fn encode(&self, value: &Value) -> Result<Bytes, EncodeError> {
        Ok(Bytes::from(rmp_serde::to_vec_named(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip() {
        let m = MsgPackMarshaler;
        let v = json!({"image": "aGVsbG8=", "count": 3, "scores": [0.5, -1.25], "tag": null});
        assert_eq!(m.decode(&m.encode(&v).unwrap()).unwrap(), v);
    }

    #[test]
    fn test_truncated_input_is_decode_error() {
        let m = MsgPackMarshaler;
        let encoded = m.encode(&json!({"image": "abcdef"})).unwrap();
        assert!(m.decode(&encoded[..encoded.len() - 2]).is_err());
        assert_eq!(m.decode(b"").unwrap(), Value::Null);
    }
}
