//! Response construction.
//!
//! # Responsibilities
//! - Encode successful call results with the outbound marshaler
//! - Render every failure as `{code, message, details}`
//! - Copy outcome metadata into response headers before the status line
//!
//! # Design Decisions
//! - Error bodies always go out: outbound marshaler, then JSON, then a fixed literal
//! - Content-Type always names the encoding actually used

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::call::{CallResponse, Status};
use crate::error::GatewayError;
use crate::marshal::{JsonMarshaler, Marshaler};
use crate::metadata::MetadataBridge;

const FALLBACK_ERROR: &[u8] = br#"{"code":"internal","message":"failed to marshal error message","details":[]}"#;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Vec<Value>,
}

impl ErrorBody {
    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            code: err.code().as_str().to_string(),
            message: err.message(),
            details: err.details().to_vec(),
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "code": self.code,
            "message": self.message,
            "details": self.details,
        })
    }
}

fn build(status: StatusCode, content_type: &'static str, headers: HeaderMap, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().extend(headers);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// 200 response carrying the encoded message.
pub fn forward_response(
    outcome: CallResponse<Value>,
    marshaler: &dyn Marshaler,
    bridge: &MetadataBridge,
) -> Response {
    let headers = bridge.outgoing(&outcome.headers, &outcome.trailers);
    match marshaler.encode(&outcome.message) {
        Ok(body) => build(StatusCode::OK, marshaler.content_type(), headers, body),
        Err(e) => {
            tracing::error!(error = %e, content_type = marshaler.content_type(), "Failed to marshal response");
            let status = Status::internal(e.to_string())
                .with_headers(outcome.headers)
                .with_trailers(outcome.trailers);
            error_response(&GatewayError::Call(status), marshaler, bridge)
        }
    }
}

/// Error response for any gateway failure.
pub fn error_response(
    err: &GatewayError,
    marshaler: &dyn Marshaler,
    bridge: &MetadataBridge,
) -> Response {
    let headers = err
        .metadata()
        .map(|(h, t)| bridge.outgoing(h, t))
        .unwrap_or_default();
    let value = ErrorBody::from_error(err).to_value();

    let (content_type, body) = match marshaler.encode(&value) {
        Ok(body) => (marshaler.content_type(), body),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to marshal error body, falling back to JSON");
            let json = JsonMarshaler::new();
            match json.encode(&value) {
                Ok(body) => (json.content_type(), body),
                Err(_) => ("application/json", Bytes::from_static(FALLBACK_ERROR)),
            }
        }
    };

    build(err.status_code(), content_type, headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodeError;
    use crate::error::DecodeError;
    use crate::metadata::Metadata;

    #[derive(Debug)]
    struct Broken;

    impl Marshaler for Broken {
        fn content_type(&self) -> &'static str {
            "application/broken"
        }
        fn decode(&self, _: &[u8]) -> Result<Value, DecodeError> {
            Err(DecodeError::new("broken"))
        }
        fn encode(&self, _: &Value) -> Result<Bytes, EncodeError> {
            Err(EncodeError("broken".into()))
        }
    }

    async fn body_of(response: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_body_and_metadata() {
        let mut headers = Metadata::new();
        headers.append("x-trace-id", "abc");
        let err = GatewayError::from(
            Status::not_found("no such face")
                .with_detail(json!({"face_id": "7"}))
                .with_headers(headers),
        );

        let response = error_response(&err, &JsonMarshaler::new(), &MetadataBridge::default());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-trace-id"], "abc");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = body_of(response).await;
        assert_eq!(body.code, "not_found");
        assert_eq!(body.message, "no such face");
        assert_eq!(body.details, vec![json!({"face_id": "7"})]);
    }

    #[tokio::test]
    async fn test_error_falls_back_to_json() {
        let err = GatewayError::from(Status::internal("boom"));
        let response = error_response(&err, &Broken, &MetadataBridge::default());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_of(response).await.code, "internal");
    }

    #[tokio::test]
    async fn test_unencodable_success_becomes_internal() {
        let outcome = CallResponse::new(json!({"ok": true}))
            .with_header("x-served-by", "face-service")
            .with_trailer("x-lookup", "hit");
        let response = forward_response(outcome, &Broken, &MetadataBridge::default());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["x-served-by"], "face-service");
        assert_eq!(response.headers()["x-lookup"], "hit");
    }
}
