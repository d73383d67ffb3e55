//! End-to-end dispatch tests against in-process services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use rpc_gateway::call::{CallContext, CallResponse, MethodDescriptor, Status};
use rpc_gateway::forward::DialOptions;
use rpc_gateway::http::{DispatchOptions, RequestCancellation};
use rpc_gateway::Gateway;

mod common;
use common::{error_body, face_gateway, face_gateway_with_query, json_request, send, DETECT_RPC};

#[tokio::test]
async fn test_detect_face_pure_echo() {
    let mut builder = Gateway::builder();
    builder
        .register_local(
            "POST",
            "/detect_face",
            MethodDescriptor::unary(DETECT_RPC),
            |ctx: CallContext, request: Value| async move {
                let mut response = CallResponse::new(request);
                if let Some(trace) = ctx.metadata().get("x-trace-id") {
                    response = response.with_header("x-trace-id", trace);
                }
                Ok::<_, Status>(response)
            },
        )
        .unwrap();
    let gateway = builder.build();

    let mut request = json_request("POST", "/detect_face", r#"{"image":"abc"}"#);
    request
        .headers_mut()
        .insert("x-trace-id", "trace-abc".parse().unwrap());
    let (status, headers, body) = send(&gateway, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-trace-id"], "trace-abc");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"image": "abc"}));
}

#[tokio::test]
async fn test_detect_face_echo() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gateway = face_gateway(calls.clone()).build();

    let mut request = json_request("POST", "/detect_face", r#"{"image":"aGVsbG8="}"#);
    request
        .headers_mut()
        .insert("x-trace-id", "trace-123".parse().unwrap());

    let (status, headers, body) = send(&gateway, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-trace-id"], "trace-123");
    assert_eq!(headers["x-served-by"], "face-service");
    assert_eq!(headers["content-type"], "application/json");

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"image": "aGVsbG8=", "faces": 8}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_handler_not_found() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gateway = face_gateway(calls).build();

    let (status, headers, body) =
        send(&gateway, json_request("POST", "/detect_face", r#"{"image":"missing"}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    // metadata set before the failure still reaches the client
    assert_eq!(headers["x-served-by"], "face-service");
    assert_eq!(headers["x-lookup"], "miss");

    let body = error_body(&body);
    assert_eq!(body.code, "not_found");
    assert_eq!(body.message, "no such face");
}

#[tokio::test]
async fn test_handler_status_mapping() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0))).build();
    let (status, _, body) =
        send(&gateway, json_request("POST", "/detect_face", r#"{"image":"forbidden"}"#)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_body(&body).code, "permission_denied");
}

#[tokio::test]
async fn test_malformed_json_never_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gateway = face_gateway(calls.clone()).build();

    let (status, _, body) = send(&gateway, json_request("POST", "/detect_face", r#"{"image":"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(&body).code, "invalid_argument");

    let (status, _, _) = send(&gateway, json_request("POST", "/detect_face", r#"{"image": 5}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_body_is_default_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gateway = face_gateway(calls.clone()).build();

    let (status, _, body) = send(&gateway, json_request("POST", "/detect_face", "")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"image": "", "faces": 0}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_route_miss() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0))).build();

    for (method, uri) in [
        ("POST", "/detect_faces"),
        ("POST", "/detect_face/"),
        ("GET", "/detect_face"),
        ("POST", "/"),
    ] {
        let (status, _, body) = send(&gateway, json_request(method, uri, "{}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert_eq!(error_body(&body).code, "not_found");
    }
}

#[tokio::test]
async fn test_path_params_merged() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0))).build();

    let (status, _, body) = send(&gateway, json_request("GET", "/v1/faces/f%2042", "")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"face_id": "f 42"}));

    let (status, _, body) = send(
        &gateway,
        json_request("POST", "/v1/echo/a/b/c?ignored=1", r#"{"keep": true}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"keep": true, "path": "a/b/c"}));
}

#[tokio::test]
async fn test_query_params_for_bodyless_binding() {
    let gateway = face_gateway_with_query(Arc::new(AtomicUsize::new(0))).build();

    let request = Request::builder()
        .method("GET")
        .uri("/v1/faces/7?face_id=overridden&size=large&tag=a&tag=b")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&gateway, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"face_id": "7", "size": "large", "tag": ["a", "b"]}));
}

#[tokio::test]
async fn test_metadata_prefix_and_trailers() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0))).build();

    let mut request = json_request("POST", "/detect_face", r#"{"image":"x"}"#);
    request
        .headers_mut()
        .insert("grpc-metadata-tenant", "acme".parse().unwrap());
    let (status, headers, _) = send(&gateway, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-tenant"], "acme");
}

#[tokio::test]
async fn test_msgpack_roundtrip() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0))).build();

    let payload = rmp_serde::to_vec_named(&json!({"image": "abc"})).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/detect_face")
        .header("content-type", "application/msgpack")
        .body(Body::from(payload))
        .unwrap();

    let (status, headers, body) = send(&gateway, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/msgpack");
    let body: Value = rmp_serde::from_slice(&body).unwrap();
    assert_eq!(body, json!({"image": "abc", "faces": 3}));
}

#[tokio::test]
async fn test_accept_selects_response_encoding() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0))).build();

    let mut request = json_request("POST", "/detect_face", r#"{"image":"missing"}"#);
    request
        .headers_mut()
        .insert("accept", "application/msgpack".parse().unwrap());
    let (status, headers, body) = send(&gateway, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers["content-type"], "application/msgpack");
    let body: Value = rmp_serde::from_slice(&body).unwrap();
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_request_cancellation_keeps_connection_open() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut builder = face_gateway(calls.clone());
    let connection = builder
        .open_upstream("http://127.0.0.1:1", DialOptions::default())
        .await
        .unwrap();
    let gateway = builder.build();

    // already cancelled: the handler never runs
    let token = CancellationToken::new();
    token.cancel();
    let mut request = json_request("POST", "/detect_face", r#"{"image":"x"}"#);
    request.extensions_mut().insert(RequestCancellation(token));
    let (status, _, body) = send(&gateway, request).await;
    assert_eq!(status.as_u16(), 499);
    assert_eq!(error_body(&body).code, "cancelled");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // cancelled mid-call
    let token = CancellationToken::new();
    let mut request = json_request("POST", "/detect_face", r#"{"image":"slow"}"#);
    request
        .extensions_mut()
        .insert(RequestCancellation(token.clone()));
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let (status, _, _) = send(&gateway, request).await;
    assert_eq!(status.as_u16(), 499);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(!connection.is_closed());
    gateway.shutdown().await;
    assert!(connection.is_closed());
}

#[tokio::test]
async fn test_deadline_from_grpc_timeout() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0))).build();

    let mut request = json_request("POST", "/detect_face", r#"{"image":"slow"}"#);
    request
        .headers_mut()
        .insert("grpc-timeout", "50m".parse().unwrap());
    let (status, _, body) = send(&gateway, request).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(error_body(&body).code, "deadline_exceeded");
}

#[tokio::test]
async fn test_configured_timeout_and_body_limit() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0)))
        .with_options(DispatchOptions {
            request_timeout: Some(Duration::from_millis(50)),
            max_body_size: 32,
        })
        .build();

    let (status, _, _) =
        send(&gateway, json_request("POST", "/detect_face", r#"{"image":"slow"}"#)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

    let big = format!(r#"{{"image":"{}"}}"#, "a".repeat(64));
    let (status, _, body) = send(&gateway, json_request("POST", "/detect_face", &big)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(&body).code, "invalid_argument");
}

#[tokio::test]
async fn test_request_id_is_set_and_propagated() {
    let gateway = face_gateway(Arc::new(AtomicUsize::new(0))).build();

    let (_, headers, _) = send(&gateway, json_request("POST", "/detect_face", "{}")).await;
    assert!(headers.contains_key("x-request-id"));

    let mut request = json_request("POST", "/detect_face", "{}");
    request
        .headers_mut()
        .insert("x-request-id", "req-1".parse().unwrap());
    let (_, headers, _) = send(&gateway, request).await;
    assert_eq!(headers["x-request-id"], "req-1");
}
