//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceExt;

use rpc_gateway::call::{CallContext, CallResponse, MethodDescriptor, Status, UnaryCall};
use rpc_gateway::http::ErrorBody;
use rpc_gateway::routing::BodyPolicy;
use rpc_gateway::{Gateway, GatewayBuilder};

pub const DETECT_RPC: &str = "/com.sekirocc.face_service.FaceService/Detect";
pub const GET_FACE_RPC: &str = "/com.sekirocc.face_service.FaceService/GetFace";
pub const ECHO_RPC: &str = "/com.sekirocc.face_service.FaceService/Echo";

#[derive(Debug, Default, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub image: String,
    pub faces: u32,
}

/// In-process face service counting its invocations.
pub struct FaceService {
    descriptor: MethodDescriptor,
    calls: Arc<AtomicUsize>,
}

impl FaceService {
    pub fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            descriptor: MethodDescriptor::unary(DETECT_RPC),
            calls,
        }
    }
}

#[async_trait]
impl UnaryCall for FaceService {
    type Request = DetectRequest;
    type Response = DetectResponse;

    fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    async fn call(
        &self,
        ctx: CallContext,
        request: DetectRequest,
    ) -> Result<CallResponse<DetectResponse>, Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ctx.set_header("x-served-by", "face-service");

        match request.image.as_str() {
            "missing" => {
                ctx.set_trailer("x-lookup", "miss");
                return Err(Status::not_found("no such face"));
            }
            "forbidden" => return Err(Status::permission_denied("not allowed")),
            "slow" => tokio::time::sleep(Duration::from_secs(10)).await,
            _ => {}
        }

        let mut response = CallResponse::new(DetectResponse {
            faces: request.image.len() as u32,
            image: request.image,
        });
        if let Some(trace) = ctx.metadata().get("x-trace-id") {
            response = response.with_header("x-trace-id", trace);
        }
        if let Some(forwarded) = ctx.metadata().get("x-forwarded-for") {
            response = response.with_header("x-seen-forwarded-for", forwarded);
        }
        if let Some(tenant) = ctx.metadata().get("tenant") {
            response = response.with_trailer("x-tenant", tenant);
        }
        Ok(response)
    }
}

/// Builder with the face service and two echo bindings registered.
pub fn face_gateway(calls: Arc<AtomicUsize>) -> GatewayBuilder {
    let mut builder = Gateway::builder();
    builder
        .register("POST", "/detect_face", FaceService::new(calls))
        .unwrap()
        .register_local(
            "GET",
            "/v1/faces/{face_id}",
            MethodDescriptor::unary(GET_FACE_RPC),
            |_ctx: CallContext, request: Value| async move { Ok::<_, Status>(CallResponse::new(request)) },
        )
        .unwrap()
        .register_local(
            "POST",
            "/v1/echo/{path=**}",
            MethodDescriptor::unary(ECHO_RPC),
            |_ctx: CallContext, request: Value| async move { Ok::<_, Status>(CallResponse::new(request)) },
        )
        .unwrap();
    builder
}

/// Same as [`face_gateway`] with the GET binding ignoring the body.
pub fn face_gateway_with_query(calls: Arc<AtomicUsize>) -> GatewayBuilder {
    let mut builder = Gateway::builder();
    builder
        .register("POST", "/detect_face", FaceService::new(calls))
        .unwrap()
        .register_handler(
            "GET",
            "/v1/faces/{face_id}",
            Arc::new(rpc_gateway::call::TypedHandler::new(rpc_gateway::call::unary_fn(
                MethodDescriptor::unary(GET_FACE_RPC),
                |_ctx: CallContext, request: Value| async move { Ok::<_, Status>(CallResponse::new(request)) },
            ))),
            BodyPolicy::Ignore,
        )
        .unwrap();
    builder
}

pub fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send one request through the gateway's router.
pub async fn send(gateway: &Gateway, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = gateway.http_router().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

pub fn error_body(body: &[u8]) -> ErrorBody {
    serde_json::from_slice(body).unwrap()
}
