//! Request dispatch.
//!
//! # Responsibilities
//! - Run one HTTP request through match, bridge, decode, invoke, encode
//! - Merge path (and, for body-less bindings, query) parameters into the request
//! - Race the call against request cancellation and the deadline
//! - Record per-request metrics and a structured log line
//!
//! # Design Decisions
//! - Routing and decode failures never reach a handler
//! - The call context is cancelled on every exit path (drop guard)
//! - The effective deadline is the earlier of `grpc-timeout` and the configured timeout

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::call::{CallContext, CallResponse, Status};
use crate::error::{DecodeError, GatewayError};
use crate::http::response::{error_response, forward_response};
use crate::marshal::{Marshaler, MarshalerRegistry};
use crate::metadata::{parse_timeout, Metadata, MetadataBridge, TIMEOUT_HEADER};
use crate::observability::metrics;
use crate::routing::{BodyPolicy, PathParams, RouteMatch, Router};

/// Per-request limits.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Upper bound for one call; `None` leaves only `grpc-timeout`.
    pub request_timeout: Option<Duration>,
    /// Largest request body read, in bytes.
    pub max_body_size: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            max_body_size: 4 * 1024 * 1024,
        }
    }
}

/// Request extension carrying a caller-owned cancellation token.
///
/// The call context token is a child of it: cancelling this cancels the call,
/// never the other way round.
#[derive(Debug, Clone)]
pub struct RequestCancellation(pub CancellationToken);

/// Runs requests against an immutable binding table.
#[derive(Debug)]
pub struct Dispatcher {
    router: Arc<Router>,
    marshalers: MarshalerRegistry,
    bridge: MetadataBridge,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(
        router: Arc<Router>,
        marshalers: MarshalerRegistry,
        bridge: MetadataBridge,
        options: DispatchOptions,
    ) -> Self {
        Self {
            router,
            marshalers,
            bridge,
            options,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one request end to end. Never fails: errors become responses.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start = std::time::Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        // 1. Negotiate and match
        let (inbound, outbound) = self.marshalers.for_request(request.headers());

        let route = match self.router.lookup(&method, &path) {
            Ok(route) => route,
            Err(err) => {
                tracing::debug!(request_id = %request_id, method = %method, path = %path, "No binding matched");
                let response = error_response(&err, outbound.as_ref(), &self.bridge);
                metrics::record_request("none", response.status().as_u16(), start);
                return response;
            }
        };
        let rpc = route.binding.rpc().to_string();

        let response = match self.invoke(route, request, inbound.as_ref()).await {
            Ok(outcome) => forward_response(outcome, outbound.as_ref(), &self.bridge),
            Err(err) => {
                match &err {
                    GatewayError::Upstream(_) => {
                        tracing::error!(request_id = %request_id, rpc = %rpc, error = %err, "Upstream error")
                    }
                    _ => {
                        tracing::debug!(request_id = %request_id, rpc = %rpc, code = %err.code(), error = %err, "Call failed")
                    }
                }
                error_response(&err, outbound.as_ref(), &self.bridge)
            }
        };

        let status = response.status().as_u16();
        metrics::record_request(&rpc, status, start);
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            rpc = %rpc,
            status = status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }

    fn deadline(&self, headers: &HeaderMap) -> Result<Option<Instant>, GatewayError> {
        let now = Instant::now();
        let configured = self.options.request_timeout.map(|t| now + t);

        let requested = match headers.get(TIMEOUT_HEADER) {
            None => None,
            Some(raw) => {
                let raw = raw
                    .to_str()
                    .map_err(|_| DecodeError::new("invalid grpc-timeout header"))?;
                let timeout = parse_timeout(raw).map_err(|e| DecodeError::new(e.to_string()))?;
                Some(now + timeout)
            }
        };

        Ok(match (configured, requested) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        })
    }

    async fn invoke(
        &self,
        route: RouteMatch,
        request: Request<Body>,
        inbound: &dyn Marshaler,
    ) -> Result<CallResponse<Value>, GatewayError> {
        let RouteMatch { binding, params } = route;
        let (parts, body) = request.into_parts();

        // 2. Call context
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        let metadata = self.bridge.incoming(&parts.headers, remote);
        let deadline = self.deadline(&parts.headers)?;
        let token = parts
            .extensions
            .get::<RequestCancellation>()
            .map(|c| c.0.child_token())
            .unwrap_or_default();

        let ctx = CallContext::new(binding.rpc(), metadata, deadline, token);
        let _scope = ctx.drop_guard();

        // 3. Body and parameters
        let mut message = match binding.body() {
            BodyPolicy::Decode => {
                let bytes = axum::body::to_bytes(body, self.options.max_body_size)
                    .await
                    .map_err(|e| DecodeError::new(format!("failed to read request body: {}", e)))?;
                inbound.decode(&bytes)?
            }
            BodyPolicy::Ignore => query_message(parts.uri.query())?,
        };
        merge_path_params(&mut message, &params)?;

        // 4. Invoke
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        let outcome: Result<CallResponse<Value>, GatewayError> = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Status::cancelled("request cancelled").into()),
            _ = expired => Err(Status::deadline_exceeded("deadline exceeded").into()),
            result = binding.handler().invoke(ctx.clone(), message) => result,
        };

        // 5. Join metadata set through the context
        let (ctx_headers, ctx_trailers) = ctx.take_response_metadata();
        match outcome {
            Ok(mut response) => {
                response.headers = joined(ctx_headers, response.headers);
                response.trailers = joined(ctx_trailers, response.trailers);
                Ok(response)
            }
            Err(GatewayError::Call(mut status)) => {
                status.headers = joined(ctx_headers, std::mem::take(&mut status.headers));
                status.trailers = joined(ctx_trailers, std::mem::take(&mut status.trailers));
                Err(GatewayError::Call(status))
            }
            Err(other) => Err(other),
        }
    }
}

fn joined(mut first: Metadata, second: Metadata) -> Metadata {
    first.join(second);
    first
}

/// Set `value` at a dotted field path, creating nested objects.
///
/// With `append`, an existing string or array leaf collects repeated values.
fn set_field(message: &mut Value, name: &str, value: String, append: bool) -> Result<(), DecodeError> {
    if message.is_null() {
        *message = Value::Object(Map::new());
    }

    let mut current = message;
    let mut fields = name.split('.').peekable();
    while let Some(field) = fields.next() {
        let object = current.as_object_mut().ok_or_else(|| {
            DecodeError::new(format!("cannot set parameter {:?}: {:?} is not an object", name, field))
        })?;

        if fields.peek().is_none() {
            match object.get_mut(field) {
                Some(Value::Array(items)) if append => items.push(Value::String(value)),
                Some(existing) if append && existing.is_string() => {
                    let previous = existing.take();
                    *existing = Value::Array(vec![previous, Value::String(value)]);
                }
                _ => {
                    object.insert(field.to_string(), Value::String(value));
                }
            }
            return Ok(());
        }

        current = object
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}

fn merge_path_params(message: &mut Value, params: &PathParams) -> Result<(), DecodeError> {
    for (name, value) in params.iter() {
        set_field(message, name, value.to_string(), false)?;
    }
    Ok(())
}

fn query_message(query: Option<&str>) -> Result<Value, DecodeError> {
    let mut message = Value::Null;
    if let Some(query) = query {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            set_field(&mut message, &name, value.into_owned(), true)?;
        }
    }
    Ok(message)
}
