//! Call boundary subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → handler.rs (decode wire-neutral value into the typed request)
//!     → UnaryCall::call(ctx, request)
//!         server mode: in-process implementation / local.rs closures
//!         client mode: forward::RemoteCall over the managed connection
//!     → CallResponse | Status
//! ```
//!
//! # Design Decisions
//! - One capability trait for local and remote calls, chosen at registration
//! - Unary only; streaming descriptors are rejected when a binding is registered
//! - The dispatcher never sees typed values, only `serde_json::Value`

pub mod context;
pub mod handler;
pub mod local;
pub mod status;

pub use context::CallContext;
pub use handler::{Handler, TypedHandler};
pub use local::{unary_fn, FnCall};
pub use status::{Code, Status};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::metadata::Metadata;

/// Shape of an RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

/// Identifies an RPC method and its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    path: String,
    kind: MethodKind,
}

impl MethodDescriptor {
    pub fn new(path: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn unary(path: impl Into<String>) -> Self {
        Self::new(path, MethodKind::Unary)
    }

    /// Full method path, `/package.Service/Method`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn is_unary(&self) -> bool {
        self.kind == MethodKind::Unary
    }

    /// Returns `(service, method)` when the path has the canonical shape.
    pub fn split(&self) -> Option<(&str, &str)> {
        let rest = self.path.strip_prefix('/')?;
        let (service, method) = rest.split_once('/')?;
        if service.is_empty() || method.is_empty() || method.contains('/') {
            return None;
        }
        Some((service, method))
    }
}

/// Successful outcome of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse<T> {
    pub message: T,
    pub headers: Metadata,
    pub trailers: Metadata,
}

impl<T> CallResponse<T> {
    pub fn new(message: T) -> Self {
        Self {
            message,
            headers: Metadata::new(),
            trailers: Metadata::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    pub fn with_trailer(mut self, key: &str, value: impl Into<String>) -> Self {
        self.trailers.append(key, value);
        self
    }
}

/// A unary RPC method the gateway can invoke.
///
/// Implemented by in-process services (server mode) and by
/// [`RemoteCall`](crate::forward::RemoteCall) (client mode).
#[async_trait]
pub trait UnaryCall: Send + Sync + 'static {
    /// Request message. An empty HTTP body yields `Default::default()`.
    type Request: DeserializeOwned + Default + Send + 'static;
    type Response: Serialize + Send + 'static;

    fn descriptor(&self) -> &MethodDescriptor;

    async fn call(
        &self,
        ctx: CallContext,
        request: Self::Request,
    ) -> Result<CallResponse<Self::Response>, Status>;
}
