//! Closure-backed unary calls for server mode.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::call::{CallContext, CallResponse, MethodDescriptor, Status, UnaryCall};

/// A [`UnaryCall`] backed by an async closure.
pub struct FnCall<Req, Resp, F> {
    descriptor: MethodDescriptor,
    f: F,
    _marker: PhantomData<fn(Req) -> Resp>,
}

/// Wrap an async closure as an in-process unary method.
///
/// ```ignore
/// let detect = unary_fn(
///     MethodDescriptor::unary("/face.FaceService/Detect"),
///     |_ctx, req: DetectRequest| async move { Ok(CallResponse::new(detect(req))) },
/// );
/// ```
pub fn unary_fn<Req, Resp, F, Fut>(descriptor: MethodDescriptor, f: F) -> FnCall<Req, Resp, F>
where
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CallResponse<Resp>, Status>> + Send + 'static,
{
    FnCall {
        descriptor,
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<Req, Resp, F, Fut> UnaryCall for FnCall<Req, Resp, F>
where
    Req: DeserializeOwned + Default + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CallResponse<Resp>, Status>> + Send + 'static,
{
    type Request = Req;
    type Response = Resp;

    fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: CallContext, request: Req) -> Result<CallResponse<Resp>, Status> {
        (self.f)(ctx, request).await
    }
}
