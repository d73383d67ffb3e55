//! Type-erased call handlers.
//!
//! The router stores `Arc<dyn Handler>`; each handler owns the typed
//! [`UnaryCall`] and converts between `serde_json::Value` and its message
//! types at the edge.

use async_trait::async_trait;
use serde_json::Value;

use crate::call::{CallContext, CallResponse, MethodDescriptor, Status, UnaryCall};
use crate::error::{DecodeError, GatewayError};

/// Erased view of a [`UnaryCall`].
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    fn descriptor(&self) -> &MethodDescriptor;

    /// Decode `request`, invoke the call and encode the response message.
    async fn invoke(
        &self,
        ctx: CallContext,
        request: Value,
    ) -> Result<CallResponse<Value>, GatewayError>;
}

/// Adapter from a typed [`UnaryCall`] to [`Handler`].
pub struct TypedHandler<C> {
    call: C,
}

impl<C: UnaryCall> TypedHandler<C> {
    pub fn new(call: C) -> Self {
        Self { call }
    }

    pub fn inner(&self) -> &C {
        &self.call
    }
}

/// Null (empty body) decodes to the default message.
pub(crate) fn decode_request<T>(value: Value) -> Result<T, DecodeError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match value {
        Value::Null => Ok(T::default()),
        other => serde_json::from_value(other).map_err(DecodeError::from),
    }
}

#[async_trait]
impl<C: UnaryCall> Handler for TypedHandler<C> {
    fn descriptor(&self) -> &MethodDescriptor {
        self.call.descriptor()
    }

    async fn invoke(
        &self,
        ctx: CallContext,
        request: Value,
    ) -> Result<CallResponse<Value>, GatewayError> {
        let request: C::Request = decode_request(request)?;

        let response = self.call.call(ctx, request).await?;

        let message = serde_json::to_value(&response.message).map_err(|e| {
            Status::internal(format!("failed to serialize response: {}", e))
        })?;

        Ok(CallResponse {
            message,
            headers: response.headers,
            trailers: response.trailers,
        })
    }
}
