//! Remote unary calls over the managed connection.

use std::error::Error as _;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use http::uri::PathAndQuery;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::client::Grpc;
use tonic::metadata::MetadataMap;

use crate::call::{CallContext, CallResponse, MethodDescriptor, Status, UnaryCall};
use crate::error::RegistrationError;
use crate::forward::codec::JsonCodec;
use crate::forward::connection::Connection;
use crate::metadata::Metadata;

/// Schemaless message used when bindings come from configuration.
pub type DynamicMessage = serde_json::Map<String, serde_json::Value>;

/// A [`UnaryCall`] forwarded to the upstream server.
pub struct RemoteCall<Req, Resp> {
    connection: Arc<Connection>,
    descriptor: MethodDescriptor,
    path: PathAndQuery,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> RemoteCall<Req, Resp> {
    pub fn new(
        connection: Arc<Connection>,
        descriptor: MethodDescriptor,
    ) -> Result<Self, RegistrationError> {
        if !descriptor.is_unary() {
            return Err(RegistrationError::Streaming {
                rpc: descriptor.path().to_string(),
            });
        }
        if descriptor.split().is_none() {
            return Err(RegistrationError::InvalidRpcPath(descriptor.path().to_string()));
        }
        let path = descriptor
            .path()
            .parse::<PathAndQuery>()
            .map_err(|_| RegistrationError::InvalidRpcPath(descriptor.path().to_string()))?;

        Ok(Self {
            connection,
            descriptor,
            path,
            _marker: PhantomData,
        })
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

/// Convert a tonic status, separating transport failures from service statuses.
fn from_tonic(status: tonic::Status) -> Status {
    if status.source().is_some() {
        return Status::upstream_unavailable(status.message());
    }
    let headers = Metadata::from_header_map(&status.metadata().clone().into_headers());
    Status::new(status.code().into(), status.message()).with_headers(headers)
}

#[async_trait]
impl<Req, Resp> UnaryCall for RemoteCall<Req, Resp>
where
    Req: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
    Resp: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Request = Req;
    type Response = Resp;

    fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: CallContext, request: Req) -> Result<CallResponse<Resp>, Status> {
        let lease = self.connection.lease()?;

        let mut grpc = Grpc::new(lease.channel());
        grpc.ready()
            .await
            .map_err(|e| Status::upstream_unavailable(e.to_string()))?;

        let mut req = tonic::Request::new(request);
        *req.metadata_mut() = MetadataMap::from_headers(ctx.metadata().to_header_map());
        if let Some(remaining) = ctx.remaining() {
            req.set_timeout(remaining);
        }

        let codec = JsonCodec::<Req, Resp>::default();
        let result = tokio::select! {
            result = grpc.unary(req, self.path.clone(), codec) => result,
            _ = ctx.cancelled() => {
                tracing::debug!(rpc = %self.descriptor.path(), "Forwarded call cancelled");
                return Err(Status::cancelled("request cancelled"));
            }
        };
        drop(lease);

        match result {
            Ok(response) => {
                // tonic folds trailers into the response metadata for unary calls
                let (metadata, message, _) = response.into_parts();
                Ok(CallResponse {
                    message,
                    headers: Metadata::from_header_map(&metadata.into_headers()),
                    trailers: Metadata::new(),
                })
            }
            Err(status) => Err(from_tonic(status)),
        }
    }
}
