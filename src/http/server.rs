//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router that hands every request to the dispatcher
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener with peer addresses
//! - Stop accepting on the governing shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::gateway::Gateway;
use crate::http::dispatcher::Dispatcher;

/// Build the Axum router for a dispatcher.
///
/// Every path reaches the dispatcher; unmatched requests get the gateway's
/// own 404 body rather than Axum's.
pub fn app(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(gateway_handler)
        .with_state(dispatcher)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn gateway_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request<Body>,
) -> Response {
    dispatcher.dispatch(request).await
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    shutdown: CancellationToken,
}

impl HttpServer {
    pub fn new(gateway: &Gateway) -> Self {
        Self {
            router: gateway.http_router(),
            shutdown: gateway.shutdown_handle().token(),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(self.shutdown.cancelled_owned())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
