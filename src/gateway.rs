//! Gateway assembly.
//!
//! # Responsibilities
//! - Register bindings in server mode (in-process calls) and client mode
//!   (forwarded calls over a managed connection)
//! - Own the governing shutdown signal and the connection watchers
//! - Freeze everything into an immutable [`Gateway`]
//!
//! # Design Decisions
//! - Registration errors surface at startup, never at request time
//! - `Gateway::shutdown` is idempotent; each connection closes once
//! - A builder dropped before `build` closes the connections it opened

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::call::{
    unary_fn, CallContext, CallResponse, Handler, MethodDescriptor, Status, TypedHandler,
    UnaryCall,
};
use crate::config::GatewayConfig;
use crate::error::{DialError, RegistrationError};
use crate::forward::{Connection, DialOptions, RemoteCall};
use crate::http::{app, DispatchOptions, Dispatcher};
use crate::lifecycle::Shutdown;
use crate::marshal::MarshalerRegistry;
use crate::metadata::MetadataBridge;
use crate::routing::{BodyPolicy, RouterBuilder};

/// Collects bindings and connections before the gateway starts serving.
#[derive(Debug)]
pub struct GatewayBuilder {
    router: RouterBuilder,
    marshalers: MarshalerRegistry,
    bridge: MetadataBridge,
    options: DispatchOptions,
    shutdown: Shutdown,
    connections: Vec<Arc<Connection>>,
    watchers: Vec<JoinHandle<()>>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            router: RouterBuilder::new(),
            marshalers: MarshalerRegistry::default(),
            bridge: MetadataBridge::default(),
            options: DispatchOptions::default(),
            shutdown: Shutdown::new(),
            connections: Vec::new(),
            watchers: Vec::new(),
        }
    }

    /// Marshalers, metadata filters and limits from configuration. Routes
    /// and the upstream are handled by `lifecycle::startup`.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new()
            .with_marshalers(MarshalerRegistry::from_config(&config.marshal))
            .with_bridge(MetadataBridge::from_config(&config.metadata))
            .with_options(DispatchOptions {
                request_timeout: Some(Duration::from_secs(config.timeouts.request_secs)),
                max_body_size: config.security.max_body_size,
            })
    }

    pub fn with_marshalers(mut self, marshalers: MarshalerRegistry) -> Self {
        self.marshalers = marshalers;
        self
    }

    pub fn with_bridge(mut self, bridge: MetadataBridge) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Use an externally owned shutdown signal.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Bind an in-process implementation (server mode).
    pub fn register<C: UnaryCall>(
        &mut self,
        method: &str,
        pattern: &str,
        call: C,
    ) -> Result<&mut Self, RegistrationError> {
        self.register_with_body(method, pattern, call, BodyPolicy::Decode)
    }

    pub fn register_with_body<C: UnaryCall>(
        &mut self,
        method: &str,
        pattern: &str,
        call: C,
        body: BodyPolicy,
    ) -> Result<&mut Self, RegistrationError> {
        self.register_handler(method, pattern, Arc::new(TypedHandler::new(call)), body)
    }

    /// Bind an async closure as an in-process unary method.
    pub fn register_local<Req, Resp, F, Fut>(
        &mut self,
        method: &str,
        pattern: &str,
        descriptor: MethodDescriptor,
        f: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        Req: DeserializeOwned + Default + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallResponse<Resp>, Status>> + Send + 'static,
    {
        self.register(method, pattern, unary_fn(descriptor, f))
    }

    pub fn register_handler(
        &mut self,
        method: &str,
        pattern: &str,
        handler: Arc<dyn Handler>,
        body: BodyPolicy,
    ) -> Result<&mut Self, RegistrationError> {
        self.router.register_binding(method, pattern, handler, body)?;
        Ok(self)
    }

    /// Open the backing connection and tie its close to the shutdown signal.
    pub async fn open_upstream(
        &mut self,
        endpoint: &str,
        opts: DialOptions,
    ) -> Result<Arc<Connection>, DialError> {
        let connection = Connection::open(endpoint, opts).await?;
        self.watchers.push(connection.watch(self.shutdown.token()));
        self.connections.push(Arc::clone(&connection));
        Ok(connection)
    }

    /// Bind a method forwarded over `connection` (client mode).
    pub fn register_remote<Req, Resp>(
        &mut self,
        method: &str,
        pattern: &str,
        connection: &Arc<Connection>,
        descriptor: MethodDescriptor,
        body: BodyPolicy,
    ) -> Result<&mut Self, RegistrationError>
    where
        Req: Serialize + DeserializeOwned + Default + Send + Sync + 'static,
        Resp: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let call = RemoteCall::<Req, Resp>::new(Arc::clone(connection), descriptor)?;
        self.register_with_body(method, pattern, call, body)
    }

    pub fn build(mut self) -> Gateway {
        let router = Arc::new(std::mem::take(&mut self.router).build());
        let connections = std::mem::take(&mut self.connections);
        let watchers = std::mem::take(&mut self.watchers);
        tracing::info!(
            bindings = router.len(),
            upstreams = connections.len(),
            "Gateway built"
        );

        let dispatcher = Dispatcher::new(
            router,
            std::mem::take(&mut self.marshalers),
            std::mem::take(&mut self.bridge),
            std::mem::take(&mut self.options),
        );
        Gateway {
            dispatcher: Arc::new(dispatcher),
            shutdown: self.shutdown.clone(),
            connections,
            watchers: Mutex::new(watchers),
        }
    }
}

impl Drop for GatewayBuilder {
    fn drop(&mut self) {
        // Only reached with connections when `build` never ran.
        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }
        for connection in self.connections.drain(..) {
            if connection.close() {
                tracing::warn!(
                    endpoint = %connection.endpoint(),
                    "Closed upstream of a gateway that was never built"
                );
            }
        }
    }
}

/// A built gateway: immutable bindings plus owned connections.
#[derive(Debug)]
pub struct Gateway {
    dispatcher: Arc<Dispatcher>,
    shutdown: Shutdown,
    connections: Vec<Arc<Connection>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Axum router serving every binding.
    pub fn http_router(&self) -> axum::Router {
        app(Arc::clone(&self.dispatcher))
    }

    pub fn connections(&self) -> &[Arc<Connection>] {
        &self.connections
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Trigger shutdown and wait for every connection watcher to finish.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let watchers = std::mem::take(&mut *self.watchers.lock());
        for watcher in watchers {
            if let Err(e) = watcher.await {
                tracing::warn!(error = %e, "Connection watcher failed");
            }
        }
    }
}
