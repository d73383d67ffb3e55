//! HTTP/JSON → RPC gateway library.
//!
//! Exposes unary RPC methods as plain HTTP endpoints: a pattern router picks
//! the binding, a marshaler decodes the body, the metadata bridge carries
//! headers across, and the call runs either in-process (server mode) or over
//! a managed upstream connection (forwarding mode).

pub mod call;
pub mod config;
pub mod error;
pub mod forward;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod marshal;
pub mod metadata;
pub mod observability;
pub mod routing;

pub use call::{CallContext, CallResponse, Code, MethodDescriptor, Status, UnaryCall};
pub use config::GatewayConfig;
pub use error::{GatewayError, RegistrationError};
pub use gateway::{Gateway, GatewayBuilder};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
