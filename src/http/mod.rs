//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace layer)
//!     → dispatcher.rs (match, bridge, decode, invoke)
//!     → response.rs (bridge metadata back, encode body or error)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod response;
pub mod server;

pub use dispatcher::{DispatchOptions, Dispatcher, RequestCancellation};
pub use response::ErrorBody;
pub use server::{app, HttpServer};
