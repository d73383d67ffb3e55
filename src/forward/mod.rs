//! Forwarding (client) mode.
//!
//! # Data Flow
//! ```text
//! Dispatcher → RemoteCall::call(ctx, request)
//!     → connection.rs (lease channel + in-flight guard)
//!     → tonic Grpc::unary with codec.rs (JSON payloads in gRPC framing)
//!     → response metadata captured into CallResponse / Status
//!
//! Shutdown signal → Connection::watch task → Connection::close (once)
//! ```
//!
//! # Design Decisions
//! - One shared channel per upstream; tonic multiplexes calls over it
//! - Lazy by default: the first call dials
//! - Close never waits for in-flight calls; they hold their own channel clone
//! - Transport failures are reported as upstream failures (502), distinct from
//!   statuses returned by the remote service

pub mod client;
pub mod codec;
pub mod connection;

pub use client::{DynamicMessage, RemoteCall};
pub use codec::JsonCodec;
pub use connection::{Connection, DialOptions, Lease};
