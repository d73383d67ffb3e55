//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Open upstream → Register bindings → Gateway
//!
//! Shutdown (shutdown.rs):
//!     Signal received → token cancelled
//!         → HTTP server stops accepting (graceful)
//!         → connection watchers close the upstream once
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then upstream, then listeners
//! - One governing token; per-request tokens are never its children
//! - Triggering twice is harmless

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
