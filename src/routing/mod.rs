//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (per-method binding table)
//!     → pattern.rs (segment-by-segment template match)
//!     → Return: RouteMatch { binding, params } or NotFound
//!
//! Route Compilation (at startup):
//!     (method, template, handler)[]
//!     → Parse templates into segments
//!     → Reject conflicts and streaming methods
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same binding
//! - First registered match wins

pub mod pattern;
pub mod router;

pub use pattern::{PathParams, PathPattern, PatternError};
pub use router::{Binding, BodyPolicy, RouteMatch, Router, RouterBuilder};
