//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → lifecycle::startup builds the Gateway from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; bindings are fixed at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    GatewayConfig, ListenerConfig, MarshalConfig, MetadataConfig, ObservabilityConfig,
    RouteConfig, SecurityConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
