//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the upstream connection named in the configuration
//! - Register every configured route as a forwarded binding
//! - Return a ready gateway; listeners are bound by the caller
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Routes use schemaless JSON messages; the upstream defines their shape

use std::time::Duration;

use thiserror::Error;

use crate::call::MethodDescriptor;
use crate::config::GatewayConfig;
use crate::error::{DialError, RegistrationError};
use crate::forward::{DialOptions, DynamicMessage};
use crate::gateway::{Gateway, GatewayBuilder};
use crate::lifecycle::Shutdown;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open upstream: {0}")]
    Dial(#[from] DialError),

    #[error("route {route:?}: {source}")]
    Route {
        route: String,
        #[source]
        source: RegistrationError,
    },
}

/// Build a gateway from validated configuration.
pub async fn build_gateway(
    config: &GatewayConfig,
    shutdown: Shutdown,
) -> Result<Gateway, StartupError> {
    let mut builder = GatewayBuilder::from_config(config).with_shutdown(shutdown);

    let Some(upstream) = &config.upstream else {
        tracing::warn!("No upstream configured; every request will be answered with 404");
        return Ok(builder.build());
    };

    let opts = DialOptions {
        connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
        block: upstream.block,
    };
    let connection = builder.open_upstream(&upstream.endpoint, opts).await?;

    for route in &config.routes {
        builder
            .register_remote::<DynamicMessage, DynamicMessage>(
                &route.method,
                &route.pattern,
                &connection,
                MethodDescriptor::unary(route.rpc.as_str()),
                route.body,
            )
            .map_err(|source| StartupError::Route {
                route: route.name.clone(),
                source,
            })?;

        tracing::info!(
            route = %route.name,
            method = %route.method,
            pattern = %route.pattern,
            rpc = %route.rpc,
            "Route registered"
        );
    }

    Ok(builder.build())
}
