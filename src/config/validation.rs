//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes need an upstream)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::call::MethodDescriptor;
use crate::config::schema::GatewayConfig;
use crate::routing::PathPattern;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected \"pretty\" or \"json\", got {:?}", other),
        )),
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if let Some(upstream) = &config.upstream {
        match url::Url::parse(&upstream.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            Ok(url) => errors.push(ValidationError::new(
                "upstream.endpoint",
                format!("unsupported endpoint {:?} (scheme {})", upstream.endpoint, url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                "upstream.endpoint",
                format!("invalid URL {:?}: {}", upstream.endpoint, e),
            )),
        }
    } else if !config.routes.is_empty() {
        errors.push(ValidationError::new("upstream", "routes are configured but no upstream is set"));
    }

    let mut seen: Vec<(&str, PathPattern)> = Vec::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = |name: &str| format!("routes[{}].{}", i, name);

        if route.name.is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        }

        let method_ok = !route.method.is_empty()
            && route.method.bytes().all(|b| b.is_ascii_uppercase());
        if !method_ok {
            errors.push(ValidationError::new(
                field("method"),
                format!("expected an uppercase HTTP method, got {:?}", route.method),
            ));
        }

        if MethodDescriptor::unary(route.rpc.as_str()).split().is_none() {
            errors.push(ValidationError::new(
                field("rpc"),
                format!("expected /package.Service/Method, got {:?}", route.rpc),
            ));
        }

        match PathPattern::parse(&route.pattern) {
            Ok(pattern) => {
                let duplicate = seen
                    .iter()
                    .any(|(m, p)| *m == route.method && p.same_shape(&pattern));
                if duplicate {
                    errors.push(ValidationError::new(
                        field("pattern"),
                        format!("duplicate binding for {} {}", route.method, route.pattern),
                    ));
                } else {
                    seen.push((route.method.as_str(), pattern));
                }
            }
            Err(e) => errors.push(ValidationError::new(
                field("pattern"),
                format!("{:?}: {}", route.pattern, e),
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RouteConfig, UpstreamConfig};
    use crate::routing::BodyPolicy;

    fn route(method: &str, pattern: &str) -> RouteConfig {
        RouteConfig {
            name: "r".into(),
            method: method.into(),
            pattern: pattern.into(),
            rpc: "/face.FaceService/Detect".into(),
            body: BodyPolicy::Decode,
        }
    }

    fn with_upstream(routes: Vec<RouteConfig>) -> GatewayConfig {
        GatewayConfig {
            upstream: Some(UpstreamConfig {
                endpoint: "http://127.0.0.1:50051".into(),
                block: false,
            }),
            routes,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_routes() {
        let config = with_upstream(vec![route("GET", "/v1/{a}"), route("GET", "/v1/{b}")]);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "routes[1].pattern");

        let config = with_upstream(vec![route("GET", "/v1/{a}"), route("POST", "/v1/{a}")]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_routes_require_upstream() {
        let config = GatewayConfig {
            routes: vec![route("POST", "/detect_face")],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "upstream");
    }

    #[test]
    fn test_bad_endpoint() {
        let mut config = with_upstream(vec![]);
        config.upstream = Some(UpstreamConfig {
            endpoint: "unix:/tmp/sock".into(),
            block: false,
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "upstream.endpoint");
    }
}
