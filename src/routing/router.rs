//! Binding table and lookup.
//!
//! # Responsibilities
//! - Store compiled bindings per HTTP method
//! - Look up the binding for a request
//! - Return matched binding or explicit NotFound
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) method lookup via HashMap
//! - O(n) pattern scan per method (acceptable for typical binding counts)
//! - Duplicate (method, pattern) pairs are rejected at registration

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::call::Handler;
use crate::error::{GatewayError, RegistrationError};
use crate::routing::pattern::{PathParams, PathPattern};

/// How the request body populates the request message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPolicy {
    /// The whole body is the request message.
    #[default]
    #[serde(alias = "*")]
    Decode,
    /// The body is not read; query parameters fill the message instead.
    #[serde(rename = "none", alias = "")]
    Ignore,
}

/// A registered route: method + pattern → handler.
pub struct Binding {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
    body: BodyPolicy,
}

impl Binding {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn body(&self) -> BodyPolicy {
        self.body
    }

    /// RPC method path this binding invokes.
    pub fn rpc(&self) -> &str {
        self.handler.descriptor().path()
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("method", &self.method)
            .field("pattern", &self.pattern.template())
            .field("rpc", &self.rpc())
            .field("body", &self.body)
            .finish()
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub binding: Arc<Binding>,
    pub params: PathParams,
}

/// Accumulates bindings, then freezes into a [`Router`].
#[derive(Debug, Default)]
pub struct RouterBuilder {
    routes: HashMap<Method, Vec<Arc<Binding>>>,
    count: usize,
}

fn parse_method(method: &str) -> Result<Method, RegistrationError> {
    let is_token = !method.is_empty() && method.bytes().all(|b| b.is_ascii_uppercase());
    if !is_token {
        return Err(RegistrationError::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(method.as_bytes())
        .map_err(|_| RegistrationError::InvalidMethod(method.to_string()))
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding whose body is the request message.
    pub fn register(
        &mut self,
        method: &str,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, RegistrationError> {
        self.register_binding(method, pattern, handler, BodyPolicy::Decode)
    }

    pub fn register_binding(
        &mut self,
        method: &str,
        pattern: &str,
        handler: Arc<dyn Handler>,
        body: BodyPolicy,
    ) -> Result<&mut Self, RegistrationError> {
        let method = parse_method(method)?;
        let pattern = PathPattern::parse(pattern).map_err(|source| {
            RegistrationError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        let descriptor = handler.descriptor();
        if descriptor.split().is_none() {
            return Err(RegistrationError::InvalidRpcPath(descriptor.path().to_string()));
        }
        if !descriptor.is_unary() {
            return Err(RegistrationError::Streaming {
                rpc: descriptor.path().to_string(),
            });
        }

        let bindings = self.routes.entry(method.clone()).or_default();
        if bindings.iter().any(|b| b.pattern.same_shape(&pattern)) {
            return Err(RegistrationError::Conflict {
                method: method.to_string(),
                pattern: pattern.template().to_string(),
            });
        }

        tracing::debug!(
            method = %method,
            pattern = %pattern,
            rpc = %descriptor.path(),
            "Registered binding"
        );

        bindings.push(Arc::new(Binding {
            method,
            pattern,
            handler,
            body,
        }));
        self.count += 1;
        Ok(self)
    }

    pub fn build(self) -> Router {
        Router {
            routes: self.routes,
            count: self.count,
        }
    }
}

/// Immutable binding table.
#[derive(Debug, Default)]
pub struct Router {
    routes: HashMap<Method, Vec<Arc<Binding>>>,
    count: usize,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Find the binding for `method` and `path` (query already stripped).
    pub fn lookup(&self, method: &Method, path: &str) -> Result<RouteMatch, GatewayError> {
        let not_found = || GatewayError::NotFound {
            method: method.to_string(),
            path: path.to_string(),
        };

        let bindings = self.routes.get(method).ok_or_else(not_found)?;
        bindings
            .iter()
            .find_map(|binding| {
                binding.pattern.matches(path).map(|params| RouteMatch {
                    binding: Arc::clone(binding),
                    params,
                })
            })
            .ok_or_else(not_found)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// All bindings, grouped by method.
    pub fn bindings(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.routes.values().flatten()
    }
}
