//! Backing connection lifecycle.
//!
//! # Responsibilities
//! - Parse the endpoint and build the shared channel (lazy or eager)
//! - Hand out channel leases and count calls in flight
//! - Close exactly once, on explicit close or the governing signal
//!
//! # Design Decisions
//! - The open/closed transition is a single atomic swap
//! - A closed connection never reopens; later calls fail as upstream errors
//! - No retry on dial failure; callers decide

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use http::uri::InvalidUri;
use http::Uri;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};

use crate::call::Status;
use crate::error::DialError;
use crate::observability::metrics;

/// How to establish the backing connection.
#[derive(Debug, Clone)]
pub struct DialOptions {
    /// Upper bound for establishing the transport.
    pub connect_timeout: Duration,
    /// Connect before `open` returns instead of on the first call.
    pub block: bool,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            block: false,
        }
    }
}

/// Shared connection to the upstream RPC server.
#[derive(Debug)]
pub struct Connection {
    endpoint: String,
    channel: ArcSwapOption<Channel>,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter when dropped.
#[derive(Debug)]
struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A channel handed to one call.
#[derive(Debug)]
pub struct Lease {
    channel: Channel,
    _guard: InFlightGuard,
}

impl Lease {
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }
}

impl Connection {
    /// Build the connection to `endpoint`, e.g. `http://127.0.0.1:50051`.
    pub async fn open(endpoint: &str, opts: DialOptions) -> Result<Arc<Self>, DialError> {
        let invalid = |reason: String| DialError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let uri: Uri = endpoint
            .parse()
            .map_err(|e: InvalidUri| invalid(e.to_string()))?;
        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            Some(other) => return Err(invalid(format!("unsupported scheme {:?}", other))),
            None => return Err(invalid("missing scheme".to_string())),
        }
        if uri.host().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        let ep = Endpoint::from(uri).connect_timeout(opts.connect_timeout);

        let channel = if opts.block {
            let connect_err = |reason: String| DialError::Connect {
                endpoint: endpoint.to_string(),
                reason,
            };
            tokio::time::timeout(opts.connect_timeout, ep.connect())
                .await
                .map_err(|_| connect_err("timed out".to_string()))?
                .map_err(|e| connect_err(e.to_string()))?
        } else {
            ep.connect_lazy()
        };

        tracing::info!(endpoint = %endpoint, block = opts.block, "Opened upstream connection");

        Ok(Arc::new(Self {
            endpoint: endpoint.to_string(),
            channel: ArcSwapOption::from_pointee(channel),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Borrow the channel for one call.
    pub fn lease(&self) -> Result<Lease, Status> {
        let channel = self.channel.load_full().ok_or_else(|| {
            Status::upstream_unavailable(format!("connection to {} is closed", self.endpoint))
        })?;
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        Ok(Lease {
            channel: (*channel).clone(),
            _guard: InFlightGuard {
                counter: Arc::clone(&self.in_flight),
            },
        })
    }

    /// Calls currently holding a lease.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.channel.load().is_none()
    }

    /// Close the connection. Returns true only for the call that closed it.
    pub fn close(&self) -> bool {
        let closed = self.channel.swap(None).is_some();
        if closed {
            tracing::info!(
                endpoint = %self.endpoint,
                in_flight = self.in_flight(),
                "Closed upstream connection"
            );
            metrics::record_upstream_closed(&self.endpoint);
        }
        closed
    }

    /// Close the connection once `token` is cancelled.
    pub fn watch(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let conn = Arc::clone(self);
        tokio::spawn(async move {
            token.cancelled().await;
            conn.close();
        })
    }
}
