//! Per-request call context.
//!
//! # Responsibilities
//! - Carry inbound metadata, deadline and cancellation for one call
//! - Collect response header/trailer metadata set by in-process services
//! - Release the cancellation scope on every exit path (drop guard)
//!
//! # Design Decisions
//! - Cheap to clone: all state lives behind one `Arc`
//! - The token is never linked to the connection's governing signal

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};

use crate::metadata::Metadata;

#[derive(Debug, Default)]
struct ResponseMetadata {
    headers: Metadata,
    trailers: Metadata,
}

#[derive(Debug)]
struct Inner {
    method: String,
    metadata: Metadata,
    deadline: Option<Instant>,
    token: CancellationToken,
    response: Mutex<ResponseMetadata>,
}

/// Context handed to every [`UnaryCall`](crate::call::UnaryCall).
#[derive(Debug, Clone)]
pub struct CallContext {
    inner: Arc<Inner>,
}

impl CallContext {
    pub fn new(
        method: impl Into<String>,
        metadata: Metadata,
        deadline: Option<Instant>,
        token: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                method: method.into(),
                metadata,
                deadline,
                token,
                response: Mutex::new(ResponseMetadata::default()),
            }),
        }
    }

    /// Full RPC method path, e.g. `/pkg.Service/Method`.
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Metadata bridged from the inbound request.
    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left until the deadline; zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once the call is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }

    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Guard that cancels this context when dropped.
    pub fn drop_guard(&self) -> DropGuard {
        self.inner.token.clone().drop_guard()
    }

    /// Set a response header from inside an in-process implementation.
    pub fn set_header(&self, key: &str, value: impl Into<String>) {
        self.inner.response.lock().headers.append(key, value);
    }

    /// Set a response trailer from inside an in-process implementation.
    pub fn set_trailer(&self, key: &str, value: impl Into<String>) {
        self.inner.response.lock().trailers.append(key, value);
    }

    /// Drain metadata set through [`set_header`](Self::set_header) and
    /// [`set_trailer`](Self::set_trailer).
    pub fn take_response_metadata(&self) -> (Metadata, Metadata) {
        let mut response = self.inner.response.lock();
        (
            std::mem::take(&mut response.headers),
            std::mem::take(&mut response.trailers),
        )
    }
}
