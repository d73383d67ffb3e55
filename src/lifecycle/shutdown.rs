//! Shutdown coordination for the gateway.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Wraps the governing cancellation token that long-running tasks (the HTTP
/// server, connection watchers) wait on.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when shutdown is triggered.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}
