//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) and, on Unix, SIGTERM
//! - Translate the first signal into a shutdown trigger

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    std::future::pending::<()>().await;
}

/// Spawn a task that triggers `shutdown` on the first termination signal.
pub fn spawn_signal_handler(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
                tracing::info!("Shutdown signal received (SIGINT)");
            }
            _ = terminate() => {
                tracing::info!("Shutdown signal received (SIGTERM)");
            }
            _ = shutdown.wait() => return,
        }
        shutdown.trigger();
    })
}
