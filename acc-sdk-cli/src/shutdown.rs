//! Shutdown signal handling.
//!
//! [`Shutdown`] listens for SIGTERM and SIGINT on Unix (Ctrl-C elsewhere)
//! and cancels a [`CancellationToken`] when one arrives. Long-running
//! commands hand clones of the token to their subsystems.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels a token on the first shutdown signal.
#[allow(missing_debug_implementations)] // TaskTracker doesn't impl Debug
pub struct Shutdown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl Shutdown {
    /// Installs the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)] // Result needed on Unix for signal registration
    pub fn install() -> Result<Self, std::io::Error> {
        let inner = CancellationToken::new();
        let outer = inner.clone();
        let task_tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
                    () = inner.cancelled() => {}
                }
                inner.cancel();
            });
        }

        #[cfg(not(unix))]
        {
            task_tracker.spawn(async move {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(err) = result {
                            tracing::warn!(error = %err, "Failed to listen for Ctrl-C");
                        } else {
                            tracing::info!("Received Ctrl-C, shutting down");
                        }
                    }
                    () = inner.cancelled() => {}
                }
                inner.cancel();
            });
        }

        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token: outer,
        })
    }

    /// A clone of the token cancelled on shutdown.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Waits for a shutdown signal and for the handler task to finish.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}
