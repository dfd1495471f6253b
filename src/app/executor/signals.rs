//! Cancellation signals
//!
//! Cancellation is a broadcast: the CLI wires CTRL-C and SIGTERM to it, and
//! library callers may send on the channel directly. The executor polls its
//! receiver only between batches, so a batch already in flight always runs
//! to completion before the run stops.

use tokio::signal;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Forwards OS termination signals to a cancellation broadcaster
pub struct SignalHandler {
    cancel_tx: broadcast::Sender<()>,
}

impl SignalHandler {
    /// Create a new signal handler with the given broadcaster
    pub fn new(cancel_tx: broadcast::Sender<()>) -> Self {
        Self { cancel_tx }
    }

    /// Spawn the background task waiting for CTRL-C or SIGTERM
    pub fn setup(&self) -> JoinHandle<()> {
        let cancel_tx = self.cancel_tx.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received Ctrl+C, stopping after the current batch");
                },
                _ = terminate => {
                    info!("Received terminate signal, stopping after the current batch");
                },
            }

            let _ = cancel_tx.send(());
        })
    }
}

/// Create a cancellation broadcaster
pub fn create_cancel_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    broadcast::channel(1)
}

/// Non-blocking check whether cancellation was requested
///
/// A lagged receiver counts as cancelled; a closed channel with no pending
/// message does not.
pub fn is_cancel_requested(cancel_rx: &mut broadcast::Receiver<()>) -> bool {
    match cancel_rx.try_recv() {
        Ok(()) | Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
    }
}
