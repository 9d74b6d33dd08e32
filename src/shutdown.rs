use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping after the current action...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping after the current action...");
        }
    }
}

/// Set once a shutdown signal arrives. Checked between actions; a running
/// action is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    /// A signal wired to Ctrl+C and SIGTERM.
    pub fn listen() -> Self {
        let stop = Self::default();
        let flag = stop.clone();
        tokio::spawn(async move {
            wait_for_shutdown().await;
            flag.request();
        });
        stop
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
