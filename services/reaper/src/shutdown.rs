//! Process shutdown signal.

use std::future::Future;
use std::io;

use tracing::error;

/// Wait for ctrl-c.
pub async fn ctrl_c() {
    watch_signal(tokio::signal::ctrl_c()).await
}

/// Resolve when `signal` fires. If the listener fails to install, the error
/// is logged and this never resolves.
pub async fn watch_signal<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
