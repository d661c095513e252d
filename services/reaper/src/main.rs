//! Backupuccino backup reaper
//!
//! Periodically discovers the servers behind a panel API key and prunes
//! their backups according to the configured retention policy.

use std::sync::Arc;

use anyhow::Result;
use backupuccino_reaper::{logging, shutdown, Config, PanelClient, Reconciler, ReconcilerConfig};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    logging::init(&config.log_level, config.log_file.as_deref())?;

    info!("Starting backupuccino reaper");
    info!(
        api_url = %config.api_url,
        key_hint = %config.api_key.hint(),
        max_backup_limit = config.retention.max_backup_limit,
        delete_locked = config.retention.delete_locked,
        count_locked = config.retention.count_locked,
        http_retry_count = config.http.retry_count,
        "Configuration loaded"
    );

    // One connection pool for the process lifetime
    let panel = match PanelClient::new(&config) {
        Ok(panel) => Arc::new(panel),
        Err(e) => {
            error!(error = %e, "Failed to create panel client");
            return Err(e);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut reconciler = Reconciler::new(
        panel,
        config.retention.clone(),
        ReconcilerConfig::from(&config),
    );
    let mut reconciler_handle = tokio::spawn(async move {
        reconciler.run(shutdown_rx).await;
    });

    let interrupted = tokio::select! {
        _ = shutdown::ctrl_c() => true,
        result = &mut reconciler_handle => {
            match result {
                Ok(()) => info!("Reconciler exited"),
                Err(e) => error!(error = %e, "Reconciler task panicked"),
            }
            false
        }
    };

    if interrupted {
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);

        // Let an in-flight cycle finish its deletions
        if let Err(e) = reconciler_handle.await {
            error!(error = %e, "Reconciler task panicked");
        }
    }

    info!("Bye!");
    Ok(())
}

