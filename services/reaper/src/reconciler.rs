//! Reconciliation loop for converging backup inventories.
//!
//! The reconciler:
//! - Discovers the servers managed by the panel
//! - Prunes every active server's backups concurrently
//! - Waits for every pruning task, then sleeps until the next cycle
//!
//! A cycle never overlaps the previous one: all deletions from cycle N have
//! finished before cycle N+1 starts discovery.

use std::sync::Arc;
use std::time::Duration;

use backupuccino_retention::{select_for_deletion, Deletion, RetentionConfig, Server};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backups::BackupInventory;
use crate::client::PanelClient;
use crate::config::Config;
use crate::error::DiscoveryError;
use crate::inventory::ServerInventory;

/// Reconciliation loop configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Sleep between the end of one cycle and the start of the next.
    pub check_interval: Duration,

    /// Maximum servers pruned at the same time.
    pub max_concurrent_servers: usize,

    /// Stop after a single cycle.
    pub once: bool,

    /// Redacted API key, for "no servers" diagnostics.
    pub key_hint: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(3600),
            max_concurrent_servers: 8,
            once: false,
            key_hint: String::new(),
        }
    }
}

impl From<&Config> for ReconcilerConfig {
    fn from(config: &Config) -> Self {
        Self {
            check_interval: config.check_interval,
            max_concurrent_servers: config.max_concurrent_servers,
            once: config.once,
            key_hint: config.api_key.hint(),
        }
    }
}

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Discovering,
    Pruning,
    Sleeping,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CyclePhase::Idle => write!(f, "idle"),
            CyclePhase::Discovering => write!(f, "discovering"),
            CyclePhase::Pruning => write!(f, "pruning"),
            CyclePhase::Sleeping => write!(f, "sleeping"),
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Discovery succeeded and every active server was pruned.
    Pruned,

    /// Discovery succeeded but the key sees no servers.
    NoServers,

    /// Discovery failed; nothing was pruned.
    Skipped,
}

/// Result of pruning one server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: usize,
    pub failed: usize,
    pub listing_failed: bool,
}

/// Summary of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub servers_discovered: usize,
    pub servers_pruned: usize,
    pub backups_deleted: usize,
    pub deletions_failed: usize,
    pub listings_failed: usize,
    pub tasks_failed: usize,
}

impl CycleReport {
    fn new(outcome: CycleOutcome, servers_discovered: usize) -> Self {
        Self {
            outcome,
            servers_discovered,
            servers_pruned: 0,
            backups_deleted: 0,
            deletions_failed: 0,
            listings_failed: 0,
            tasks_failed: 0,
        }
    }

    fn log(&self) {
        info!(
            outcome = ?self.outcome,
            servers_discovered = self.servers_discovered,
            servers_pruned = self.servers_pruned,
            backups_deleted = self.backups_deleted,
            deletions_failed = self.deletions_failed,
            listings_failed = self.listings_failed,
            tasks_failed = self.tasks_failed,
            "Reconciliation cycle complete"
        );
    }

    fn absorb(&mut self, report: PruneReport) {
        self.servers_pruned += 1;
        self.backups_deleted += report.deleted;
        self.deletions_failed += report.failed;
        if report.listing_failed {
            self.listings_failed += 1;
        }
    }
}

/// Reconciler for converging backup inventories.
pub struct Reconciler {
    servers: ServerInventory,
    backups: BackupInventory,
    retention: RetentionConfig,
    config: ReconcilerConfig,

    /// Servers from the last successful discovery.
    known_servers: Vec<Server>,

    phase: CyclePhase,
}

impl Reconciler {
    /// Create a new reconciler sharing one panel client across components.
    pub fn new(panel: Arc<PanelClient>, retention: RetentionConfig, config: ReconcilerConfig) -> Self {
        Self {
            servers: ServerInventory::new(Arc::clone(&panel)),
            backups: BackupInventory::new(panel),
            retention,
            config,
            known_servers: Vec::new(),
            phase: CyclePhase::Idle,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Servers from the last successful discovery.
    pub fn known_servers(&self) -> &[Server] {
        &self.known_servers
    }

    fn set_phase(&mut self, phase: CyclePhase) {
        debug!(from = %self.phase, to = %phase, "Reconciler phase change");
        self.phase = phase;
    }

    /// Run the reconciliation loop until shutdown (or after one cycle in
    /// single-cycle mode).
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            check_interval_secs = self.config.check_interval.as_secs(),
            max_concurrent_servers = self.config.max_concurrent_servers,
            max_backup_limit = self.retention.max_backup_limit,
            delete_locked = self.retention.delete_locked,
            once = self.config.once,
            "Starting reconciliation loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            if self.config.once {
                info!("Single cycle complete");
                break;
            }

            self.set_phase(CyclePhase::Sleeping);
            if !self.sleep(&mut shutdown).await {
                break;
            }
        }

        info!("Reconciler shutting down");
        self.set_phase(CyclePhase::Idle);
    }

    /// Sleep for the check interval. Returns false if shutdown was requested.
    async fn sleep(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(self.config.check_interval);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return false;
                    }
                }
            }
        }
    }

    /// Perform a single discovery and pruning pass.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.set_phase(CyclePhase::Discovering);

        let report = match self.servers.list_servers().await {
            Err(e) => {
                self.log_discovery_failure(&e);
                CycleReport::new(CycleOutcome::Skipped, 0)
            }
            Ok(servers) if servers.is_empty() => {
                self.known_servers = servers;
                warn!(key_hint = %self.config.key_hint, "No servers were found using this key");
                CycleReport::new(CycleOutcome::NoServers, 0)
            }
            Ok(servers) => {
                self.known_servers = servers;
                self.set_phase(CyclePhase::Pruning);
                self.prune_all().await
            }
        };

        report.log();
        report
    }

    fn log_discovery_failure(&self, e: &DiscoveryError) {
        let known_servers = self.known_servers.len();
        match e {
            _ if e.is_unauthorized() => error!(
                error = %e,
                key_hint = %self.config.key_hint,
                "Authentication failed, skipping cycle"
            ),
            DiscoveryError::Mapping { .. } | DiscoveryError::Schema(_) => error!(
                error = %e,
                known_servers,
                "Server inventory rejected, keeping previous server list"
            ),
            DiscoveryError::Request(_) => error!(
                error = %e,
                known_servers,
                "Server discovery failed, skipping cycle"
            ),
        }
    }

    /// Prune every active server concurrently and wait for all of them.
    async fn prune_all(&self) -> CycleReport {
        let mut report = CycleReport::new(CycleOutcome::Pruned, self.known_servers.len());
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_servers.max(1)));

        let handles: Vec<_> = self
            .known_servers
            .iter()
            .filter(|server| server.is_active())
            .cloned()
            .map(|server| {
                let server_uuid = server.uuid;
                let backups = self.backups.clone();
                let retention = self.retention.clone();
                let permits = Arc::clone(&permits);
                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    prune_server(&backups, &server, &retention).await
                });
                (server_uuid, handle)
            })
            .collect();

        join_pruning_tasks(&mut report, handles).await;
        report
    }
}

/// Wait for every pruning task. A task that panics or is cancelled is
/// counted and does not stop the others from being collected.
async fn join_pruning_tasks(report: &mut CycleReport, handles: Vec<(Uuid, JoinHandle<PruneReport>)>) {
    for (server_uuid, handle) in handles {
        match handle.await {
            Ok(prune) => report.absorb(prune),
            Err(e) => {
                report.tasks_failed += 1;
                error!(server_uuid = %server_uuid, error = %e, "Pruning task failed");
            }
        }
    }
}

/// Apply the retention policy to one server.
///
/// Deletion failures are counted and left for the next cycle.
pub async fn prune_server(
    backups: &BackupInventory,
    server: &Server,
    retention: &RetentionConfig,
) -> PruneReport {
    let mut report = PruneReport::default();

    let listed = match backups.list_backups(server).await {
        Ok(listed) => listed,
        Err(e) => {
            warn!(
                server_uuid = %server.uuid,
                server_name = %server.name,
                error = %e,
                "Failed to list backups"
            );
            report.listing_failed = true;
            return report;
        }
    };

    let deletions = select_for_deletion(&listed, retention);
    if deletions.is_empty() {
        debug!(server_uuid = %server.uuid, "No backups ready for deletion");
        return report;
    }

    for Deletion { backup, reason } in deletions {
        match backups.delete_backup(server, &backup).await {
            Ok(()) => {
                report.deleted += 1;
                info!(
                    server_uuid = %server.uuid,
                    server_name = %server.name,
                    node = %server.node,
                    backup_uuid = %backup.uuid,
                    backup_name = %backup.name,
                    size_gib = backup.size_gib(),
                    created_at = %backup.created_at,
                    reason = %reason,
                    "Deleted backup"
                );
            }
            Err(_) => report.failed += 1,
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciler_config_default() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(3600));
        assert_eq!(config.max_concurrent_servers, 8);
        assert!(!config.once);
    }

    #[test]
    fn test_cycle_report_absorb() {
        let mut report = CycleReport::new(CycleOutcome::Pruned, 3);
        report.absorb(PruneReport {
            deleted: 2,
            failed: 1,
            listing_failed: false,
        });
        report.absorb(PruneReport {
            deleted: 0,
            failed: 0,
            listing_failed: true,
        });

        assert_eq!(report.servers_pruned, 2);
        assert_eq!(report.backups_deleted, 2);
        assert_eq!(report.deletions_failed, 1);
        assert_eq!(report.listings_failed, 1);
    }

    async fn exploding_prune() -> PruneReport {
        panic!("pruning task blew up")
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let deleting = |deleted| {
            tokio::spawn(async move {
                PruneReport {
                    deleted,
                    ..PruneReport::default()
                }
            })
        };
        let handles = vec![
            (Uuid::from_u128(1), deleting(2)),
            (Uuid::from_u128(2), tokio::spawn(exploding_prune())),
            (Uuid::from_u128(3), deleting(1)),
        ];

        let mut report = CycleReport::new(CycleOutcome::Pruned, 3);
        join_pruning_tasks(&mut report, handles).await;

        assert_eq!(report.tasks_failed, 1);
        assert_eq!(report.servers_pruned, 2);
        assert_eq!(report.backups_deleted, 3);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(CyclePhase::Discovering.to_string(), "discovering");
        assert_eq!(CyclePhase::Sleeping.to_string(), "sleeping");
    }
}
