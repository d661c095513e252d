//! Retention policy.
//!
//! Given one server's backups, decide which of them to delete. The decision is
//! pure: no I/O, no mutation of the input, and the same input always yields
//! the same ordered output.

use crate::model::Backup;
use crate::DEFAULT_MAX_BACKUP_LIMIT;

/// Retention settings applied to every server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Number of most recent candidates kept per server.
    pub max_backup_limit: usize,

    /// Whether locked successful backups are candidates for limit-based deletion.
    pub delete_locked: bool,

    /// Whether locked backups occupy retention slots when they are exempt
    /// from deletion. Ignored when `delete_locked` is set.
    pub count_locked: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_backup_limit: DEFAULT_MAX_BACKUP_LIMIT,
            delete_locked: false,
            count_locked: false,
        }
    }
}

/// Why a backup was selected.
///
/// Ordering matches output order: unsuccessful backups come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeletionReason {
    /// The backup did not complete successfully.
    Unsuccessful,

    /// The backup is past the retention limit.
    OverLimit,
}

impl DeletionReason {
    /// Label used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionReason::Unsuccessful => "cleanup",
            DeletionReason::OverLimit => "retention",
        }
    }
}

impl std::fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backup selected for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub backup: Backup,
    pub reason: DeletionReason,
}

/// Select the backups a pruning pass should delete.
///
/// Returns unsuccessful backups first (newest first), followed by successful
/// backups past the retention limit (oldest first).
pub fn select_for_deletion(backups: &[Backup], config: &RetentionConfig) -> Vec<Deletion> {
    let mut ranked: Vec<&Backup> = backups.iter().collect();
    ranked.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.uuid.cmp(&b.uuid))
    });

    let mut unsuccessful = Vec::new();
    let mut over_limit = Vec::new();
    let mut kept = 0usize;

    for backup in ranked {
        if !backup.is_successful {
            unsuccessful.push(backup);
            continue;
        }

        if backup.is_locked && !config.delete_locked {
            if config.count_locked {
                kept += 1;
            }
            continue;
        }

        if kept < config.max_backup_limit {
            kept += 1;
        } else {
            over_limit.push(backup);
        }
    }

    // Ranked newest first; prune oldest first.
    over_limit.reverse();

    unsuccessful
        .into_iter()
        .map(|b| (b, DeletionReason::Unsuccessful))
        .chain(over_limit.into_iter().map(|b| (b, DeletionReason::OverLimit)))
        .map(|(backup, reason)| Deletion {
            backup: backup.clone(),
            reason,
        })
        .collect()
}
