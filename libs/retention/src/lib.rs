//! Backup retention primitives.
//!
//! This library holds the typed inventory model (servers, nodes, backups)
//! and the pure retention policy that decides which backups a reconciliation
//! pass should delete. Key concepts:
//!
//! - **Unconditional cleanup**: unsuccessful backups are always deleted.
//! - **Candidate set**: successful backups eligible for limit-based deletion.
//! - **Retention limit**: how many of the newest candidates are kept.
//!
//! # Invariants
//!
//! - Decisions are deterministic given the same inputs
//! - The policy never mutates its input
//! - Applying a decision and re-running the policy selects nothing

mod error;
mod model;
mod policy;

pub use error::NodeMappingError;
pub use model::{Backup, Node, Server};
pub use policy::{select_for_deletion, Deletion, DeletionReason, RetentionConfig};

/// Default number of successful backups kept per server.
pub const DEFAULT_MAX_BACKUP_LIMIT: usize = 3;
