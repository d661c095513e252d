//! Backupuccino backup reaper library
//!
//! The reaper polls a game-server panel on a fixed schedule and enforces a
//! backup retention policy on every managed server: failed backups are
//! deleted, and successful backups beyond the retention limit are deleted
//! oldest first.
//!
//! ## Architecture
//!
//! ```text
//! Reconciler
//! ├── ServerInventory   (server discovery)
//! └── per-server task
//!     ├── BackupInventory      (list / delete backups)
//!     └── select_for_deletion  (pure retention policy)
//! ```
//!
//! Every network call goes through [`client::PanelClient`], which owns the
//! retry, timeout, and header policy.

pub mod backups;
pub mod client;
pub mod config;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod reconciler;
pub mod shutdown;

// Re-export commonly used types
pub use backups::BackupInventory;
pub use client::{PanelClient, Payload};
pub use config::Config;
pub use inventory::ServerInventory;
pub use reconciler::{CycleOutcome, CycleReport, Reconciler, ReconcilerConfig};
