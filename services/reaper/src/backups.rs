//! Backup inventory for a single server.

use std::sync::Arc;

use backupuccino_retention::{Backup, Server};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::client::{PanelClient, Payload};
use crate::error::InventoryError;

/// Backup record attributes as returned by the panel.
///
/// The panel may omit `name` and `bytes`. Every other field is required.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupAttributes {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub is_successful: bool,
    pub is_locked: bool,
}

impl BackupAttributes {
    fn into_backup(self, server_identifier: String) -> Backup {
        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            _ => self.uuid.to_string(),
        };

        Backup {
            server_identifier,
            uuid: self.uuid,
            name,
            size: self.bytes.unwrap_or(0),
            created_at: self.created_at,
            is_successful: self.is_successful,
            is_locked: self.is_locked,
        }
    }
}

fn backups_path(server: &Server) -> String {
    format!("/servers/{}/backups", server.route_key())
}

fn backup_path(server: &Server, backup: &Backup) -> String {
    format!("/servers/{}/backups/{}", server.route_key(), backup.uuid)
}

/// Lists and deletes backups through the panel.
#[derive(Debug, Clone)]
pub struct BackupInventory {
    panel: Arc<PanelClient>,
}

impl BackupInventory {
    pub fn new(panel: Arc<PanelClient>) -> Self {
        Self { panel }
    }

    /// List a server's backups.
    ///
    /// Inactive servers are never queried; they yield an empty list.
    pub async fn list_backups(&self, server: &Server) -> Result<Vec<Backup>, InventoryError> {
        if !server.is_active() {
            debug!(server_uuid = %server.uuid, "Server inactive, skipping backup listing");
            return Ok(Vec::new());
        }

        let route_key = server.route_key();
        let records: Vec<BackupAttributes> = self
            .panel
            .list_all::<_, InventoryError>(&backups_path(server))
            .await?;
        let backups: Vec<Backup> = records
            .into_iter()
            .map(|attrs| attrs.into_backup(route_key.clone()))
            .collect();

        debug!(
            server_uuid = %server.uuid,
            backup_count = backups.len(),
            "Listed backups"
        );

        Ok(backups)
    }

    /// Delete one backup.
    ///
    /// Only a "no content" answer counts as success. On failure the backup
    /// stays on the panel and is reconsidered next cycle.
    pub async fn delete_backup(&self, server: &Server, backup: &Backup) -> Result<(), InventoryError> {
        let result = match self
            .panel
            .execute(Method::DELETE, &backup_path(server, backup), None)
            .await
        {
            Ok(Payload::NoContent) => Ok(()),
            Ok(Payload::Body(_)) => Err(InventoryError::Unconfirmed),
            Err(e) => Err(InventoryError::from(e)),
        };

        if let Err(e) = &result {
            error!(
                server_uuid = %server.uuid,
                server_name = %server.name,
                backup_uuid = %backup.uuid,
                backup_name = %backup.name,
                size_gib = backup.size_gib(),
                created_at = %backup.created_at,
                error = %e,
                "Failed to delete backup"
            );
        }

        result
    }
}
