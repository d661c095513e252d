//! Server discovery.
//!
//! Lists the servers visible to the API key and translates panel records into
//! [`Server`] values. Any record that cannot be translated aborts the whole
//! listing.

use std::sync::Arc;

use backupuccino_retention::{Node, Server};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::PanelClient;
use crate::error::DiscoveryError;

/// Server listing endpoint.
pub const SERVERS_PATH: &str = "/";

/// Server record attributes as returned by the panel.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAttributes {
    #[serde(default)]
    pub identifier: Option<String>,
    pub uuid: Uuid,
    pub name: String,
    pub node: String,
    pub is_suspended: bool,
    pub is_installing: bool,
}

impl TryFrom<ServerAttributes> for Server {
    type Error = DiscoveryError;

    fn try_from(attrs: ServerAttributes) -> Result<Self, Self::Error> {
        let node = Node::from_panel_label(&attrs.node).map_err(|source| DiscoveryError::Mapping {
            server: attrs.uuid.to_string(),
            source,
        })?;

        Ok(Server {
            identifier: attrs.identifier,
            uuid: attrs.uuid,
            name: attrs.name,
            node,
            is_suspended: attrs.is_suspended,
            is_installing: attrs.is_installing,
        })
    }
}

/// Discovers the servers managed by the panel.
#[derive(Debug, Clone)]
pub struct ServerInventory {
    panel: Arc<PanelClient>,
}

impl ServerInventory {
    pub fn new(panel: Arc<PanelClient>) -> Self {
        Self { panel }
    }

    /// List every server visible to the API key.
    ///
    /// An empty list is a valid result.
    pub async fn list_servers(&self) -> Result<Vec<Server>, DiscoveryError> {
        let records: Vec<ServerAttributes> = self
            .panel
            .list_all::<_, DiscoveryError>(SERVERS_PATH)
            .await?;

        let servers = records
            .into_iter()
            .map(Server::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        for server in &servers {
            debug!(
                server_uuid = %server.uuid,
                server_name = %server.name,
                node = %server.node,
                active = server.is_active(),
                "Discovered server"
            );
        }
        info!(server_count = servers.len(), "Server discovery complete");

        Ok(servers)
    }
}
