//! Inventory model: servers, the nodes they run on, and their backups.
//!
//! Values are rebuilt from the panel on every reconciliation pass and are
//! never mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NodeMappingError;

const BYTES_PER_GIB: f64 = (1024u64 * 1024 * 1024) as f64;

/// Logical execution host a server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Wings0,
    Wings1,
    Wings2,
}

impl Node {
    /// Translate the panel's node label into a known node.
    ///
    /// Unknown labels are an error rather than being skipped, so a caller never
    /// acts on a partially understood inventory.
    pub fn from_panel_label(label: &str) -> Result<Self, NodeMappingError> {
        match label {
            "cs.dedicated0.node0" => Ok(Node::Wings0),
            "cs.dedicated1.node0" => Ok(Node::Wings1),
            "cs.dedicated2.node0" => Ok(Node::Wings2),
            other => Err(NodeMappingError::UnknownLabel(other.to_string())),
        }
    }

    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Wings0 => "wings0",
            Node::Wings1 => "wings1",
            Node::Wings2 => "wings2",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A managed server as reported by the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    /// Panel-assigned short identifier, when the panel reports one.
    pub identifier: Option<String>,
    pub uuid: Uuid,
    pub name: String,
    pub node: Node,
    pub is_suspended: bool,
    pub is_installing: bool,
}

impl Server {
    /// Returns true if the server may be inspected for backups.
    pub fn is_active(&self) -> bool {
        !self.is_suspended && !self.is_installing
    }

    /// Identifier used in panel URLs.
    ///
    /// The panel accepts either the short identifier or the full uuid.
    pub fn route_key(&self) -> String {
        match &self.identifier {
            Some(identifier) if !identifier.is_empty() => identifier.clone(),
            _ => self.uuid.to_string(),
        }
    }
}

/// A single backup belonging to exactly one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Route key of the owning server.
    pub server_identifier: String,
    pub uuid: Uuid,
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub is_successful: bool,
    pub is_locked: bool,
}

impl Backup {
    /// Size in GiB, for log output.
    pub fn size_gib(&self) -> f64 {
        self.size as f64 / BYTES_PER_GIB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(suspended: bool, installing: bool) -> Server {
        Server {
            identifier: Some("1a2b3c4d".to_string()),
            uuid: Uuid::nil(),
            name: "survival".to_string(),
            node: Node::Wings0,
            is_suspended: suspended,
            is_installing: installing,
        }
    }

    #[test]
    fn test_node_mapping() {
        assert_eq!(Node::from_panel_label("cs.dedicated0.node0"), Ok(Node::Wings0));
        assert_eq!(Node::from_panel_label("cs.dedicated1.node0"), Ok(Node::Wings1));
        assert_eq!(Node::from_panel_label("cs.dedicated2.node0"), Ok(Node::Wings2));

        let err = Node::from_panel_label("unknown-host-7").unwrap_err();
        assert_eq!(err.label(), "unknown-host-7");
        assert_eq!(err.to_string(), "unknown node label: 'unknown-host-7'");
    }

    #[test]
    fn test_node_display() {
        assert_eq!(Node::Wings2.to_string(), "wings2");
    }

    #[test]
    fn test_server_activity() {
        assert!(server(false, false).is_active());
        assert!(!server(true, false).is_active());
        assert!(!server(false, true).is_active());
        assert!(!server(true, true).is_active());
    }

    #[test]
    fn test_route_key_falls_back_to_uuid() {
        let mut s = server(false, false);
        assert_eq!(s.route_key(), "1a2b3c4d");

        s.identifier = None;
        assert_eq!(s.route_key(), "00000000-0000-0000-0000-000000000000");

        s.identifier = Some(String::new());
        assert_eq!(s.route_key(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_size_gib() {
        let backup = Backup {
            server_identifier: "1a2b3c4d".to_string(),
            uuid: Uuid::nil(),
            name: "nightly".to_string(),
            size: 3 * 1024 * 1024 * 1024,
            created_at: Utc::now(),
            is_successful: true,
            is_locked: false,
        };
        assert!((backup.size_gib() - 3.0).abs() < f64::EPSILON);
    }
}
