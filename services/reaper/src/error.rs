//! Error types for the reaper.
//!
//! Every panel call returns `Result<_, RequestError>`; the inventories wrap
//! that in their own error so callers can tell a transport failure from a
//! record the reaper does not understand.

use backupuccino_retention::NodeMappingError;
use reqwest::StatusCode;
use thiserror::Error;

/// Failure of one logical panel request, after all attempts.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The panel answered with a status other than 200 or 204.
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Connection, timeout, or other transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 200 response whose body was not valid JSON.
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl RequestError {
    /// HTTP status of the failure, when the panel answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::Transport(e) => e.status(),
            RequestError::InvalidBody(_) => None,
        }
    }

    /// Returns true if the panel rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self.status(),
            Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
        )
    }
}

/// Server discovery failure. The cycle is skipped on any of these.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("server listing failed: {0}")]
    Request(#[from] RequestError),

    /// A record did not match the expected schema.
    #[error("malformed server listing: {0}")]
    Schema(#[from] serde_json::Error),

    /// A server runs on a node the reaper does not know.
    #[error("server {server} rejected: {source}")]
    Mapping {
        server: String,
        #[source]
        source: NodeMappingError,
    },
}

impl DiscoveryError {
    /// Returns true if discovery failed on authentication.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DiscoveryError::Request(e) if e.is_unauthorized())
    }
}

/// Backup listing or deletion failure for one server.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("backup request failed: {0}")]
    Request(#[from] RequestError),

    #[error("malformed backup listing: {0}")]
    Schema(#[from] serde_json::Error),

    /// Deletion answered with a body instead of "no content".
    #[error("deletion not confirmed: panel returned a body")]
    Unconfirmed,
}

/// Invalid configuration. Fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("api url must start with http:// or https://, got '{0}'")]
    InvalidApiUrl(String),

    #[error("{name} {reason}")]
    OutOfRange {
        name: &'static str,
        reason: &'static str,
    },
}
