//! Error types for translating panel records into the inventory model.

use thiserror::Error;

/// Errors that can occur when mapping a panel node label to a [`Node`](crate::Node).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeMappingError {
    /// The label is not part of the known node table.
    #[error("unknown node label: '{0}'")]
    UnknownLabel(String),
}

impl NodeMappingError {
    /// The offending label.
    pub fn label(&self) -> &str {
        match self {
            NodeMappingError::UnknownLabel(label) => label,
        }
    }
}
