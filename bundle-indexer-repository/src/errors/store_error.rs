//! Document store error types.
//!
//! The writer reacts to a failed store call by its kind. A version conflict
//! means another writer got there first; the whole read-merge-write cycle is
//! repeated. Connection errors are retried a bounded number of times.

use bundle_indexer_shared::EntityReference;
use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The stored document has advanced past the version being written.
    #[error("Version conflict writing {entity} at version {version}")]
    VersionConflict {
        entity: EntityReference,
        version: u64,
    },

    /// The store could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store rejected or failed the request.
    #[error("Request error: {0}")]
    Request(String),

    /// A document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create a version conflict error.
    pub fn version_conflict(entity: EntityReference, version: u64) -> Self {
        Self::VersionConflict { entity, version }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a request error.
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
