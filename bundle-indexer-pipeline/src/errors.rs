//! Error types for the bundle indexer pipeline.

use bundle_indexer_repository::StoreError;
use bundle_indexer_shared::{EntityReference, MetadataError};
use thiserror::Error;
use uuid::Uuid;

/// Precondition violations found while transforming a bundle.
///
/// These are defects in the bundle and never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// A bundle must belong to exactly one project.
    #[error("Bundle {bundle} has {count} projects, expected exactly one")]
    ProjectCount { bundle: Uuid, count: usize },

    /// A sample record must carry exactly one of `organ` and `model_organ`.
    #[error("Sample {document_id} does not have exactly one of organ and model_organ")]
    AmbiguousOrgan { document_id: Uuid },

    /// A protocol kind without an index representation reached serialization.
    #[error("Protocol {document_id} of schema {schema_name} cannot be indexed")]
    UnsupportedProtocol {
        document_id: Uuid,
        schema_name: String,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl TransformError {
    /// Create a project count error.
    pub fn project_count(bundle: Uuid, count: usize) -> Self {
        Self::ProjectCount { bundle, count }
    }
}

/// Errors that can occur in the bundle indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The bundle could not be fetched.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// The notification payload could not be read.
    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    /// The bundle metadata is malformed.
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// The bundle violates a transformer precondition.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// A non-retryable store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The store stayed unreachable through every connection retry.
    #[error("Writing {entity} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        entity: EntityReference,
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

impl PipelineError {
    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::ProviderError(msg.into())
    }

    /// Create an invalid notification error.
    pub fn invalid_notification(msg: impl Into<String>) -> Self {
        Self::InvalidNotification(msg.into())
    }
}
