//! Error types for reading bundle metadata.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while materializing the entity graph of a bundle.
///
/// All of these describe malformed input. They are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    /// A metadata document lacks a field the graph cannot do without.
    #[error("Metadata file {file} is missing required field {field}")]
    MissingField { file: String, field: &'static str },

    /// A document id that is not a UUID.
    #[error("Metadata file {file} has invalid document id {value:?}")]
    InvalidDocumentId { file: String, value: String },

    /// A `schema_type`/`describedBy` combination the indexer does not know.
    #[error("Unsupported schema {schema_name} of type {schema_type}")]
    UnknownSchema {
        schema_type: String,
        schema_name: String,
    },

    /// The links reference an entity that is not part of the bundle.
    #[error("Link references unknown entity {0}")]
    DanglingLink(Uuid),

    /// A file entity whose name does not appear in the bundle manifest.
    #[error("No manifest entry for file {0:?}")]
    MissingManifestEntry(String),

    /// The links describe a cycle through the given entity.
    #[error("Entity graph contains a cycle through {0}")]
    CyclicGraph(Uuid),

    /// `links.json` is present but not shaped as expected.
    #[error("Invalid links: {0}")]
    InvalidLinks(String),
}

impl MetadataError {
    /// Create a missing field error.
    pub fn missing(file: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            file: file.into(),
            field,
        }
    }

    /// Create an unknown schema error.
    pub fn unknown_schema(schema_type: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self::UnknownSchema {
            schema_type: schema_type.into(),
            schema_name: schema_name.into(),
        }
    }

    /// Create an invalid links error.
    pub fn invalid_links(msg: impl Into<String>) -> Self {
        Self::InvalidLinks(msg.into())
    }
}
