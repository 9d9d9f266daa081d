//! Document store trait definition.
//!
//! This module defines the abstract interface for reading and writing
//! aggregate documents, allowing for different backend implementations
//! (OpenSearch, in-memory).

use async_trait::async_trait;
use bundle_indexer_shared::{Document, EntityReference, VersionedDocument};

use crate::errors::StoreError;

/// Abstracts the store that holds one aggregate document per entity.
///
/// Writes use external versioning: a document is stored together with a
/// caller-supplied version number and a write only succeeds if that number is
/// greater than the version currently stored. This makes a put a
/// compare-and-swap against the version the caller read.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the current document of an entity.
    ///
    /// # Arguments
    ///
    /// * `entity` - The entity whose document to read
    ///
    /// # Returns
    ///
    /// * `Ok(Some(VersionedDocument))` - The stored document and its version
    /// * `Ok(None)` - If no document exists for the entity yet
    /// * `Err(StoreError)` - If the read fails
    async fn get(&self, entity: &EntityReference) -> Result<Option<VersionedDocument>, StoreError>;

    /// Store a document under an external version.
    ///
    /// # Arguments
    ///
    /// * `document` - The document to store, keyed by its entity reference
    /// * `version` - The external version; must exceed the stored version
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was stored
    /// * `Err(StoreError::VersionConflict)` - If the stored version is not
    ///   lower than `version`
    /// * `Err(StoreError)` - If the write fails for any other reason
    async fn put(&self, document: &Document, version: u64) -> Result<(), StoreError>;
}
