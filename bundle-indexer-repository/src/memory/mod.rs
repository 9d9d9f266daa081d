//! In-memory document store.
//!
//! Applies the same external-versioning rule as OpenSearch. Used for local
//! runs and as the store behind the pipeline tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bundle_indexer_shared::{Document, EntityReference, VersionedDocument};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::StoreError;
use crate::interfaces::DocumentStore;

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<EntityReference, VersionedDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// All stored documents, ordered by entity reference.
    pub async fn snapshot(&self) -> Vec<VersionedDocument> {
        let mut documents: Vec<_> = self.documents.read().await.values().cloned().collect();
        documents.sort_by_key(|d| d.document.entity);
        documents
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, entity: &EntityReference) -> Result<Option<VersionedDocument>, StoreError> {
        Ok(self.documents.read().await.get(entity).cloned())
    }

    async fn put(&self, document: &Document, version: u64) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let stored = documents.get(&document.entity).map_or(0, |d| d.version);
        if version <= stored {
            return Err(StoreError::version_conflict(document.entity, version));
        }
        documents.insert(
            document.entity,
            VersionedDocument {
                document: document.clone(),
                version,
            },
        );
        debug!(entity = %document.entity, version, "Document stored in memory");
        Ok(())
    }
}
