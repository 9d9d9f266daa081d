//! Dependency initialization and wiring for the bundle indexer.

use std::sync::Arc;

use bundle_indexer_pipeline::{
    BundleNotification, BundleProvider, DocumentWriter, IndexSummary, Orchestrator,
};
use bundle_indexer_repository::{DocumentStore, OpenSearchDocumentStore};
use serde_json::Value;
use tracing::info;

use super::IndexerConfig;
use crate::IndexingError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to index bundles.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Wire the pipeline to OpenSearch.
    ///
    /// # Arguments
    ///
    /// * `config` - The indexer settings
    /// * `provider` - Where bundles are fetched from
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the OpenSearch client cannot be created
    pub fn new(
        config: &IndexerConfig,
        provider: Arc<dyn BundleProvider>,
    ) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            write_concurrency = config.orchestrator.write_concurrency,
            "Initializing dependencies"
        );

        let store = OpenSearchDocumentStore::new(&config.opensearch_url, config.index.clone())?;
        Ok(Self::with_store(config, provider, Arc::new(store)))
    }

    /// Wire the pipeline to an arbitrary document store.
    pub fn with_store(
        config: &IndexerConfig,
        provider: Arc<dyn BundleProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let writer = DocumentWriter::with_config(store, config.writer);
        let orchestrator = Orchestrator::with_config(provider, writer, config.orchestrator);
        Self { orchestrator }
    }

    /// Index the bundle named by a subscription event.
    pub async fn handle_event(&self, event: &Value) -> Result<IndexSummary, IndexingError> {
        let notification = BundleNotification::from_event(event)?;
        Ok(self.orchestrator.index_bundle(&notification).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_indexer_pipeline::InMemoryBundleProvider;
    use bundle_indexer_repository::InMemoryDocumentStore;
    use bundle_indexer_shared::testing::BundleBuilder;
    use serde_json::json;

    #[tokio::test]
    async fn test_handle_event_indexes_bundle() {
        let mut builder = BundleBuilder::new();
        builder.project("Atlas", &["A"]);
        builder.file("reads.fastq.gz", "fastq.gz", 10);
        let bundle = builder.build();
        let provider = Arc::new(InMemoryBundleProvider::new());
        provider.insert(bundle.clone()).await;
        let store = Arc::new(InMemoryDocumentStore::new());
        let dependencies =
            Dependencies::with_store(&IndexerConfig::default(), provider, store.clone());

        let summary = dependencies
            .handle_event(&json!({
                "match": {
                    "bundle_uuid": bundle.uuid.to_string(),
                    "bundle_version": bundle.version
                }
            }))
            .await
            .unwrap();

        // The file, the project and the bundle. The file has no sample.
        assert_eq!(summary.documents_written, 3);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_malformed_event_is_rejected() {
        let dependencies = Dependencies::with_store(
            &IndexerConfig::default(),
            Arc::new(InMemoryBundleProvider::new()),
            Arc::new(InMemoryDocumentStore::new()),
        );

        let result = dependencies.handle_event(&json!({"match": {}})).await;

        assert!(matches!(result, Err(IndexingError::PipelineError(_))));
    }

    #[test]
    fn test_opensearch_wiring_accepts_default_config() {
        let dependencies = Dependencies::new(
            &IndexerConfig::default(),
            Arc::new(InMemoryBundleProvider::new()),
        );
        assert!(dependencies.is_ok());
    }
}
