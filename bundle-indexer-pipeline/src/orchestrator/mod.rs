//! Orchestrator module for the bundle indexer pipeline.
//!
//! Coordinates the provider, transformers and writer for one bundle at a
//! time: fetch the bundle, build its entity graph, compute the contributions
//! of every transformer and merge each of them into its document.

use std::sync::Arc;

use bundle_indexer_shared::{Bundle, Document, EntityGraph};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::consumer::{BundleNotification, BundleProvider};
use crate::errors::PipelineError;
use crate::loader::{DocumentWriter, WriteOutcome};
use crate::transformer::{transformers, Transformer};

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Maximum number of documents written concurrently.
    pub write_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            write_concurrency: 8,
        }
    }
}

/// What indexing one bundle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub bundle_uuid: Uuid,
    pub bundle_version: String,
    /// Contributions computed from the bundle.
    pub contributions: usize,
    /// Documents stored under a new version.
    pub documents_written: usize,
    /// Documents that already reflected the bundle.
    pub documents_unchanged: usize,
}

/// Orchestrator that indexes bundles.
pub struct Orchestrator {
    provider: Arc<dyn BundleProvider>,
    writer: DocumentWriter,
    transformers: Vec<Box<dyn Transformer>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create a new orchestrator with every transformer and the default
    /// configuration.
    pub fn new(provider: Arc<dyn BundleProvider>, writer: DocumentWriter) -> Self {
        Self::with_config(provider, writer, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        provider: Arc<dyn BundleProvider>,
        writer: DocumentWriter,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            writer,
            transformers: transformers(),
            config,
        }
    }

    /// Fetch and index the bundle a notification refers to.
    #[instrument(
        skip_all,
        fields(
            bundle_uuid = %notification.bundle_uuid,
            bundle_version = %notification.bundle_version,
            deleted = notification.deleted
        )
    )]
    pub async fn index_bundle(
        &self,
        notification: &BundleNotification,
    ) -> Result<IndexSummary, PipelineError> {
        let bundle = self
            .provider
            .fetch(notification.bundle_uuid, &notification.bundle_version)
            .await?;
        if bundle.version_timestamp().is_none() {
            warn!("Bundle version is not a timestamp, versions may compare out of order");
        }
        self.index(&bundle, notification.deleted).await
    }

    /// Index a bundle that is already in hand.
    ///
    /// With `deleted` set the bundle's documents record it as a tombstone and
    /// it stops counting towards their aggregates.
    pub async fn index(&self, bundle: &Bundle, deleted: bool) -> Result<IndexSummary, PipelineError> {
        let graph = EntityGraph::from_bundle(bundle)?;

        let mut documents = Vec::new();
        for transformer in &self.transformers {
            for contribution in transformer.transform(&graph, deleted) {
                documents.push(Document::from_contribution(&contribution?));
            }
            debug!(
                entity_type = %transformer.entity_type(),
                documents = documents.len(),
                "Transformed bundle"
            );
        }
        let contributions = documents.len();

        let outcomes: Vec<Result<WriteOutcome, PipelineError>> = stream::iter(&documents)
            .map(|document| self.writer.write(document))
            .buffer_unordered(self.config.write_concurrency.max(1))
            .collect()
            .await;

        let mut summary = IndexSummary {
            bundle_uuid: bundle.uuid,
            bundle_version: bundle.version.clone(),
            contributions,
            documents_written: 0,
            documents_unchanged: 0,
        };
        for outcome in outcomes {
            match outcome? {
                WriteOutcome::Written { .. } => summary.documents_written += 1,
                WriteOutcome::Unchanged { .. } => summary.documents_unchanged += 1,
            }
        }

        info!(
            contributions = summary.contributions,
            written = summary.documents_written,
            unchanged = summary.documents_unchanged,
            "Bundle indexed"
        );
        Ok(summary)
    }
}
