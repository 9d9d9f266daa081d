//! Loader module for the bundle indexer pipeline.
//!
//! Writes documents to the document store with optimistic concurrency. Each
//! attempt reads the stored document, merges the new provenance entries into
//! it, re-aggregates the contents and writes the result under the next
//! external version. The store rejects the write if another writer advanced
//! the version in between, and the cycle starts over.

use std::sync::Arc;
use std::time::Duration;

use bundle_indexer_repository::{DocumentStore, StoreError};
use bundle_indexer_shared::Document;
use tracing::{debug, info, instrument, warn};

use crate::aggregator::aggregate_document;
use crate::errors::PipelineError;

/// Configuration for the document writer.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    /// Number of retries after a connection failure before giving up.
    pub max_connection_retries: u32,
    /// Unit of the delay between connection retries. The n-th retry from
    /// the end waits `n` units, so the delays shrink towards zero.
    pub backoff_unit: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_connection_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The merged document was stored under `version`.
    Written { version: u64 },
    /// The stored document already reflected the update.
    Unchanged { version: u64 },
}

impl WriteOutcome {
    pub fn version(&self) -> u64 {
        match self {
            Self::Written { version } | Self::Unchanged { version } => *version,
        }
    }
}

/// Merge `incoming` into the `stored` document and recompute its contents.
///
/// Without a stored document the incoming one is taken as is. Otherwise per
/// bundle UUID the provenance entry with the higher bundle version wins.
pub fn merge_documents(stored: Option<&Document>, incoming: &Document) -> Document {
    let mut merged = match stored {
        Some(stored) => {
            let mut merged = stored.clone();
            merged.merge_bundles(incoming.bundles.iter().cloned());
            merged
        }
        None => incoming.clone(),
    };
    merged.contents = aggregate_document(&merged);
    merged
}

/// Writer that stores documents using read-merge-write cycles.
pub struct DocumentWriter {
    store: Arc<dyn DocumentStore>,
    config: WriterConfig,
}

impl DocumentWriter {
    /// Create a new writer with the default configuration.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, WriterConfig::default())
    }

    /// Create a new writer with custom configuration.
    pub fn with_config(store: Arc<dyn DocumentStore>, config: WriterConfig) -> Self {
        Self { store, config }
    }

    /// Merge `document` into the stored document of the same entity.
    ///
    /// Version conflicts restart the cycle without limit. Connection failures
    /// are retried up to `max_connection_retries` times. Any other store
    /// failure is returned immediately.
    #[instrument(skip_all, fields(entity = %document.entity))]
    pub async fn write(&self, document: &Document) -> Result<WriteOutcome, PipelineError> {
        let mut retries_left = self.config.max_connection_retries;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.try_write(document).await {
                Ok(outcome) => {
                    if attempts > 1 {
                        info!(attempts, "Document write succeeded after retry");
                    }
                    return Ok(outcome);
                }
                Err(e) if e.is_version_conflict() => {
                    debug!(attempts, error = %e, "Version conflict, retrying");
                }
                Err(e) if e.is_connection() => {
                    if retries_left == 0 {
                        return Err(PipelineError::RetriesExhausted {
                            entity: document.entity,
                            attempts,
                            source: e,
                        });
                    }
                    retries_left -= 1;
                    let delay = self.config.backoff_unit * retries_left;
                    warn!(
                        attempts,
                        retries_left,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Document store unreachable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn try_write(&self, document: &Document) -> Result<WriteOutcome, StoreError> {
        let stored = self.store.get(&document.entity).await?;
        let (stored_document, stored_version) = match &stored {
            Some(stored) => (Some(&stored.document), stored.version),
            None => (None, 0),
        };

        let merged = merge_documents(stored_document, document);
        if stored_document == Some(&merged) {
            debug!(version = stored_version, "Document unchanged, skipping write");
            return Ok(WriteOutcome::Unchanged {
                version: stored_version,
            });
        }

        let version = stored_version + 1;
        self.store.put(&merged, version).await?;
        debug!(version, "Document written");
        Ok(WriteOutcome::Written { version })
    }
}
