//! # Bundle Indexer Pipeline
//!
//! This crate turns bundle notifications into aggregate documents in the
//! document store.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Reads notifications and fetches bundles
//! 2. **Transformer**: Computes per-entity contributions from a bundle's graph
//! 3. **Aggregator**: Folds the contributions recorded in a document
//! 4. **Loader**: Merges documents into the store with optimistic concurrency
//! 5. **Orchestrator**: Coordinates the pipeline flow for one bundle

pub mod aggregator;
pub mod consumer;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod transformer;

pub use consumer::{BundleNotification, BundleProvider, InMemoryBundleProvider};
pub use errors::{PipelineError, TransformError};
pub use loader::{merge_documents, DocumentWriter, WriteOutcome, WriterConfig};
pub use orchestrator::{IndexSummary, Orchestrator, OrchestratorConfig};
pub use transformer::{transformers, Transformer};
