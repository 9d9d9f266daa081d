//! # Bundle Indexer
//!
//! Main library for the bundle indexer.
//!
//! This crate provides the configuration, logging setup and dependency
//! wiring for running the bundle indexer pipeline against OpenSearch.

pub mod config;
pub mod telemetry;

pub use config::{Dependencies, IndexerConfig, LogFormat};

use bundle_indexer_pipeline::PipelineError;
use bundle_indexer_repository::StoreError;
use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] PipelineError),

    /// Store error.
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
