//! Configuration and dependency wiring for the bundle indexer.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{IndexerConfig, LogFormat};
