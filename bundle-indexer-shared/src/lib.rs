//! # Bundle Indexer Shared
//!
//! Shared types for the bundle indexer: the bundle and its manifest, the typed
//! metadata entities, the entity graph used by the transformers, and the
//! contribution and document types that flow through the pipeline into the
//! document store.

pub mod bundle;
pub mod document;
pub mod errors;
pub mod graph;
pub mod metadata;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bundle::{Bundle, ManifestEntry, SchemaGeneration};
pub use document::{
    BundleEntry, Contents, Contribution, Document, EntityReference, EntityType, RecordType,
    VersionedDocument,
};
pub use errors::MetadataError;
pub use graph::{EntityGraph, RelatedEntities};
