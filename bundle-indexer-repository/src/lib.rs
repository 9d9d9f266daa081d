//! # Bundle Indexer Repository
//!
//! This crate provides the trait and implementations for storing aggregate
//! documents. It includes the store error type, the `DocumentStore`
//! interface, a concrete implementation for OpenSearch and an in-memory
//! implementation.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;

pub use errors::StoreError;
pub use interfaces::DocumentStore;
pub use memory::InMemoryDocumentStore;
pub use self::opensearch::{IndexConfig, OpenSearchDocumentStore};
