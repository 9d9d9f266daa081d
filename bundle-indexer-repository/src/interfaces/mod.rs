//! Interfaces for the bundle indexer repository.
//!
//! This module defines the traits that abstract over the document store.

mod document_store;

pub use document_store::DocumentStore;
