//! Error types for the document store.

mod store_error;

pub use store_error::StoreError;
