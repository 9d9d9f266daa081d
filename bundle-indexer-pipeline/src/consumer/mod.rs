//! Consumer module for the bundle indexer pipeline.
//!
//! Reads bundle notifications and fetches the bundles they refer to.

mod notification;
mod provider;

pub use notification::BundleNotification;
pub use provider::{BundleProvider, InMemoryBundleProvider};
