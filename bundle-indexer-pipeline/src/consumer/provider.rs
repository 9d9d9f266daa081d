//! Access to stored bundles.

use std::collections::HashMap;

use async_trait::async_trait;
use bundle_indexer_shared::Bundle;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::PipelineError;

/// Source of bundle contents.
#[async_trait]
pub trait BundleProvider: Send + Sync {
    /// Fetch one version of a bundle with its manifest and metadata files.
    ///
    /// # Arguments
    ///
    /// * `uuid` - The bundle UUID
    /// * `version` - The bundle version
    ///
    /// # Returns
    ///
    /// * `Ok(Bundle)` - The bundle
    /// * `Err(PipelineError)` - If the bundle cannot be fetched
    async fn fetch(&self, uuid: Uuid, version: &str) -> Result<Bundle, PipelineError>;
}

/// Provider serving bundles registered in memory.
#[derive(Debug, Default)]
pub struct InMemoryBundleProvider {
    bundles: RwLock<HashMap<(Uuid, String), Bundle>>,
}

impl InMemoryBundleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, bundle: Bundle) {
        self.bundles
            .write()
            .await
            .insert((bundle.uuid, bundle.version.clone()), bundle);
    }
}

#[async_trait]
impl BundleProvider for InMemoryBundleProvider {
    async fn fetch(&self, uuid: Uuid, version: &str) -> Result<Bundle, PipelineError> {
        self.bundles
            .read()
            .await
            .get(&(uuid, version.to_string()))
            .cloned()
            .ok_or_else(|| PipelineError::provider(format!("bundle {uuid}.{version} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_indexer_shared::testing::BundleBuilder;

    #[tokio::test]
    async fn test_fetch_registered_bundle() {
        let provider = InMemoryBundleProvider::new();
        let bundle = BundleBuilder::new().build();
        provider.insert(bundle.clone()).await;

        let fetched = provider.fetch(bundle.uuid, &bundle.version).await.unwrap();
        assert_eq!(fetched, bundle);

        let missing = provider.fetch(bundle.uuid, "2099-01-01T00:00:00.000Z").await;
        assert!(matches!(missing, Err(PipelineError::ProviderError(_))));
    }
}
