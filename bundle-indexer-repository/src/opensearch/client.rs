//! OpenSearch document store implementation.
//!
//! This module provides the concrete implementation of `DocumentStore`
//! using the OpenSearch Rust client. Documents are stored under their entity
//! id in the index of their entity type and written with
//! `version_type=external`.

use async_trait::async_trait;
use bundle_indexer_shared::{Document, EntityReference, VersionedDocument};
use opensearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    params::VersionType,
    GetParts, IndexParts, OpenSearch,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::StoreError;
use crate::interfaces::DocumentStore;
use crate::opensearch::index_config::IndexConfig;

/// OpenSearch document store.
///
/// # Example
///
/// ```ignore
/// use bundle_indexer_repository::opensearch::{IndexConfig, OpenSearchDocumentStore};
///
/// let store = OpenSearchDocumentStore::new("http://localhost:9200", IndexConfig::new("hca"))?;
/// let current = store.get(&entity).await?;
/// store.put(&document, current.map_or(0, |d| d.version) + 1).await?;
/// ```
pub struct OpenSearchDocumentStore {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchDocumentStore {
    /// Create a new store connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The naming of the per-entity-type indices
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchDocumentStore)` - A new store instance
    /// * `Err(StoreError)` - If the URL is invalid or transport setup fails
    pub fn new(url: &str, index_config: IndexConfig) -> Result<Self, StoreError> {
        let parsed_url = Url::parse(url).map_err(|e| StoreError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| StoreError::connection(e.to_string()))?;

        info!(
            url = %url,
            prefix = %index_config.prefix,
            "Created OpenSearch document store"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
            index_config,
        })
    }
}

/// Decode the body of a successful GET.
fn parse_get_response(body: Value) -> Result<Option<VersionedDocument>, StoreError> {
    if body.get("found").and_then(Value::as_bool) == Some(false) {
        return Ok(None);
    }
    let version = body
        .get("_version")
        .and_then(Value::as_u64)
        .ok_or_else(|| StoreError::serialization("GET response without _version"))?;
    let source = body
        .get("_source")
        .cloned()
        .ok_or_else(|| StoreError::serialization("GET response without _source"))?;
    let document: Document = serde_json::from_value(source)?;
    Ok(Some(VersionedDocument { document, version }))
}

/// Map a failed PUT status to a store error.
fn put_failure(status: u16, body: &str, entity: EntityReference, version: u64) -> StoreError {
    match status {
        409 => StoreError::version_conflict(entity, version),
        502..=504 => StoreError::connection(format!("PUT failed with status {status}: {body}")),
        _ => StoreError::request(format!("PUT failed with status {status}: {body}")),
    }
}

#[async_trait]
impl DocumentStore for OpenSearchDocumentStore {
    #[instrument(skip_all, fields(entity = %entity))]
    async fn get(&self, entity: &EntityReference) -> Result<Option<VersionedDocument>, StoreError> {
        let index = self.index_config.index_name(entity.entity_type);
        let id = entity.entity_id.to_string();

        let response = self
            .client
            .get(GetParts::IndexId(&index, &id))
            .send()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        let status = response.status_code().as_u16();
        if status == 404 {
            debug!(index = %index, "Document not found");
            return Ok(None);
        }
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            error!(status, body = %error_body, "GET request failed");
            let message = format!("GET failed with status {status}: {error_body}");
            return Err(match status {
                502..=504 => StoreError::connection(message),
                _ => StoreError::request(message),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::serialization(e.to_string()))?;
        parse_get_response(body)
    }

    #[instrument(skip_all, fields(entity = %document.entity, version = version))]
    async fn put(&self, document: &Document, version: u64) -> Result<(), StoreError> {
        let index = self.index_config.index_name(document.entity.entity_type);
        let id = document.entity.entity_id.to_string();
        let body = serde_json::to_value(document)?;
        let external_version = i64::try_from(version)
            .map_err(|_| StoreError::request(format!("version {version} out of range")))?;

        let response = self
            .client
            .index(IndexParts::IndexId(&index, &id))
            .version(external_version)
            .version_type(VersionType::External)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        let status = response.status_code().as_u16();
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            let err = put_failure(status, &error_body, document.entity, version);
            if err.is_version_conflict() {
                debug!(version, "Document version conflict");
            } else {
                error!(status, body = %error_body, "PUT request failed");
            }
            return Err(err);
        }

        debug!(index = %index, version, "Document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_indexer_shared::EntityType;
    use serde_json::json;
    use uuid::Uuid;

    fn entity() -> EntityReference {
        EntityReference::new(EntityType::Files, Uuid::new_v4())
    }

    #[test]
    fn test_parse_get_response() {
        let entity = entity();
        let body = json!({
            "_index": "hca_files",
            "_id": entity.entity_id.to_string(),
            "_version": 3,
            "found": true,
            "_source": {
                "entity_type": "files",
                "entity_id": entity.entity_id.to_string(),
                "bundles": [],
                "contents": {"files": [{"file_format": "bam"}]}
            }
        });

        let stored = parse_get_response(body).unwrap().unwrap();

        assert_eq!(stored.version, 3);
        assert_eq!(stored.document.entity, entity);
        assert_eq!(stored.document.contents.len(), 1);
    }

    #[test]
    fn test_parse_get_response_not_found() {
        let body = json!({"_index": "hca_files", "_id": "x", "found": false});
        assert!(parse_get_response(body).unwrap().is_none());
    }

    #[test]
    fn test_parse_get_response_malformed() {
        let body = json!({"found": true, "_version": 1, "_source": {"entity_type": "nope"}});
        assert!(matches!(
            parse_get_response(body),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_put_failure_classification() {
        let entity = entity();
        assert_eq!(
            put_failure(409, "", entity, 2),
            StoreError::version_conflict(entity, 2)
        );
        assert!(put_failure(503, "unavailable", entity, 2).is_connection());
        assert!(matches!(
            put_failure(400, "bad", entity, 2),
            StoreError::Request(_)
        ));
    }
}
