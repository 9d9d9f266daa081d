//! OpenSearch index naming.
//!
//! Every entity type has its own index. Mappings are provisioned outside the
//! indexer, so only the names are configured here.

use bundle_indexer_shared::EntityType;

/// The default prefix of all index names.
pub const DEFAULT_INDEX_PREFIX: &str = "bundle_indexer";

/// Naming of the per-entity-type indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub prefix: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_PREFIX)
    }
}

impl IndexConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The index holding documents of the given entity type, named
    /// `<prefix>_<entity_type>`.
    pub fn index_name(&self, entity_type: EntityType) -> String {
        format!("{}_{}", self.prefix, entity_type.as_str())
    }
}
