//! Bundle and manifest types.
//!
//! A bundle is the immutable unit of ingestion. It is identified by its UUID
//! and a version string and carries the manifest of the files it contains plus
//! the metadata documents describing them.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Name of the metadata file that only bundles of the legacy schema
/// generation contain.
pub const LEGACY_PROJECT_FILE: &str = "project.json";

/// Name of the metadata file holding the process links.
pub const LINKS_FILE: &str = "links.json";

/// One file descriptor from the bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub uuid: Uuid,
    pub version: String,
    #[serde(rename = "content-type")]
    pub content_type: String,
    pub size: u64,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Generation of the metadata schema a bundle was built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    /// Bundles with per-entity metadata files and a links document.
    Current,
    /// Bundles with the old single-file-per-kind layout.
    Legacy,
}

/// A versioned, immutable collection of metadata records and file descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub uuid: Uuid,
    pub version: String,
    pub manifest: Vec<ManifestEntry>,
    pub metadata_files: BTreeMap<String, Value>,
}

impl Bundle {
    /// Create a new bundle.
    pub fn new(
        uuid: Uuid,
        version: impl Into<String>,
        manifest: Vec<ManifestEntry>,
        metadata_files: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            uuid,
            version: version.into(),
            manifest,
            metadata_files,
        }
    }

    /// The schema generation this bundle was built against.
    pub fn schema_generation(&self) -> SchemaGeneration {
        if self.metadata_files.contains_key(LEGACY_PROJECT_FILE) {
            SchemaGeneration::Legacy
        } else {
            SchemaGeneration::Current
        }
    }

    /// Look up a manifest entry by file name.
    pub fn manifest_entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.manifest.iter().find(|entry| entry.name == name)
    }

    /// Parse the bundle version as a timestamp.
    ///
    /// Accepts RFC 3339 (`2020-01-01T00:00:00.000Z`) and the compact storage
    /// form (`2018-11-13T085633.522123Z`). Versions of a bundle are compared as
    /// strings, so callers use this to flag versions that would not sort
    /// chronologically.
    pub fn version_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_version(&self.version)
    }
}

fn parse_version(version: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(version) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(version, "%Y-%m-%dT%H%M%S%.fZ")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle_with(files: &[&str]) -> Bundle {
        let metadata_files = files
            .iter()
            .map(|name| (name.to_string(), json!({})))
            .collect();
        Bundle::new(Uuid::new_v4(), "2020-01-01T00:00:00.000Z", vec![], metadata_files)
    }

    #[test]
    fn test_schema_generation() {
        assert_eq!(
            bundle_with(&["links.json", "project_0.json"]).schema_generation(),
            SchemaGeneration::Current
        );
        assert_eq!(
            bundle_with(&["project.json", "biomaterial.json"]).schema_generation(),
            SchemaGeneration::Legacy
        );
    }

    #[test]
    fn test_version_timestamp_formats() {
        assert!(parse_version("2020-01-01T00:00:00.000Z").is_some());
        assert!(parse_version("2018-11-13T085633.522123Z").is_some());
        assert!(parse_version("v3").is_none());
    }

    #[test]
    fn test_manifest_entry_wire_names() {
        let entry: ManifestEntry = serde_json::from_value(json!({
            "name": "r1.fastq.gz",
            "uuid": "550e8400-e29b-41d4-a716-446655440000",
            "version": "2020-01-01T00:00:00.000Z",
            "content-type": "application/gzip",
            "size": 100,
            "indexed": false,
            "sha256": "abc"
        }))
        .unwrap();

        assert_eq!(entry.content_type, "application/gzip");
        assert_eq!(entry.size, 100);
        assert_eq!(entry.sha256.as_deref(), Some("abc"));
    }
}
