//! Contributions and aggregate documents.
//!
//! A [`Contribution`] holds what one bundle version says about one entity. A
//! [`Document`] is the durable aggregate of everything all bundles ever said
//! about that entity: one provenance entry per bundle UUID plus the contents
//! aggregated from the live entries.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The kinds of entity that get a document of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Files,
    CellSuspensions,
    Samples,
    Projects,
    Bundles,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Files,
        EntityType::CellSuspensions,
        EntityType::Samples,
        EntityType::Projects,
        EntityType::Bundles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Files => "files",
            EntityType::CellSuspensions => "cell_suspensions",
            EntityType::Samples => "samples",
            EntityType::Projects => "projects",
            EntityType::Bundles => "bundles",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds of record nested in document contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Samples,
    Specimens,
    CellSuspensions,
    CellLines,
    Donors,
    Organoids,
    Files,
    Protocols,
    Projects,
    Metadata,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Samples => "samples",
            RecordType::Specimens => "specimens",
            RecordType::CellSuspensions => "cell_suspensions",
            RecordType::CellLines => "cell_lines",
            RecordType::Donors => "donors",
            RecordType::Organoids => "organoids",
            RecordType::Files => "files",
            RecordType::Protocols => "protocols",
            RecordType::Projects => "projects",
            RecordType::Metadata => "metadata",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural key of a document, independent of any bundle or version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
}

impl EntityReference {
    pub fn new(entity_type: EntityType, entity_id: Uuid) -> Self {
        Self {
            entity_type,
            entity_id,
        }
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Records by record type.
pub type Contents = BTreeMap<RecordType, Vec<Value>>;

/// The facts one bundle version contributes about one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub entity: EntityReference,
    pub contents: Contents,
    pub bundle_uuid: Uuid,
    pub bundle_version: String,
    pub bundle_deleted: bool,
}

impl Contribution {
    /// The provenance entry recording this contribution in a document.
    pub fn to_bundle_entry(&self) -> BundleEntry {
        BundleEntry {
            uuid: self.bundle_uuid,
            version: self.bundle_version.clone(),
            deleted: self.bundle_deleted,
            contents: self.contents.clone(),
        }
    }
}

/// Provenance of a document: the latest seen version of one bundle and what
/// that version contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub uuid: Uuid,
    pub version: String,
    pub deleted: bool,
    pub contents: Contents,
}

/// The aggregate representation of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    pub entity: EntityReference,
    /// Sorted by bundle UUID, at most one entry per UUID.
    pub bundles: Vec<BundleEntry>,
    pub contents: Contents,
}

impl Document {
    /// A document recording a single contribution. Its contents are left
    /// empty until aggregated.
    pub fn from_contribution(contribution: &Contribution) -> Self {
        Self {
            entity: contribution.entity,
            bundles: vec![contribution.to_bundle_entry()],
            contents: Contents::new(),
        }
    }

    /// Merge provenance entries into this document.
    ///
    /// Per bundle UUID the entry with the higher version wins. On a tie a
    /// tombstone replaces a live entry, otherwise the entry already present
    /// is kept. A tombstone never reverts to live at the same version. Entries for bundles not yet recorded are
    /// added. Returns whether any entry changed. Contents are not touched and
    /// must be re-aggregated by the caller when this returns `true`.
    pub fn merge_bundles(&mut self, incoming: impl IntoIterator<Item = BundleEntry>) -> bool {
        let mut changed = false;
        for entry in incoming {
            match self.bundles.iter_mut().find(|b| b.uuid == entry.uuid) {
                Some(existing) => {
                    let supersedes = entry.version > existing.version
                        || (entry.version == existing.version
                            && entry.deleted
                            && !existing.deleted);
                    if supersedes {
                        *existing = entry;
                        changed = true;
                    }
                }
                None => {
                    self.bundles.push(entry);
                    changed = true;
                }
            }
        }
        self.bundles.sort_by_key(|b| b.uuid);
        changed
    }

    /// Provenance entries that count towards the aggregate, in bundle UUID
    /// order. Tombstones are skipped.
    pub fn live_bundles(&self) -> impl Iterator<Item = &BundleEntry> {
        self.bundles.iter().filter(|b| !b.deleted)
    }
}

/// A document together with the external version it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub document: Document,
    pub version: u64,
}
