//! Aggregation of contributed records into document contents.
//!
//! The records a document collects from all of its live bundles are folded
//! per record type. Most record types fold into a single summary record
//! (`Simple`); files and cell suspensions fold into one summary per group
//! (`Grouping`). Records of files and metadata rows in bundle documents are
//! kept as they are.

mod accumulator;

use std::collections::BTreeMap;

use bundle_indexer_shared::{Contents, Document, EntityType, RecordType};
use serde_json::{json, Map, Value};

pub use accumulator::{Accumulator, Total};

/// Maximum number of distinct values kept per field.
const MAX_VALUES: usize = 100;

type Record = Map<String, Value>;

/// How the records of one record type are folded.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    /// Rewrites a record before its fields are accumulated.
    prepare: fn(Record) -> Record,
    /// The accumulator for a field.
    accumulator: fn(&str) -> Accumulator,
}

#[derive(Debug, Clone, Copy)]
pub enum Aggregator {
    /// One summary over all records.
    Simple(Policy),
    /// One summary per distinct value of `key`. A record whose key is an
    /// array joins the group of every element; an empty or missing key puts
    /// it in the `null` group.
    Grouping { key: &'static str, policy: Policy },
}

impl Aggregator {
    /// Fold `records` into summary records. Non-object records are ignored.
    pub fn aggregate<'a>(&self, records: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let prepared = records
            .into_iter()
            .filter_map(Value::as_object)
            .map(|record| (self.policy().prepare)(record.clone()));
        match self {
            Self::Simple(policy) => {
                let mut summary = Summary::new(*policy);
                let mut empty = true;
                for record in prepared {
                    summary.add(&record);
                    empty = false;
                }
                if empty {
                    Vec::new()
                } else {
                    vec![summary.finish()]
                }
            }
            Self::Grouping { key, policy } => {
                let mut groups: BTreeMap<String, Summary> = BTreeMap::new();
                for record in prepared {
                    for group in group_keys(record.get(*key)) {
                        groups
                            .entry(group.to_string())
                            .or_insert_with(|| Summary::new(*policy))
                            .add(&record);
                    }
                }
                groups.into_values().map(Summary::finish).collect()
            }
        }
    }

    fn policy(&self) -> &Policy {
        match self {
            Self::Simple(policy) | Self::Grouping { policy, .. } => policy,
        }
    }
}

fn group_keys(key: Option<&Value>) -> Vec<Value> {
    match key {
        Some(Value::Array(items)) if !items.is_empty() => items.clone(),
        Some(Value::Array(_)) | None => vec![Value::Null],
        Some(value) => vec![value.clone()],
    }
}

/// Accumulators of one summary record, created lazily per field.
struct Summary {
    policy: Policy,
    fields: BTreeMap<String, Accumulator>,
}

impl Summary {
    fn new(policy: Policy) -> Self {
        Self {
            policy,
            fields: BTreeMap::new(),
        }
    }

    fn add(&mut self, record: &Record) {
        for (field, value) in record {
            self.fields
                .entry(field.clone())
                .or_insert_with(|| (self.policy.accumulator)(field))
                .accumulate(value);
        }
    }

    fn finish(self) -> Value {
        let record: Record = self
            .fields
            .into_iter()
            .filter_map(|(field, accumulator)| accumulator.get().map(|value| (field, value)))
            .collect();
        Value::Object(record)
    }
}

/// The aggregator for records of `record_type` in documents of
/// `entity_type`, or `None` if such records are kept verbatim.
pub fn aggregator_for(entity_type: EntityType, record_type: RecordType) -> Option<Aggregator> {
    let simple = |accumulator: fn(&str) -> Accumulator| {
        Some(Aggregator::Simple(Policy {
            prepare: unchanged,
            accumulator,
        }))
    };
    match record_type {
        RecordType::Metadata => None,
        RecordType::Files if entity_type == EntityType::Bundles => None,
        RecordType::Files => Some(Aggregator::Grouping {
            key: "file_format",
            policy: Policy {
                prepare: prepare_file,
                accumulator: file_field,
            },
        }),
        RecordType::CellSuspensions => Some(Aggregator::Grouping {
            key: "organ",
            policy: Policy {
                prepare: prepare_cell_suspension,
                accumulator: cell_suspension_field,
            },
        }),
        RecordType::Samples
        | RecordType::Specimens
        | RecordType::CellLines
        | RecordType::Organoids => simple(bounded_set),
        RecordType::Donors => simple(donor_field),
        RecordType::Projects => simple(project_field),
        RecordType::Protocols => simple(protocol_field),
    }
}

/// Contents of `document` aggregated from its live bundles in bundle UUID
/// order.
pub fn aggregate_document(document: &Document) -> Contents {
    let mut bundles: Vec<_> = document.live_bundles().collect();
    bundles.sort_by_key(|bundle| bundle.uuid);

    let mut records: BTreeMap<RecordType, Vec<&Value>> = BTreeMap::new();
    for bundle in bundles {
        for (record_type, values) in &bundle.contents {
            records.entry(*record_type).or_default().extend(values);
        }
    }

    records
        .into_iter()
        .map(|(record_type, values)| {
            let aggregated = match aggregator_for(document.entity.entity_type, record_type) {
                Some(aggregator) => aggregator.aggregate(values),
                None => values.into_iter().cloned().collect(),
            };
            (record_type, aggregated)
        })
        .collect()
}

fn unchanged(record: Record) -> Record {
    record
}

fn bounded_set(_field: &str) -> Accumulator {
    Accumulator::set(MAX_VALUES)
}

/// Size and count keyed by file UUID and version so that a file seen in
/// several bundles is counted once.
fn prepare_file(record: Record) -> Record {
    let key = json!([record.get("uuid"), record.get("version")]);
    let mut prepared = Record::new();
    prepared.insert(
        "size".to_string(),
        json!([key, record.get("size").cloned().unwrap_or(Value::Null)]),
    );
    prepared.insert("count".to_string(), json!([key, 1]));
    prepared.insert(
        "file_format".to_string(),
        record.get("file_format").cloned().unwrap_or(Value::Null),
    );
    prepared
}

fn file_field(field: &str) -> Accumulator {
    match field {
        "file_format" => Accumulator::single_value(),
        "size" | "count" => Accumulator::distinct(Accumulator::sum(0)),
        _ => Accumulator::Drop,
    }
}

fn prepare_cell_suspension(mut record: Record) -> Record {
    let cells = record
        .get("total_estimated_cells")
        .cloned()
        .unwrap_or(Value::Null);
    let document_id = record.get("document_id").cloned().unwrap_or(Value::Null);
    record.insert("total_estimated_cells".to_string(), json!([document_id, cells]));
    record
}

fn cell_suspension_field(field: &str) -> Accumulator {
    match field {
        "total_estimated_cells" => Accumulator::distinct(Accumulator::sum(0)),
        _ => Accumulator::set(MAX_VALUES),
    }
}

fn donor_field(field: &str) -> Accumulator {
    match field {
        "organism_age_range" => Accumulator::set_of_dict(MAX_VALUES),
        _ => Accumulator::set(MAX_VALUES),
    }
}

fn project_field(field: &str) -> Accumulator {
    match field {
        "document_id" => Accumulator::list(MAX_VALUES),
        "project_description" | "contact_names" | "contributors" | "publication_titles"
        | "publications" => Accumulator::Drop,
        _ => Accumulator::set(MAX_VALUES),
    }
}

fn protocol_field(field: &str) -> Accumulator {
    match field {
        "document_id" => Accumulator::Drop,
        "assay_type" => Accumulator::frequency_set(MAX_VALUES),
        _ => Accumulator::unbounded_set(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_indexer_shared::{BundleEntry, EntityReference};
    use uuid::Uuid;

    fn file_record(uuid: &str, version: &str, format: &str, size: u64) -> Value {
        json!({
            "uuid": uuid,
            "version": version,
            "file_format": format,
            "size": size,
            "name": "reads.fastq.gz"
        })
    }

    fn entry(uuid: Uuid, deleted: bool, contents: Contents) -> BundleEntry {
        BundleEntry {
            uuid,
            version: "2020-01-01T00:00:00.000Z".to_string(),
            deleted,
            contents,
        }
    }

    #[test]
    fn test_files_group_by_format_and_count_once() {
        let aggregator = aggregator_for(EntityType::Projects, RecordType::Files).unwrap();
        let records = [
            file_record("f1", "v1", "fastq.gz", 100),
            file_record("f1", "v1", "fastq.gz", 100),
            file_record("f2", "v1", "fastq.gz", 50),
            file_record("f3", "v1", "bam", 7),
        ];

        let summaries = aggregator.aggregate(&records);

        assert_eq!(
            summaries,
            vec![
                json!({"file_format": "bam", "size": 7, "count": 1}),
                json!({"file_format": "fastq.gz", "size": 150, "count": 2}),
            ]
        );
    }

    #[test]
    fn test_cell_suspensions_group_by_each_organ() {
        let aggregator =
            aggregator_for(EntityType::Projects, RecordType::CellSuspensions).unwrap();
        let records = [
            json!({"document_id": "cs1", "organ": ["brain"], "total_estimated_cells": 10}),
            json!({"document_id": "cs2", "organ": ["blood", "brain"], "total_estimated_cells": 5}),
            json!({"document_id": "cs3", "organ": [], "total_estimated_cells": 1}),
        ];

        let summaries = aggregator.aggregate(&records);

        assert_eq!(summaries.len(), 3);
        let cells: Vec<_> = summaries
            .iter()
            .map(|s| (s["organ"].clone(), s["total_estimated_cells"].clone()))
            .collect();
        assert!(cells.contains(&(json!(["blood", "brain"]), json!(5))));
        assert!(cells.contains(&(json!(["blood", "brain"]), json!(15))));
        assert!(cells.contains(&(json!([]), json!(1))));
    }

    #[test]
    fn test_project_laboratories_aggregate_to_set() {
        let aggregator = aggregator_for(EntityType::Projects, RecordType::Projects).unwrap();
        let records = [
            json!({"document_id": "p1", "laboratory": ["A", "B"], "contributors": [{"laboratory": "A"}]}),
            json!({"document_id": "p1", "laboratory": ["A"], "project_description": "About"}),
        ];

        let summaries = aggregator.aggregate(&records);

        assert_eq!(
            summaries,
            vec![json!({"document_id": ["p1", "p1"], "laboratory": ["A", "B"]})]
        );
    }

    #[test]
    fn test_protocols_drop_document_id_and_count_assays() {
        let aggregator = aggregator_for(EntityType::Files, RecordType::Protocols).unwrap();
        let records = [
            json!({"document_id": "p1", "assay_type": {"FISH": 2}}),
            json!({"document_id": "p2", "assay_type": {"FISH": 1}, "workflow": "smartseq2"}),
        ];

        let summaries = aggregator.aggregate(&records);

        assert_eq!(
            summaries,
            vec![json!({
                "assay_type": [{"value": "FISH", "count": 3}],
                "workflow": ["smartseq2"]
            })]
        );
    }

    #[test]
    fn test_simple_aggregate_of_nothing_is_empty() {
        let aggregator = aggregator_for(EntityType::Files, RecordType::Donors).unwrap();
        assert!(aggregator.aggregate(Vec::<&Value>::new()).is_empty());
    }

    #[test]
    fn test_bundle_files_and_metadata_are_kept_verbatim() {
        assert!(aggregator_for(EntityType::Bundles, RecordType::Files).is_none());
        assert!(aggregator_for(EntityType::Bundles, RecordType::Metadata).is_none());
        assert!(aggregator_for(EntityType::Bundles, RecordType::Donors).is_some());
    }

    #[test]
    fn test_aggregate_document_skips_tombstones() {
        let live = Uuid::from_u128(1);
        let dead = Uuid::from_u128(2);
        let mut live_contents = Contents::new();
        live_contents.insert(
            RecordType::Specimens,
            vec![json!({"organ": "brain", "document_id": "s1"})],
        );
        let mut dead_contents = Contents::new();
        dead_contents.insert(
            RecordType::Specimens,
            vec![json!({"organ": "liver", "document_id": "s2"})],
        );
        let document = Document {
            entity: EntityReference::new(EntityType::Samples, Uuid::from_u128(9)),
            bundles: vec![entry(live, false, live_contents), entry(dead, true, dead_contents)],
            contents: Contents::new(),
        };

        let contents = aggregate_document(&document);

        assert_eq!(
            contents[&RecordType::Specimens],
            vec![json!({"organ": ["brain"], "document_id": ["s1"]})]
        );
    }
}
