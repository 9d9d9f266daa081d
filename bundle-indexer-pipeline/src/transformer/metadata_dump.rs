//! Flat per-file metadata rows embedded in bundle documents.
//!
//! Each row describes one data file: its manifest fields followed by every
//! leaf of the metadata documents of the file, its ancestors, the protocols
//! of its ancestor processes and the project. Leaf keys are
//! `<schema_name>.<dotted.path>`; several values under one key are joined
//! with `||`.

use std::collections::{BTreeMap, BTreeSet};

use bundle_indexer_shared::graph::Entity;
use bundle_indexer_shared::metadata::File;
use bundle_indexer_shared::{EntityGraph, SchemaGeneration};
use serde_json::{json, Map, Value};
use uuid::Uuid;

const VALUE_SEPARATOR: &str = "||";

/// Top-level fields describing the document rather than the entity.
const IGNORED_FIELDS: [&str; 3] = ["describedBy", "schema_type", "schema_version"];

/// One row per indexable file. Bundles of the legacy schema generation get
/// no rows.
pub fn rows(graph: &EntityGraph) -> Vec<Value> {
    if graph.schema_generation() == SchemaGeneration::Legacy {
        return Vec::new();
    }
    graph.indexable_files().map(|file| row(graph, file)).collect()
}

fn row(graph: &EntityGraph, file: &File) -> Value {
    let entry = &file.manifest_entry;
    let mut row = Map::new();
    row.insert("file_uuid".to_string(), json!(entry.uuid.to_string()));
    row.insert("file_version".to_string(), json!(entry.version));
    row.insert("file_name".to_string(), json!(entry.name));
    row.insert("file_format".to_string(), json!(file.file_format));
    row.insert("file_sha256".to_string(), json!(entry.sha256));
    row.insert("file_size".to_string(), json!(entry.size));
    row.insert("bundle_uuid".to_string(), json!(graph.uuid().to_string()));
    row.insert("bundle_version".to_string(), json!(graph.version()));

    let mut leaves: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for id in described_entities(graph, file.document_id) {
        if let Some(source) = graph.source(&id) {
            let Value::Object(fields) = &source.content else {
                continue;
            };
            for (key, value) in fields {
                if IGNORED_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                flatten(&format!("{}.{key}", source.schema_name), value, &mut leaves);
            }
        }
    }
    for (key, values) in leaves {
        let joined = values.into_iter().collect::<Vec<_>>().join(VALUE_SEPARATOR);
        row.entry(key).or_insert(Value::String(joined));
    }
    Value::Object(row)
}

/// The file, its ancestors, the protocols of ancestor processes and the
/// project.
fn described_entities(graph: &EntityGraph, file_id: Uuid) -> BTreeSet<Uuid> {
    let mut ids = graph.ancestors(file_id);
    ids.insert(file_id);
    let protocols: Vec<Uuid> = ids
        .iter()
        .filter_map(|id| graph.entity(id))
        .filter_map(|node| match &node.entity {
            Entity::Process(process) => Some(process.protocol_ids.iter().copied()),
            Entity::Biomaterial(_) | Entity::File(_) => None,
        })
        .flatten()
        .collect();
    ids.extend(protocols);
    ids.extend(graph.projects().map(|project| project.document_id));
    ids
}

fn flatten(key: &str, value: &Value, leaves: &mut BTreeMap<String, BTreeSet<String>>) {
    match value {
        Value::Null => {}
        Value::Object(fields) => {
            for (name, child) in fields {
                flatten(&format!("{key}.{name}"), child, leaves);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten(key, item, leaves);
            }
        }
        Value::String(s) => {
            leaves.entry(key.to_string()).or_default().insert(s.clone());
        }
        Value::Bool(_) | Value::Number(_) => {
            leaves.entry(key.to_string()).or_default().insert(value.to_string());
        }
    }
}
