//! Serialization of metadata entities into index records.
//!
//! Absent source fields become explicit `null`s. Set-valued fields are
//! emitted sorted so that a record only depends on its inputs.

use std::collections::{BTreeMap, BTreeSet};

use bundle_indexer_shared::metadata::{
    CellLine, CellSuspension, DonorOrganism, File, FileKind, Organoid, Project, Protocol, Sample,
    SpecimenFromOrganism,
};
use bundle_indexer_shared::EntityGraph;
use serde_json::{json, Map, Value};

use crate::errors::TransformError;

fn object<const N: usize>(fields: [(&str, Value); N]) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

pub fn project(project: &Project) -> Value {
    let mut laboratories = BTreeSet::new();
    let mut institutions = BTreeSet::new();
    let mut contact_names = BTreeSet::new();
    for contributor in &project.contributors {
        laboratories.extend(contributor.laboratory.as_deref().filter(|s| !s.is_empty()));
        institutions.extend(contributor.institution.as_deref().filter(|s| !s.is_empty()));
        contact_names.extend(contributor.contact_name.as_deref().filter(|s| !s.is_empty()));
    }
    let publication_titles: BTreeSet<&str> = project
        .publications
        .iter()
        .filter_map(|p| p.publication_title.as_deref())
        .filter(|s| !s.is_empty())
        .collect();

    let contributors: Vec<Value> = project
        .contributors
        .iter()
        .map(|c| {
            json!({
                "contact_name": c.contact_name,
                "corresponding_contributor": c.corresponding_contributor,
                "email": c.email,
                "institution": c.institution,
                "laboratory": c.laboratory,
                "project_role": c.project_role
            })
        })
        .collect();
    let publications: Vec<Value> = project
        .publications
        .iter()
        .map(|p| {
            json!({
                "publication_title": p.publication_title,
                "publication_url": p.publication_url
            })
        })
        .collect();

    json!({
        "project_title": project.project_title,
        "project_description": project.project_description,
        "project_short_name": project.project_short_name,
        "laboratory": laboratories,
        "institutions": institutions,
        "contact_names": contact_names,
        "contributors": contributors,
        "document_id": project.document_id.to_string(),
        "publication_titles": publication_titles,
        "publications": publications,
        "insdc_project_accessions": project.insdc_project_accessions,
        "geo_series_accessions": project.geo_series_accessions,
        "array_express_accessions": project.array_express_accessions,
        "insdc_study_accessions": project.insdc_study_accessions,
        "_type": "project"
    })
}

pub fn specimen(specimen: &SpecimenFromOrganism) -> Map<String, Value> {
    object([
        ("has_input_biomaterial", json!(specimen.core.has_input_biomaterial)),
        ("_source", json!("specimen_from_organism")),
        ("document_id", json!(specimen.core.document_id.to_string())),
        ("biomaterial_id", json!(specimen.core.biomaterial_id)),
        ("disease", json!(specimen.diseases)),
        ("organ", json!(specimen.organ)),
        ("organ_part", json!(specimen.organ_parts)),
        ("storage_method", json!(specimen.storage_method)),
        ("preservation_method", json!(specimen.preservation_method)),
        ("_type", json!("specimen")),
    ])
}

/// A cell suspension record. Organs and organ parts are taken from the
/// nearest sample ancestors.
pub fn cell_suspension(graph: &EntityGraph, cell_suspension: &CellSuspension) -> Value {
    let mut organs: BTreeSet<Option<&str>> = BTreeSet::new();
    let mut organ_parts: BTreeSet<Option<&str>> = BTreeSet::new();
    for sample in graph.ancestor_samples(cell_suspension.core.document_id).into_values() {
        match sample {
            Sample::Specimen(s) => {
                organs.insert(s.organ.as_deref());
                organ_parts.extend(s.organ_parts.iter().map(|p| Some(p.as_str())));
            }
            Sample::CellLine(c) => {
                organs.insert(c.model_organ.as_deref());
                organ_parts.insert(None);
            }
            Sample::Organoid(o) => {
                organs.insert(o.model_organ.as_deref());
                organ_parts.insert(o.model_organ_part.as_deref());
            }
        }
    }

    json!({
        "document_id": cell_suspension.core.document_id.to_string(),
        "total_estimated_cells": cell_suspension.estimated_cell_count,
        "selected_cell_type": cell_suspension.selected_cell_types,
        "organ": organs,
        "organ_part": organ_parts
    })
}

pub fn cell_line(cell_line: &CellLine) -> Map<String, Value> {
    object([
        ("document_id", json!(cell_line.core.document_id.to_string())),
        ("biomaterial_id", json!(cell_line.core.biomaterial_id)),
        ("cell_line_type", json!(cell_line.cell_line_type)),
        ("model_organ", json!(cell_line.model_organ)),
    ])
}

pub fn donor(donor: &DonorOrganism) -> Value {
    let mut record = json!({
        "document_id": donor.core.document_id.to_string(),
        "biomaterial_id": donor.core.biomaterial_id,
        "biological_sex": donor.sex,
        "genus_species": donor.genus_species,
        "diseases": donor.diseases,
        "organism_age": donor.organism_age,
        "organism_age_unit": donor.organism_age_unit
    });
    if let Some(range) = donor.organism_age_in_seconds() {
        record["organism_age_range"] = json!({"gte": range.min, "lte": range.max});
    }
    record
}

pub fn organoid(organoid: &Organoid) -> Map<String, Value> {
    object([
        ("document_id", json!(organoid.core.document_id.to_string())),
        ("biomaterial_id", json!(organoid.core.biomaterial_id)),
        ("model_organ", json!(organoid.model_organ)),
        ("model_organ_part", json!(organoid.model_organ_part)),
    ])
}

pub fn file(file: &File) -> Value {
    let entry = &file.manifest_entry;
    let mut record = json!({
        "content-type": entry.content_type,
        "indexed": entry.indexed,
        "name": entry.name,
        "sha256": entry.sha256,
        "size": entry.size,
        "uuid": entry.uuid.to_string(),
        "version": entry.version,
        "document_id": file.document_id.to_string(),
        "file_format": file.file_format,
        "_type": "file"
    });
    if let FileKind::Sequence {
        read_index,
        lane_index,
    } = &file.kind
    {
        record["read_index"] = json!(read_index);
        record["lane_index"] = json!(lane_index);
    }
    record
}

pub fn protocol(protocol: &Protocol) -> Result<Value, TransformError> {
    let mut record = Map::new();
    record.insert(
        "document_id".to_string(),
        json!(protocol.document_id().to_string()),
    );
    match protocol {
        Protocol::LibraryPreparation {
            library_construction_approach,
            ..
        } => {
            record.insert(
                "library_construction_approach".to_string(),
                json!(library_construction_approach),
            );
        }
        Protocol::Sequencing {
            instrument_manufacturer_model,
            paired_end,
            ..
        } => {
            record.insert(
                "instrument_manufacturer_model".to_string(),
                json!(instrument_manufacturer_model),
            );
            record.insert("paired_end".to_string(), json!(paired_end));
        }
        Protocol::Analysis { protocol_id, .. } => {
            record.insert("workflow".to_string(), json!(protocol_id));
        }
        Protocol::Imaging { assay_types, .. } => {
            let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
            for assay_type in assay_types {
                *counts.entry(assay_type.as_str()).or_default() += 1;
            }
            record.insert("assay_type".to_string(), json!(counts));
        }
        Protocol::Other {
            document_id,
            schema_name,
        } => {
            return Err(TransformError::UnsupportedProtocol {
                document_id: *document_id,
                schema_name: schema_name.clone(),
            });
        }
    }
    Ok(Value::Object(record))
}

/// A sample record: the record of the concrete sample kind plus its kind and
/// effective organ.
pub fn sample(sample: Sample<'_>) -> Result<Value, TransformError> {
    let (entity_type, mut record) = match sample {
        Sample::Specimen(s) => ("specimens", specimen(s)),
        Sample::CellLine(c) => ("cell_lines", cell_line(c)),
        Sample::Organoid(o) => ("organoids", organoid(o)),
    };

    let effective_organ = match (record.get("organ"), record.get("model_organ")) {
        (Some(organ), None) | (None, Some(organ)) => organ.clone(),
        _ => {
            return Err(TransformError::AmbiguousOrgan {
                document_id: sample.document_id(),
            })
        }
    };
    record.insert("entity_type".to_string(), json!(entity_type));
    record.insert("effective_organ".to_string(), effective_organ);
    Ok(Value::Object(record))
}
