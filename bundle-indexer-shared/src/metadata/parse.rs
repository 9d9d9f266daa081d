//! Conversion of raw metadata documents into typed entities.
//!
//! Every metadata document names its concrete schema through the last path
//! segment of its `describedBy` URL and its category through `schema_type`.
//! Ontology-valued fields are either plain strings or objects with a `text`
//! member; both forms are accepted.

use serde_json::Value;
use uuid::Uuid;

use super::entities::{
    Biomaterial, BiomaterialCore, CellLine, CellSuspension, DonorOrganism, File, FileKind,
    Organoid, OtherBiomaterial, Process, Project, ProjectContact, ProjectPublication, Protocol,
    SpecimenFromOrganism,
};
use crate::bundle::ManifestEntry;
use crate::errors::MetadataError;

/// A metadata document converted into its typed form.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataEntity {
    Project(Project),
    Biomaterial(Biomaterial),
    File(File),
    Protocol(Protocol),
    Process(Process),
}

impl MetadataEntity {
    pub fn document_id(&self) -> Uuid {
        match self {
            MetadataEntity::Project(p) => p.document_id,
            MetadataEntity::Biomaterial(b) => b.document_id(),
            MetadataEntity::File(f) => f.document_id,
            MetadataEntity::Protocol(p) => p.document_id(),
            MetadataEntity::Process(p) => p.document_id,
        }
    }
}

/// The concrete schema name of a metadata document, e.g. `donor_organism`.
pub fn schema_name(document: &Value) -> Option<&str> {
    document
        .get("describedBy")
        .and_then(Value::as_str)
        .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
        .filter(|name| !name.is_empty())
}

fn schema_type(document: &Value) -> Option<&str> {
    if let Some(schema_type) = document.get("schema_type").and_then(Value::as_str) {
        return Some(schema_type);
    }
    // .../type/<schema_type>/<version>/<schema_name>
    let url = document.get("describedBy").and_then(Value::as_str)?;
    url.trim_end_matches('/').rsplit('/').nth(2)
}

/// Convert one metadata document into a typed entity.
///
/// `file` is the metadata file name and only used in error messages. File
/// entities are joined to their manifest entry by file name.
pub fn parse_entity(
    file: &str,
    document: &Value,
    manifest: &[ManifestEntry],
) -> Result<MetadataEntity, MetadataError> {
    let schema_type =
        schema_type(document).ok_or_else(|| MetadataError::missing(file, "schema_type"))?;
    let schema_name =
        schema_name(document).ok_or_else(|| MetadataError::missing(file, "describedBy"))?;
    let document_id = document_id(file, document)?;

    let entity = match schema_type {
        "project" => MetadataEntity::Project(project(document_id, document)),
        "biomaterial" => {
            MetadataEntity::Biomaterial(biomaterial(document_id, schema_name, document))
        }
        "file" => {
            MetadataEntity::File(data_file(file, document_id, schema_name, document, manifest)?)
        }
        "protocol" => MetadataEntity::Protocol(protocol(document_id, schema_name, document)),
        "process" => MetadataEntity::Process(Process {
            document_id,
            schema_name: schema_name.to_string(),
            protocol_ids: Vec::new(),
        }),
        other => return Err(MetadataError::unknown_schema(other, schema_name)),
    };
    Ok(entity)
}

fn document_id(file: &str, document: &Value) -> Result<Uuid, MetadataError> {
    let raw = first_str(document, &["provenance.document_id", "hca_ingest.document_id"])
        .ok_or_else(|| MetadataError::missing(file, "provenance.document_id"))?;
    Uuid::parse_str(raw).map_err(|_| MetadataError::InvalidDocumentId {
        file: file.to_string(),
        value: raw.to_string(),
    })
}

fn project(document_id: Uuid, document: &Value) -> Project {
    let contributors = array(document, "contributors")
        .map(|contact| ProjectContact {
            contact_name: first_string(contact, &["name", "contact_name"]),
            corresponding_contributor: lookup(contact, "corresponding_contributor")
                .and_then(Value::as_bool),
            email: string(contact, "email"),
            institution: string(contact, "institution"),
            laboratory: string(contact, "laboratory"),
            project_role: string(contact, "project_role"),
        })
        .collect();

    let publications = array(document, "publications")
        .map(|publication| ProjectPublication {
            publication_title: first_string(publication, &["title", "publication_title"]),
            publication_url: first_string(publication, &["url", "publication_url"]),
        })
        .collect();

    Project {
        document_id,
        project_title: string(document, "project_core.project_title"),
        project_short_name: first_string(
            document,
            &["project_core.project_short_name", "project_core.project_shortname"],
        ),
        project_description: string(document, "project_core.project_description"),
        contributors,
        publications,
        insdc_project_accessions: first_strings(
            document,
            &["insdc_project_accessions", "insdc_project"],
        ),
        geo_series_accessions: first_strings(document, &["geo_series_accessions", "geo_series"]),
        array_express_accessions: first_strings(
            document,
            &["array_express_accessions", "array_express_investigation"],
        ),
        insdc_study_accessions: first_strings(document, &["insdc_study_accessions", "insdc_study"]),
    }
}

fn biomaterial(document_id: Uuid, schema_name: &str, document: &Value) -> Biomaterial {
    let core = BiomaterialCore {
        document_id,
        biomaterial_id: string(document, "biomaterial_core.biomaterial_id"),
        has_input_biomaterial: string(document, "biomaterial_core.has_input_biomaterial"),
    };
    match schema_name {
        "donor_organism" => Biomaterial::DonorOrganism(DonorOrganism {
            core,
            sex: first_string(document, &["sex", "biological_sex"]),
            genus_species: strings(document, "genus_species"),
            diseases: strings(document, "diseases"),
            organism_age: string(document, "organism_age"),
            organism_age_unit: string(document, "organism_age_unit"),
        }),
        "specimen_from_organism" => Biomaterial::Specimen(SpecimenFromOrganism {
            core,
            organ: string(document, "organ"),
            organ_parts: first_strings(document, &["organ_parts", "organ_part"]),
            diseases: strings(document, "diseases"),
            storage_method: string(document, "preservation_storage.storage_method"),
            preservation_method: string(document, "preservation_storage.preservation_method"),
        }),
        "cell_suspension" => Biomaterial::CellSuspension(CellSuspension {
            core,
            estimated_cell_count: first(
                document,
                &["estimated_cell_count", "total_estimated_cells"],
            )
            .and_then(Value::as_i64),
            selected_cell_types: first_strings(
                document,
                &["selected_cell_types", "selected_cell_type"],
            ),
        }),
        "cell_line" => Biomaterial::CellLine(CellLine {
            core,
            cell_line_type: string(document, "cell_line_type"),
            model_organ: string(document, "model_organ"),
        }),
        "organoid" => Biomaterial::Organoid(Organoid {
            core,
            model_organ: string(document, "model_organ"),
            model_organ_part: string(document, "model_organ_part"),
        }),
        other => Biomaterial::Other(OtherBiomaterial {
            core,
            schema_name: other.to_string(),
        }),
    }
}

fn data_file(
    file: &str,
    document_id: Uuid,
    schema_name: &str,
    document: &Value,
    manifest: &[ManifestEntry],
) -> Result<File, MetadataError> {
    let kind = match schema_name {
        "sequence_file" => FileKind::Sequence {
            read_index: string(document, "read_index"),
            lane_index: lookup(document, "lane_index").and_then(Value::as_i64),
        },
        "supplementary_file" => FileKind::Supplementary,
        "analysis_file" => FileKind::Analysis,
        "image_file" => FileKind::Image,
        "reference_file" => FileKind::Reference,
        other => return Err(MetadataError::unknown_schema("file", other)),
    };

    let file_name = lookup(document, "file_core.file_name")
        .and_then(Value::as_str)
        .ok_or_else(|| MetadataError::missing(file, "file_core.file_name"))?;
    let manifest_entry = manifest
        .iter()
        .find(|entry| entry.name == file_name)
        .cloned()
        .ok_or_else(|| MetadataError::MissingManifestEntry(file_name.to_string()))?;

    Ok(File {
        document_id,
        file_format: first_string(document, &["file_core.format", "file_core.file_format"]),
        kind,
        manifest_entry,
    })
}

fn protocol(document_id: Uuid, schema_name: &str, document: &Value) -> Protocol {
    match schema_name {
        "library_preparation_protocol" => Protocol::LibraryPreparation {
            document_id,
            library_construction_approach: first_string(
                document,
                &["library_construction_method", "library_construction_approach"],
            ),
        },
        "sequencing_protocol" => Protocol::Sequencing {
            document_id,
            instrument_manufacturer_model: string(document, "instrument_manufacturer_model"),
            paired_end: lookup(document, "paired_end").and_then(Value::as_bool),
        },
        "analysis_protocol" => Protocol::Analysis {
            document_id,
            protocol_id: string(document, "protocol_core.protocol_id"),
        },
        "imaging_protocol" => Protocol::Imaging {
            document_id,
            assay_types: array(document, "target")
                .filter_map(|target| string(target, "assay_type"))
                .collect(),
        },
        other => Protocol::Other {
            document_id,
            schema_name: other.to_string(),
        },
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

fn first<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|path| lookup(value, path))
}

fn first_str<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a str> {
    first(value, paths).and_then(Value::as_str)
}

fn ontology_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("ontology_label"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn string(value: &Value, path: &str) -> Option<String> {
    lookup(value, path).and_then(ontology_text)
}

fn first_string(value: &Value, paths: &[&str]) -> Option<String> {
    first(value, paths).and_then(ontology_text)
}

fn strings_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(ontology_text).collect(),
        Some(other) => ontology_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn strings(value: &Value, path: &str) -> Vec<String> {
    strings_of(lookup(value, path))
}

fn first_strings(value: &Value, paths: &[&str]) -> Vec<String> {
    strings_of(first(value, paths))
}

fn array<'a>(value: &'a Value, path: &str) -> impl Iterator<Item = &'a Value> {
    lookup(value, path)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}
