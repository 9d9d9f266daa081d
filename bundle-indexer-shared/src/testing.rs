//! In-memory bundle construction for tests.
//!
//! Entities get random document ids. Metadata files are named after their
//! schema with a running counter, the same way stored bundles name them.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::bundle::{Bundle, ManifestEntry, LINKS_FILE};

pub const DEFAULT_VERSION: &str = "2020-01-01T00:00:00.000Z";

#[derive(Debug, Clone)]
pub struct BundleBuilder {
    uuid: Uuid,
    version: String,
    manifest: Vec<ManifestEntry>,
    metadata_files: BTreeMap<String, Value>,
    links: Vec<Value>,
    counter: usize,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::for_bundle(Uuid::new_v4(), DEFAULT_VERSION)
    }

    pub fn for_bundle(uuid: Uuid, version: &str) -> Self {
        Self {
            uuid,
            version: version.to_string(),
            manifest: Vec::new(),
            metadata_files: BTreeMap::new(),
            links: Vec::new(),
            counter: 0,
        }
    }

    /// Add an entity document and return its document id.
    pub fn entity(&mut self, schema_type: &str, schema_name: &str, fields: Value) -> Uuid {
        let document_id = Uuid::new_v4();
        let mut document = json!({
            "describedBy": format!(
                "https://schema.example.org/type/{schema_type}/1.0.0/{schema_name}"
            ),
            "schema_type": schema_type,
            "provenance": {"document_id": document_id.to_string()}
        });
        if let (Value::Object(target), Value::Object(extra)) = (&mut document, fields) {
            target.extend(extra);
        }
        let file_name = format!("{schema_name}_{}.json", self.counter);
        self.counter += 1;
        self.metadata_files.insert(file_name, document);
        document_id
    }

    /// Add a raw metadata file, e.g. a legacy `project.json`.
    pub fn metadata_file(&mut self, name: &str, document: Value) {
        self.metadata_files.insert(name.to_string(), document);
    }

    pub fn project(&mut self, title: &str, laboratories: &[&str]) -> Uuid {
        let contributors: Vec<Value> = laboratories
            .iter()
            .enumerate()
            .map(|(i, lab)| {
                json!({
                    "name": format!("Contributor {i}"),
                    "institution": "Institute",
                    "laboratory": lab,
                    "corresponding_contributor": i == 0
                })
            })
            .collect();
        self.entity(
            "project",
            "project",
            json!({
                "project_core": {
                    "project_title": title,
                    "project_short_name": title.to_lowercase().replace(' ', "-"),
                    "project_description": format!("About {title}")
                },
                "contributors": contributors,
                "publications": [{"title": format!("{title} paper"), "url": "https://doi.org/x"}],
                "insdc_project_accessions": ["SRP000001"]
            }),
        )
    }

    pub fn donor(&mut self, biomaterial_id: &str) -> Uuid {
        self.entity(
            "biomaterial",
            "donor_organism",
            json!({
                "biomaterial_core": {"biomaterial_id": biomaterial_id},
                "sex": "female",
                "genus_species": [{"text": "Homo sapiens"}],
                "diseases": [{"text": "normal"}],
                "organism_age": "40-45",
                "organism_age_unit": {"text": "year"}
            }),
        )
    }

    pub fn specimen(&mut self, biomaterial_id: &str, organ: Option<&str>) -> Uuid {
        let mut fields = json!({
            "biomaterial_core": {"biomaterial_id": biomaterial_id},
            "organ_parts": [{"text": "cortex"}],
            "diseases": [{"text": "normal"}],
            "preservation_storage": {"storage_method": "frozen"}
        });
        if let Some(organ) = organ {
            fields["organ"] = json!({"text": organ});
        }
        self.entity("biomaterial", "specimen_from_organism", fields)
    }

    pub fn cell_suspension(&mut self, biomaterial_id: &str, cells: Option<i64>) -> Uuid {
        let mut fields = json!({
            "biomaterial_core": {"biomaterial_id": biomaterial_id},
            "selected_cell_types": [{"text": "neuron"}]
        });
        if let Some(cells) = cells {
            fields["estimated_cell_count"] = json!(cells);
        }
        self.entity("biomaterial", "cell_suspension", fields)
    }

    pub fn cell_line(&mut self, biomaterial_id: &str, model_organ: Option<&str>) -> Uuid {
        let mut fields = json!({
            "biomaterial_core": {"biomaterial_id": biomaterial_id},
            "cell_line_type": "primary"
        });
        if let Some(organ) = model_organ {
            fields["model_organ"] = json!({"text": organ});
        }
        self.entity("biomaterial", "cell_line", fields)
    }

    pub fn organoid(&mut self, biomaterial_id: &str, model_organ: &str, part: &str) -> Uuid {
        self.entity(
            "biomaterial",
            "organoid",
            json!({
                "biomaterial_core": {"biomaterial_id": biomaterial_id},
                "model_organ": {"text": model_organ},
                "model_organ_part": {"text": part}
            }),
        )
    }

    /// Add a sequence file and its manifest entry.
    pub fn file(&mut self, name: &str, format: &str, size: u64) -> Uuid {
        self.file_of_kind(
            "sequence_file",
            name,
            format,
            size,
            json!({"read_index": "read1", "lane_index": 1}),
        )
    }

    pub fn file_of_kind(
        &mut self,
        schema_name: &str,
        name: &str,
        format: &str,
        size: u64,
        fields: Value,
    ) -> Uuid {
        self.manifest.push(ManifestEntry {
            name: name.to_string(),
            uuid: Uuid::new_v4(),
            version: self.version.clone(),
            content_type: "application/octet-stream".to_string(),
            size,
            indexed: false,
            sha256: Some(format!("sha256-{}", self.manifest.len())),
        });
        let mut document = Map::new();
        document.insert(
            "file_core".to_string(),
            json!({"file_name": name, "format": format}),
        );
        if let Value::Object(extra) = fields {
            document.extend(extra);
        }
        self.entity("file", schema_name, Value::Object(document))
    }

    pub fn protocol(&mut self, schema_name: &str, fields: Value) -> Uuid {
        self.entity("protocol", schema_name, fields)
    }

    /// Add a process linking `inputs` to `outputs` and return its id.
    pub fn link(&mut self, inputs: &[Uuid], outputs: &[Uuid], protocols: &[Uuid]) -> Uuid {
        let process = self.entity("process", "process", json!({}));
        self.links.push(json!({
            "process": process.to_string(),
            "inputs": inputs.iter().map(Uuid::to_string).collect::<Vec<_>>(),
            "outputs": outputs.iter().map(Uuid::to_string).collect::<Vec<_>>(),
            "protocols": protocols
                .iter()
                .map(|id| json!({"protocol_type": "protocol", "protocol_id": id.to_string()}))
                .collect::<Vec<_>>()
        }));
        process
    }

    pub fn build(&self) -> Bundle {
        let mut metadata_files = self.metadata_files.clone();
        if !self.links.is_empty() {
            metadata_files.insert(LINKS_FILE.to_string(), json!({"links": self.links}));
        }
        Bundle::new(
            self.uuid,
            self.version.clone(),
            self.manifest.clone(),
            metadata_files,
        )
    }
}
