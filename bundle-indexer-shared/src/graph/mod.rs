//! Entity graph of a bundle.
//!
//! The graph is materialized from the metadata documents of a bundle and its
//! `links.json`. Biomaterials, files and processes are the linked nodes. A link
//! makes every input of a process a parent of the process and the process a
//! parent of every output. Protocols hang off processes and the project is
//! implied by the bundle, so neither is a node of its own.

mod lineage;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::bundle::{Bundle, SchemaGeneration, LINKS_FILE};
use crate::errors::MetadataError;
use crate::metadata::{
    parse_entity, Biomaterial, CellSuspension, File, MetadataEntity, Process, Project, Protocol,
    SpecimenFromOrganism,
};

pub use lineage::RelatedEntities;

/// A node of the entity graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Biomaterial(Biomaterial),
    File(File),
    Process(Process),
}

impl Entity {
    pub fn document_id(&self) -> Uuid {
        match self {
            Entity::Biomaterial(b) => b.document_id(),
            Entity::File(f) => f.document_id,
            Entity::Process(p) => p.document_id,
        }
    }
}

/// A node together with its parent and child links.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedEntity {
    pub entity: Entity,
    pub parents: BTreeSet<Uuid>,
    pub children: BTreeSet<Uuid>,
}

/// The raw metadata document an entity was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataSource {
    pub schema_name: String,
    pub content: Value,
}

/// The typed metadata graph of one bundle.
#[derive(Debug, Clone)]
pub struct EntityGraph {
    uuid: Uuid,
    version: String,
    generation: SchemaGeneration,
    projects: BTreeMap<Uuid, Project>,
    entities: BTreeMap<Uuid, LinkedEntity>,
    protocols: BTreeMap<Uuid, Protocol>,
    sources: BTreeMap<Uuid, MetadataSource>,
}

impl EntityGraph {
    /// Materialize the entity graph of a bundle.
    ///
    /// Fails on malformed metadata, on links referencing entities missing from
    /// the bundle, and on cyclic links.
    pub fn from_bundle(bundle: &Bundle) -> Result<Self, MetadataError> {
        let mut graph = Self {
            uuid: bundle.uuid,
            version: bundle.version.clone(),
            generation: bundle.schema_generation(),
            projects: BTreeMap::new(),
            entities: BTreeMap::new(),
            protocols: BTreeMap::new(),
            sources: BTreeMap::new(),
        };

        for (file_name, document) in &bundle.metadata_files {
            if file_name == LINKS_FILE {
                continue;
            }
            let entity = parse_entity(file_name, document, &bundle.manifest)?;
            let document_id = entity.document_id();
            if let Some(schema_name) = crate::metadata::schema_name(document) {
                graph.sources.insert(
                    document_id,
                    MetadataSource {
                        schema_name: schema_name.to_string(),
                        content: document.clone(),
                    },
                );
            }
            graph.insert(entity);
        }

        if let Some(links) = bundle.metadata_files.get(LINKS_FILE) {
            graph.apply_links(links)?;
        }
        graph.check_acyclic()?;

        debug!(
            bundle_uuid = %graph.uuid,
            bundle_version = %graph.version,
            projects = graph.projects.len(),
            entities = graph.entities.len(),
            protocols = graph.protocols.len(),
            "Materialized entity graph"
        );
        Ok(graph)
    }

    fn insert(&mut self, entity: MetadataEntity) {
        let node = match entity {
            MetadataEntity::Project(project) => {
                self.projects.insert(project.document_id, project);
                return;
            }
            MetadataEntity::Protocol(protocol) => {
                self.protocols.insert(protocol.document_id(), protocol);
                return;
            }
            MetadataEntity::Biomaterial(b) => Entity::Biomaterial(b),
            MetadataEntity::File(f) => Entity::File(f),
            MetadataEntity::Process(p) => Entity::Process(p),
        };
        self.entities.insert(
            node.document_id(),
            LinkedEntity {
                entity: node,
                parents: BTreeSet::new(),
                children: BTreeSet::new(),
            },
        );
    }

    fn apply_links(&mut self, links: &Value) -> Result<(), MetadataError> {
        let links = links
            .get("links")
            .and_then(Value::as_array)
            .ok_or_else(|| MetadataError::invalid_links("expected a `links` array"))?;

        for link in links {
            let process_id = link
                .get("process")
                .or_else(|| link.get("process_id"))
                .and_then(Value::as_str)
                .ok_or_else(|| MetadataError::invalid_links("link without a process"))
                .and_then(parse_link_id)?;
            let inputs = link_ids(link, "inputs", "input_id")?;
            let outputs = link_ids(link, "outputs", "output_id")?;
            let protocol_ids = link_ids(link, "protocols", "protocol_id")?;

            match self.entities.get_mut(&process_id).map(|node| &mut node.entity) {
                Some(Entity::Process(process)) => process.protocol_ids.extend(protocol_ids.iter()),
                _ => return Err(MetadataError::DanglingLink(process_id)),
            }
            if let Some(missing) = protocol_ids
                .iter()
                .find(|id| !self.protocols.contains_key(id))
            {
                return Err(MetadataError::DanglingLink(*missing));
            }

            for input in inputs {
                self.connect(input, process_id)?;
            }
            for output in outputs {
                self.connect(process_id, output)?;
            }
        }
        Ok(())
    }

    fn connect(&mut self, parent: Uuid, child: Uuid) -> Result<(), MetadataError> {
        for id in [parent, child] {
            if !self.entities.contains_key(&id) {
                return Err(MetadataError::DanglingLink(id));
            }
        }
        if let Some(node) = self.entities.get_mut(&parent) {
            node.children.insert(child);
        }
        if let Some(node) = self.entities.get_mut(&child) {
            node.parents.insert(parent);
        }
        Ok(())
    }

    /// Depth-first walk towards the parents with an explicit stack. An
    /// entity reached again while still on the current path closes a cycle.
    fn check_acyclic(&self) -> Result<(), MetadataError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            InProgress,
            Done,
        }

        enum Step {
            Enter(Uuid),
            Exit(Uuid),
        }

        let mut marks = HashMap::with_capacity(self.entities.len());
        for root in self.entities.keys() {
            let mut stack = vec![Step::Enter(*root)];
            while let Some(step) = stack.pop() {
                match step {
                    Step::Enter(id) => match marks.get(&id).copied() {
                        Some(Mark::Done) => {}
                        Some(Mark::InProgress) => return Err(MetadataError::CyclicGraph(id)),
                        None => {
                            marks.insert(id, Mark::InProgress);
                            stack.push(Step::Exit(id));
                            if let Some(node) = self.entities.get(&id) {
                                stack.extend(node.parents.iter().map(|p| Step::Enter(*p)));
                            }
                        }
                    },
                    Step::Exit(id) => {
                        marks.insert(id, Mark::Done);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn schema_generation(&self) -> SchemaGeneration {
        self.generation
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn entity(&self, id: &Uuid) -> Option<&LinkedEntity> {
        self.entities.get(id)
    }

    pub fn protocol(&self, id: &Uuid) -> Option<&Protocol> {
        self.protocols.get(id)
    }

    /// The raw metadata document of an entity.
    pub fn source(&self, id: &Uuid) -> Option<&MetadataSource> {
        self.sources.get(id)
    }

    /// All files of the bundle, including internal array chunks.
    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.entities.values().filter_map(|node| match &node.entity {
            Entity::File(file) => Some(file),
            _ => None,
        })
    }

    /// Files that are indexed as files of their own.
    pub fn indexable_files(&self) -> impl Iterator<Item = &File> {
        self.files().filter(|file| !file.is_array_chunk())
    }

    pub fn biomaterials(&self) -> impl Iterator<Item = &Biomaterial> {
        self.entities.values().filter_map(|node| match &node.entity {
            Entity::Biomaterial(b) => Some(b),
            _ => None,
        })
    }

    pub fn cell_suspensions(&self) -> impl Iterator<Item = &CellSuspension> {
        self.biomaterials().filter_map(|b| match b {
            Biomaterial::CellSuspension(cs) => Some(cs),
            _ => None,
        })
    }

    pub fn specimens(&self) -> impl Iterator<Item = &SpecimenFromOrganism> {
        self.biomaterials().filter_map(|b| match b {
            Biomaterial::Specimen(s) => Some(s),
            _ => None,
        })
    }
}

fn parse_link_id(raw: &str) -> Result<Uuid, MetadataError> {
    Uuid::parse_str(raw).map_err(|_| MetadataError::invalid_links(format!("invalid id {raw:?}")))
}

/// Ids listed under `key`, either as plain strings or as objects carrying the
/// id under `id_field`.
fn link_ids(link: &Value, key: &str, id_field: &str) -> Result<Vec<Uuid>, MetadataError> {
    let Some(items) = link.get(key) else {
        return Ok(Vec::new());
    };
    let items = items
        .as_array()
        .ok_or_else(|| MetadataError::invalid_links(format!("`{key}` is not an array")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .or_else(|| item.get(id_field).and_then(Value::as_str))
                .ok_or_else(|| MetadataError::invalid_links(format!("malformed entry in `{key}`")))
                .and_then(parse_link_id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BundleBuilder;

    #[test]
    fn test_links_connect_inputs_process_outputs() {
        let mut builder = BundleBuilder::new();
        let donor = builder.donor("donor-1");
        let specimen = builder.specimen("spec-1", Some("brain"));
        let process = builder.link(&[donor], &[specimen], &[]);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let specimen_node = graph.entity(&specimen).unwrap();
        assert!(specimen_node.parents.contains(&process));
        let process_node = graph.entity(&process).unwrap();
        assert!(process_node.parents.contains(&donor));
        assert!(graph.entity(&donor).unwrap().children.contains(&process));
    }

    #[test]
    fn test_link_to_unknown_entity_is_rejected() {
        let mut builder = BundleBuilder::new();
        let donor = builder.donor("donor-1");
        let ghost = Uuid::new_v4();
        builder.link(&[donor], &[ghost], &[]);

        let err = EntityGraph::from_bundle(&builder.build()).unwrap_err();
        assert_eq!(err, MetadataError::DanglingLink(ghost));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut builder = BundleBuilder::new();
        let a = builder.cell_suspension("cs-a", Some(10));
        let b = builder.cell_suspension("cs-b", Some(10));
        builder.link(&[a], &[b], &[]);
        builder.link(&[b], &[a], &[]);

        let err = EntityGraph::from_bundle(&builder.build()).unwrap_err();
        assert!(matches!(err, MetadataError::CyclicGraph(_)));
    }

    #[test]
    fn test_cycle_at_end_of_long_chain_is_rejected() {
        let mut builder = BundleBuilder::new();
        let chain: Vec<Uuid> = (0..2_000)
            .map(|i| builder.cell_suspension(&format!("cs-{i}"), Some(1)))
            .collect();
        for pair in chain.windows(2) {
            builder.link(&[pair[0]], &[pair[1]], &[]);
        }
        let bundle = builder.build();
        assert!(EntityGraph::from_bundle(&bundle).is_ok());

        let mut cyclic = BundleBuilder::new();
        let chain: Vec<Uuid> = (0..2_000)
            .map(|i| cyclic.cell_suspension(&format!("cs-{i}"), Some(1)))
            .collect();
        for pair in chain.windows(2) {
            cyclic.link(&[pair[0]], &[pair[1]], &[]);
        }
        cyclic.link(&[chain[chain.len() - 1]], &[chain[0]], &[]);

        let err = EntityGraph::from_bundle(&cyclic.build()).unwrap_err();
        assert!(matches!(err, MetadataError::CyclicGraph(_)));
    }

    #[test]
    fn test_shared_ancestor_is_not_a_cycle() {
        let mut builder = BundleBuilder::new();
        let specimen = builder.specimen("spec-1", Some("brain"));
        let left = builder.cell_suspension("cs-left", Some(1));
        let right = builder.cell_suspension("cs-right", Some(1));
        let pooled = builder.cell_suspension("cs-pooled", Some(2));
        builder.link(&[specimen], &[left, right], &[]);
        builder.link(&[left, right], &[pooled], &[]);

        assert!(EntityGraph::from_bundle(&builder.build()).is_ok());
    }

    #[test]
    fn test_link_ids_accept_objects() {
        let id = Uuid::new_v4();
        let link = serde_json::json!({
            "inputs": [{"input_type": "biomaterial", "input_id": id.to_string()}]
        });
        assert_eq!(link_ids(&link, "inputs", "input_id").unwrap(), vec![id]);
        assert!(link_ids(&link, "outputs", "output_id").unwrap().is_empty());
    }
}
