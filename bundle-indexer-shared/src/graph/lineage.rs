//! Walks over the entity graph.

use std::collections::{BTreeMap, BTreeSet};
use std::iter;

use uuid::Uuid;

use super::{Entity, EntityGraph, LinkedEntity};
use crate::metadata::{
    Biomaterial, CellLine, CellSuspension, DonorOrganism, File, Organoid, Protocol, Sample,
    SpecimenFromOrganism,
};

/// Entities related to a set of root entities, bucketed by kind and keyed by
/// document id so that an entity reached over several paths appears once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedEntities<'g> {
    pub specimens: BTreeMap<Uuid, &'g SpecimenFromOrganism>,
    pub cell_suspensions: BTreeMap<Uuid, &'g CellSuspension>,
    pub cell_lines: BTreeMap<Uuid, &'g CellLine>,
    pub donors: BTreeMap<Uuid, &'g DonorOrganism>,
    pub organoids: BTreeMap<Uuid, &'g Organoid>,
    pub protocols: BTreeMap<Uuid, &'g Protocol>,
    pub files: BTreeMap<Uuid, &'g File>,
}

impl<'g> RelatedEntities<'g> {
    fn visit(mut self, graph: &'g EntityGraph, node: &'g LinkedEntity) -> Self {
        match &node.entity {
            Entity::Biomaterial(biomaterial) => match biomaterial {
                Biomaterial::Specimen(s) => {
                    self.specimens.insert(s.core.document_id, s);
                }
                Biomaterial::CellSuspension(cs) => {
                    self.cell_suspensions.insert(cs.core.document_id, cs);
                }
                Biomaterial::CellLine(cl) => {
                    self.cell_lines.insert(cl.core.document_id, cl);
                }
                Biomaterial::DonorOrganism(d) => {
                    self.donors.insert(d.core.document_id, d);
                }
                Biomaterial::Organoid(o) => {
                    self.organoids.insert(o.core.document_id, o);
                }
                Biomaterial::Other(_) => {}
            },
            Entity::Process(process) => {
                let protocols = process
                    .protocol_ids
                    .iter()
                    .filter_map(|id| graph.protocol(id))
                    .filter(|protocol| protocol.is_indexed());
                for protocol in protocols {
                    self.protocols.insert(protocol.document_id(), protocol);
                }
            }
            Entity::File(file) => {
                if !file.is_array_chunk() {
                    self.files.insert(file.document_id, file);
                }
            }
        }
        self
    }

    /// Add files found outside the ancestor walk, e.g. descendants of a root.
    pub fn with_files(mut self, files: impl IntoIterator<Item = &'g File>) -> Self {
        for file in files {
            if !file.is_array_chunk() {
                self.files.insert(file.document_id, file);
            }
        }
        self
    }
}

impl EntityGraph {
    /// Every entity reachable from `id` through parent links, excluding `id`.
    pub fn ancestors(&self, id: Uuid) -> BTreeSet<Uuid> {
        let mut seen = BTreeSet::new();
        let mut pending = self.parents_of(id);
        while let Some(next) = pending.pop() {
            if seen.insert(next) {
                pending.extend(self.parents_of(next));
            }
        }
        seen
    }

    fn parents_of(&self, id: Uuid) -> Vec<Uuid> {
        self.entity(&id)
            .map(|node| node.parents.iter().copied().collect())
            .unwrap_or_default()
    }

    fn children_of(&self, id: Uuid) -> Vec<Uuid> {
        self.entity(&id)
            .map(|node| node.children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The nearest sample-type ancestors of an entity.
    ///
    /// Specimens, cell lines and organoids end the upward walk; every other
    /// node is walked through. An entity that is a sample itself resolves to
    /// itself.
    pub fn ancestor_samples(&self, id: Uuid) -> BTreeMap<Uuid, Sample<'_>> {
        self.ancestor_samples_of(iter::once(id))
    }

    /// Union of the ancestor samples of several entities.
    pub fn ancestor_samples_of(
        &self,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> BTreeMap<Uuid, Sample<'_>> {
        let mut samples = BTreeMap::new();
        let mut seen = BTreeSet::new();
        let mut pending: Vec<Uuid> = ids.into_iter().collect();

        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            let Some(node) = self.entity(&next) else {
                continue;
            };
            let sample = match &node.entity {
                Entity::Biomaterial(biomaterial) => biomaterial.as_sample(),
                Entity::File(_) | Entity::Process(_) => None,
            };
            match sample {
                Some(sample) => {
                    samples.insert(next, sample);
                }
                None => pending.extend(node.parents.iter().copied()),
            }
        }
        samples
    }

    /// The roots and all of their ancestors, folded into typed buckets.
    pub fn lineage(&self, roots: impl IntoIterator<Item = Uuid>) -> RelatedEntities<'_> {
        let ids: BTreeSet<Uuid> = roots
            .into_iter()
            .flat_map(|root| iter::once(root).chain(self.ancestors(root)))
            .collect();
        ids.iter()
            .filter_map(|id| self.entity(id))
            .fold(RelatedEntities::default(), |related, node| {
                related.visit(self, node)
            })
    }

    /// Files reachable from `id` through child links.
    pub fn descendant_files(&self, id: Uuid) -> Vec<&File> {
        let mut seen = BTreeSet::new();
        let mut files = Vec::new();
        let mut pending = self.children_of(id);
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(node) = self.entity(&next) {
                if let Entity::File(file) = &node.entity {
                    files.push(file);
                }
                pending.extend(node.children.iter().copied());
            }
        }
        files.sort_by_key(|file| file.document_id);
        files
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::BundleBuilder;
    use crate::EntityGraph;

    #[test]
    fn test_diamond_resolves_single_sample() {
        let mut builder = BundleBuilder::new();
        let donor = builder.donor("donor-1");
        let specimen = builder.specimen("spec-1", Some("pancreas"));
        let left = builder.cell_suspension("cs-left", Some(10));
        let right = builder.cell_suspension("cs-right", Some(10));
        let pooled = builder.cell_suspension("cs-pooled", Some(20));
        builder.link(&[donor], &[specimen], &[]);
        builder.link(&[specimen], &[left, right], &[]);
        builder.link(&[left, right], &[pooled], &[]);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let samples = graph.ancestor_samples(pooled);
        assert_eq!(samples.len(), 1);
        assert!(samples.contains_key(&specimen));

        let related = graph.lineage([pooled]);
        assert_eq!(related.specimens.len(), 1);
        assert_eq!(related.donors.len(), 1);
        assert_eq!(related.cell_suspensions.len(), 3);
    }

    #[test]
    fn test_sample_resolves_to_itself() {
        let mut builder = BundleBuilder::new();
        let cell_line = builder.cell_line("cl-1", Some("blood"));
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let samples = graph.ancestor_samples(cell_line);
        assert_eq!(samples.keys().copied().collect::<Vec<_>>(), vec![cell_line]);
    }

    #[test]
    fn test_lineage_skips_unindexed_protocols_and_chunks() {
        let mut builder = BundleBuilder::new();
        let specimen = builder.specimen("spec-1", Some("brain"));
        let suspension = builder.cell_suspension("cs-1", Some(5));
        let dissociation = builder.protocol("dissociation_protocol", serde_json::json!({}));
        let sequencing = builder.protocol(
            "sequencing_protocol",
            serde_json::json!({"paired_end": true}),
        );
        let chunk = builder.file("matrix.zarr!expression!0.0", "zarr", 10);
        let reads = builder.file("reads.fastq.gz", "fastq.gz", 100);
        builder.link(&[specimen], &[suspension], &[dissociation]);
        builder.link(&[suspension], &[chunk, reads], &[sequencing]);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let related = graph.lineage([chunk, reads]);
        assert_eq!(related.files.keys().copied().collect::<Vec<_>>(), vec![reads]);
        assert_eq!(
            related.protocols.keys().copied().collect::<Vec<_>>(),
            vec![sequencing]
        );
    }

    #[test]
    fn test_descendant_files() {
        let mut builder = BundleBuilder::new();
        let specimen = builder.specimen("spec-1", Some("brain"));
        let suspension = builder.cell_suspension("cs-1", Some(5));
        let reads = builder.file("reads.fastq.gz", "fastq.gz", 100);
        builder.link(&[specimen], &[suspension], &[]);
        builder.link(&[suspension], &[reads], &[]);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let files = graph.descendant_files(specimen);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].document_id, reads);
        assert!(graph.descendant_files(reads).is_empty());
    }
}
