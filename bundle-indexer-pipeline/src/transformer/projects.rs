//! Contributions to project and bundle documents.
//!
//! Both summarize a whole bundle: every specimen and every file with their
//! lineages. A bundle document also carries the flat metadata rows of its
//! files.

use std::iter;

use bundle_indexer_shared::metadata::Project;
use bundle_indexer_shared::{Contribution, EntityGraph, EntityType, RecordType};

use super::{
    contribution, metadata_dump, related_contents, with_project, Contributions, Transformer,
};
use crate::errors::TransformError;

/// A single contribution to the document of the bundle's project.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectTransformer;

impl Transformer for ProjectTransformer {
    fn entity_type(&self) -> EntityType {
        EntityType::Projects
    }

    fn transform<'g>(&self, graph: &'g EntityGraph, deleted: bool) -> Contributions<'g> {
        with_project(graph, move |project| {
            iter::once_with(move || summary(graph, project, EntityType::Projects, deleted))
        })
    }
}

/// A single contribution to the document of the bundle itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleTransformer;

impl Transformer for BundleTransformer {
    fn entity_type(&self) -> EntityType {
        EntityType::Bundles
    }

    fn transform<'g>(&self, graph: &'g EntityGraph, deleted: bool) -> Contributions<'g> {
        with_project(graph, move |project| {
            iter::once_with(move || summary(graph, project, EntityType::Bundles, deleted))
        })
    }
}

fn summary(
    graph: &EntityGraph,
    project: &Project,
    entity_type: EntityType,
    deleted: bool,
) -> Result<Contribution, TransformError> {
    let roots = graph
        .specimens()
        .map(|specimen| specimen.core.document_id)
        .chain(graph.files().map(|file| file.document_id));
    let related = graph.lineage(roots);
    let samples = graph.ancestor_samples_of(graph.files().map(|file| file.document_id));
    let mut contents = related_contents(graph, &samples, &related, project)?;

    let entity_id = match entity_type {
        EntityType::Bundles => {
            contents.insert(RecordType::Metadata, metadata_dump::rows(graph));
            graph.uuid()
        }
        _ => project.document_id,
    };
    Ok(contribution(graph, entity_type, entity_id, contents, deleted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_indexer_shared::testing::BundleBuilder;

    fn bundle_graph() -> (EntityGraph, uuid::Uuid) {
        let mut builder = BundleBuilder::new();
        let project = builder.project("Atlas", &["A", "B"]);
        let donor = builder.donor("donor-1");
        let brain = builder.specimen("spec-1", Some("brain"));
        let liver = builder.specimen("spec-2", Some("liver"));
        let reads = builder.file("reads.fastq.gz", "fastq.gz", 100);
        builder.link(&[donor], &[brain, liver], &[]);
        builder.link(&[brain], &[reads], &[]);
        (EntityGraph::from_bundle(&builder.build()).unwrap(), project)
    }

    #[test]
    fn test_project_contribution_summarizes_bundle() {
        let (graph, project) = bundle_graph();

        let contributions: Vec<_> = ProjectTransformer
            .transform(&graph, false)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(contributions.len(), 1);
        let contribution = &contributions[0];
        assert_eq!(contribution.entity.entity_id, project);
        assert_eq!(contribution.contents[&RecordType::Specimens].len(), 2);
        assert_eq!(contribution.contents[&RecordType::Samples].len(), 1);
        assert_eq!(contribution.contents[&RecordType::Donors].len(), 1);
        assert_eq!(contribution.contents[&RecordType::Files].len(), 1);
        assert!(!contribution.contents.contains_key(&RecordType::Metadata));
    }

    #[test]
    fn test_bundle_contribution_carries_metadata_rows() {
        let (graph, _) = bundle_graph();

        let contributions: Vec<_> = BundleTransformer
            .transform(&graph, false)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(contributions.len(), 1);
        let contribution = &contributions[0];
        assert_eq!(contribution.entity.entity_id, graph.uuid());
        assert_eq!(contribution.entity.entity_type, EntityType::Bundles);
        let rows = &contribution.contents[&RecordType::Metadata];
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["file_name"], "reads.fastq.gz");
    }
}
