//! Transformer module for the bundle indexer pipeline.
//!
//! Turns the entity graph of one bundle into contributions, one per target
//! entity. There is one transformer per entity type that gets a document.
//!
//! Transforming is a pure function of the graph. The returned iterator is
//! lazy: each contribution is computed when it is pulled, and calling
//! `transform` again starts over.

mod cell_suspensions;
mod files;
pub mod metadata_dump;
mod projects;
pub mod records;
mod samples;

use std::collections::BTreeMap;
use std::iter;

use bundle_indexer_shared::metadata::{Project, Sample};
use bundle_indexer_shared::{
    Contents, Contribution, EntityGraph, EntityReference, EntityType, RecordType, RelatedEntities,
};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::TransformError;

pub use cell_suspensions::CellSuspensionTransformer;
pub use files::FileTransformer;
pub use projects::{BundleTransformer, ProjectTransformer};
pub use samples::SampleTransformer;

/// Contributions of one transformer for one bundle.
pub type Contributions<'g> = Box<dyn Iterator<Item = Result<Contribution, TransformError>> + 'g>;

/// Computes the contributions of a bundle to the documents of one entity type.
pub trait Transformer: Send + Sync {
    /// The entity type of the documents this transformer contributes to.
    fn entity_type(&self) -> EntityType;

    /// Contributions of the bundle behind `graph`, flagged as deleted when the
    /// bundle is being removed.
    ///
    /// A bundle that does not belong to exactly one project yields a single
    /// error and nothing else.
    fn transform<'g>(&self, graph: &'g EntityGraph, deleted: bool) -> Contributions<'g>;
}

/// One transformer per entity type.
pub fn transformers() -> Vec<Box<dyn Transformer>> {
    vec![
        Box::new(FileTransformer),
        Box::new(CellSuspensionTransformer),
        Box::new(SampleTransformer),
        Box::new(ProjectTransformer),
        Box::new(BundleTransformer),
    ]
}

fn single_project(graph: &EntityGraph) -> Result<&Project, TransformError> {
    let mut projects = graph.projects();
    match (projects.next(), projects.next()) {
        (Some(project), None) => Ok(project),
        _ => Err(TransformError::project_count(
            graph.uuid(),
            graph.projects().count(),
        )),
    }
}

/// Run `roots` with the bundle's project, or yield the project error alone.
fn with_project<'g, I>(
    graph: &'g EntityGraph,
    roots: impl FnOnce(&'g Project) -> I,
) -> Contributions<'g>
where
    I: Iterator<Item = Result<Contribution, TransformError>> + 'g,
{
    match single_project(graph) {
        Ok(project) => Box::new(roots(project)),
        Err(e) => Box::new(iter::once(Err(e))),
    }
}

fn contribution(
    graph: &EntityGraph,
    entity_type: EntityType,
    entity_id: Uuid,
    contents: Contents,
    deleted: bool,
) -> Contribution {
    Contribution {
        entity: EntityReference::new(entity_type, entity_id),
        contents,
        bundle_uuid: graph.uuid(),
        bundle_version: graph.version().to_string(),
        bundle_deleted: deleted,
    }
}

/// Records of everything related to a root entity.
fn related_contents(
    graph: &EntityGraph,
    samples: &BTreeMap<Uuid, Sample<'_>>,
    related: &RelatedEntities<'_>,
    project: &Project,
) -> Result<Contents, TransformError> {
    let samples = samples
        .values()
        .map(|sample| records::sample(*sample))
        .collect::<Result<Vec<_>, _>>()?;
    let protocols = related
        .protocols
        .values()
        .map(|protocol| records::protocol(protocol))
        .collect::<Result<Vec<_>, _>>()?;

    let mut contents = Contents::new();
    contents.insert(RecordType::Samples, samples);
    contents.insert(
        RecordType::Specimens,
        related
            .specimens
            .values()
            .map(|s| Value::Object(records::specimen(s)))
            .collect(),
    );
    contents.insert(
        RecordType::CellSuspensions,
        related
            .cell_suspensions
            .values()
            .map(|cs| records::cell_suspension(graph, cs))
            .collect(),
    );
    contents.insert(
        RecordType::CellLines,
        related
            .cell_lines
            .values()
            .map(|cl| Value::Object(records::cell_line(cl)))
            .collect(),
    );
    contents.insert(
        RecordType::Donors,
        related.donors.values().map(|d| records::donor(d)).collect(),
    );
    contents.insert(
        RecordType::Organoids,
        related
            .organoids
            .values()
            .map(|o| Value::Object(records::organoid(o)))
            .collect(),
    );
    contents.insert(
        RecordType::Files,
        related.files.values().map(|f| records::file(f)).collect(),
    );
    contents.insert(RecordType::Protocols, protocols);
    contents.insert(RecordType::Projects, vec![records::project(project)]);
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_indexer_shared::testing::BundleBuilder;

    #[test]
    fn test_bundle_without_project_yields_single_error() {
        let mut builder = BundleBuilder::new();
        builder.file("reads.fastq.gz", "fastq.gz", 1);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        for transformer in transformers() {
            let results: Vec<_> = transformer.transform(&graph, false).collect();
            assert_eq!(results.len(), 1);
            assert!(matches!(
                results[0],
                Err(TransformError::ProjectCount { count: 0, .. })
            ));
        }
    }

    #[test]
    fn test_bundle_with_two_projects_is_rejected() {
        let mut builder = BundleBuilder::new();
        builder.project("One", &["A"]);
        builder.project("Two", &["B"]);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let results: Vec<_> = ProjectTransformer.transform(&graph, false).collect();
        assert_eq!(
            results,
            vec![Err(TransformError::project_count(graph.uuid(), 2))]
        );
    }

    #[test]
    fn test_transform_is_restartable() {
        let mut builder = BundleBuilder::new();
        builder.project("Atlas", &["A"]);
        builder.file("a.fastq.gz", "fastq.gz", 1);
        builder.file("b.fastq.gz", "fastq.gz", 2);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let first: Vec<_> = FileTransformer.transform(&graph, false).collect();
        let second: Vec<_> = FileTransformer.transform(&graph, false).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}
