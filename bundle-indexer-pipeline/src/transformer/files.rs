//! Contributions to file documents.

use bundle_indexer_shared::{EntityGraph, EntityType, RecordType};

use super::{contribution, records, related_contents, with_project, Contributions, Transformer};

/// One contribution per file, except internal chunks of array stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransformer;

impl Transformer for FileTransformer {
    fn entity_type(&self) -> EntityType {
        EntityType::Files
    }

    fn transform<'g>(&self, graph: &'g EntityGraph, deleted: bool) -> Contributions<'g> {
        with_project(graph, move |project| {
            graph.indexable_files().map(move |file| {
                let samples = graph.ancestor_samples(file.document_id);
                let related = graph.lineage([file.document_id]);
                let mut contents = related_contents(graph, &samples, &related, project)?;
                contents.insert(RecordType::Files, vec![records::file(file)]);
                Ok(contribution(
                    graph,
                    EntityType::Files,
                    file.document_id,
                    contents,
                    deleted,
                ))
            })
        })
    }
}
