//! Contributions to cell suspension documents.

use bundle_indexer_shared::{EntityGraph, EntityType, RecordType};

use super::{contribution, records, related_contents, with_project, Contributions, Transformer};

/// One contribution per cell suspension. Besides its lineage a suspension
/// lists the data files derived from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellSuspensionTransformer;

impl Transformer for CellSuspensionTransformer {
    fn entity_type(&self) -> EntityType {
        EntityType::CellSuspensions
    }

    fn transform<'g>(&self, graph: &'g EntityGraph, deleted: bool) -> Contributions<'g> {
        with_project(graph, move |project| {
            graph.cell_suspensions().map(move |cell_suspension| {
                let id = cell_suspension.core.document_id;
                let samples = graph.ancestor_samples(id);
                let related = graph.lineage([id]).with_files(graph.descendant_files(id));
                let mut contents = related_contents(graph, &samples, &related, project)?;
                contents.insert(
                    RecordType::CellSuspensions,
                    vec![records::cell_suspension(graph, cell_suspension)],
                );
                Ok(contribution(
                    graph,
                    EntityType::CellSuspensions,
                    id,
                    contents,
                    deleted,
                ))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bundle_indexer_shared::testing::BundleBuilder;
    use serde_json::json;

    #[test]
    fn test_cell_suspension_contribution() {
        let mut builder = BundleBuilder::new();
        builder.project("Atlas", &["A"]);
        let specimen = builder.specimen("spec-1", Some("brain"));
        let cell_line = builder.cell_line("cl-1", Some("blood"));
        let suspension = builder.cell_suspension("cs-1", Some(1000));
        let reads = builder.file("reads.fastq.gz", "fastq.gz", 100);
        builder.link(&[specimen, cell_line], &[suspension], &[]);
        builder.link(&[suspension], &[reads], &[]);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let contributions: Vec<_> = CellSuspensionTransformer
            .transform(&graph, true)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(contributions.len(), 1);
        let contribution = &contributions[0];
        assert_eq!(contribution.entity.entity_type, EntityType::CellSuspensions);
        assert!(contribution.bundle_deleted);

        let record = &contribution.contents[&RecordType::CellSuspensions][0];
        assert_eq!(record["total_estimated_cells"], 1000);
        assert_eq!(record["organ"], json!(["blood", "brain"]));
        assert_eq!(record["organ_part"], json!([null, "cortex"]));
        assert_eq!(contribution.contents[&RecordType::Samples].len(), 2);
        assert_eq!(
            contribution.contents[&RecordType::Files][0]["document_id"],
            reads.to_string()
        );
    }
}
