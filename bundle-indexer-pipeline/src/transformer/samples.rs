//! Contributions to sample documents.

use std::collections::BTreeMap;

use bundle_indexer_shared::{EntityGraph, EntityType, RecordType};

use super::{contribution, records, related_contents, with_project, Contributions, Transformer};

/// One contribution per sample that is the nearest sample ancestor of at
/// least one file of the bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleTransformer;

impl Transformer for SampleTransformer {
    fn entity_type(&self) -> EntityType {
        EntityType::Samples
    }

    fn transform<'g>(&self, graph: &'g EntityGraph, deleted: bool) -> Contributions<'g> {
        with_project(graph, move |project| {
            let samples = graph.ancestor_samples_of(graph.files().map(|file| file.document_id));
            samples.into_iter().map(move |(id, sample)| {
                let related = graph.lineage([id]).with_files(graph.descendant_files(id));
                let own = BTreeMap::from([(id, sample)]);
                let mut contents = related_contents(graph, &own, &related, project)?;
                contents.insert(RecordType::Samples, vec![records::sample(sample)?]);
                Ok(contribution(
                    graph,
                    EntityType::Samples,
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

    #[test]
    fn test_one_contribution_per_ancestor_sample() {
        let mut builder = BundleBuilder::new();
        builder.project("Atlas", &["A"]);
        let donor = builder.donor("donor-1");
        let specimen = builder.specimen("spec-1", Some("liver"));
        let organoid = builder.organoid("org-1", "kidney", "nephron");
        let left = builder.file("left.fastq.gz", "fastq.gz", 1);
        let right = builder.file("right.fastq.gz", "fastq.gz", 2);
        let both = builder.file("both.bam", "bam", 3);
        builder.link(&[donor], &[specimen], &[]);
        builder.link(&[specimen], &[left, both], &[]);
        builder.link(&[organoid], &[right, both], &[]);
        let graph = EntityGraph::from_bundle(&builder.build()).unwrap();

        let contributions: Vec<_> = SampleTransformer
            .transform(&graph, false)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(contributions.len(), 2);
        let liver = contributions
            .iter()
            .find(|c| c.entity.entity_id == specimen)
            .unwrap();
        assert_eq!(liver.contents[&RecordType::Samples].len(), 1);
        assert_eq!(liver.contents[&RecordType::Samples][0]["entity_type"], "specimens");
        assert_eq!(liver.contents[&RecordType::Donors].len(), 1);
        assert_eq!(liver.contents[&RecordType::Files].len(), 2);

        let kidney = contributions
            .iter()
            .find(|c| c.entity.entity_id == organoid)
            .unwrap();
        assert_eq!(kidney.contents[&RecordType::Samples][0]["effective_organ"], "kidney");
        assert!(kidney.contents[&RecordType::Donors].is_empty());
    }
}
