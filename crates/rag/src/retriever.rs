use anyhow::Result;
use tracing::debug;

use linex_core::{normalize_text, step_key, Lineage};

use crate::index::{Candidate, StepIndex};

/// Semantic recall plus exact-name precision.
///
/// The semantic leg asks the index for the `k` nearest documents. The boost
/// leg appends every step of every metric whose normalized name occurs in
/// the normalized query, so naming a metric guarantees its full computation
/// chain is a candidate even when semantic search under-ranks parts of it.
///
/// Semantic hits precede boosted hits and nothing is deduplicated; the same
/// step may appear in both legs, and downstream consumers resolve that when
/// they need a distinct set. An empty result is a valid outcome, not an
/// error.
pub fn retrieve(
    index: &StepIndex,
    lineage: &Lineage,
    query: &str,
    k: usize,
) -> Result<Vec<Candidate>> {
    let normalized = normalize_text(query);
    let mut candidates = index.query(&normalized, k)?;
    let semantic_hits = candidates.len();
    for (name, metric) in lineage.iter() {
        let needle = normalize_text(name);
        if needle.is_empty() || !normalized.contains(&needle) {
            continue;
        }
        for step in &metric.steps {
            candidates.push(Candidate {
                id: step_key(name, &step.id),
                text: step.document(name),
                metric: name.clone(),
                step_id: step.id.clone(),
            });
        }
    }
    debug!(
        semantic = semantic_hits,
        boosted = candidates.len() - semantic_hits,
        "retrieved candidates"
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use linex_core::sample::sample_lineage;

    use crate::embedding::EmbeddingClient;

    use super::*;

    fn fixture() -> (StepIndex, Lineage) {
        let lineage = sample_lineage();
        let index = StepIndex::build(&lineage, EmbeddingClient::hash()).unwrap();
        (index, lineage)
    }

    #[test]
    fn naming_a_metric_boosts_all_its_steps() {
        let (index, lineage) = fixture();
        let candidates = retrieve(&index, &lineage, "explain total_revenue", 8).unwrap();
        assert!(candidates
            .iter()
            .any(|candidate| candidate.id == "total_revenue__t1"));
    }

    #[test]
    fn boost_covers_the_whole_computation_chain() {
        let (index, lineage) = fixture();
        let candidates = retrieve(
            &index,
            &lineage,
            "How was gross_margin_percentage_by_product computed?",
            8,
        )
        .unwrap();
        // Everything after the semantic leg came from boosting.
        let boosted: Vec<&Candidate> = candidates[8..].iter().collect();
        let ids: Vec<&str> = boosted.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "gross_margin_percentage_by_product__g1",
                "gross_margin_percentage_by_product__g2",
                "gross_margin_percentage_by_product__g3",
            ]
        );
    }

    #[test]
    fn semantic_hits_precede_boosted_hits() {
        let (index, lineage) = fixture();
        let candidates = retrieve(&index, &lineage, "customer_ltv", 3).unwrap();
        // 3 semantic followed by the 4 boosted customer_ltv steps.
        assert_eq!(candidates.len(), 7);
        assert!(candidates[3..]
            .iter()
            .all(|candidate| candidate.metric == "customer_ltv"));
        let boosted_ids: Vec<&str> = candidates[3..].iter().map(|c| c.step_id.as_str()).collect();
        assert_eq!(boosted_ids, ["c1", "c2", "c3", "c4"]);
    }

    #[test]
    fn duplicates_across_legs_are_preserved() {
        let (index, lineage) = fixture();
        // k covers the whole corpus, so each boosted step also appears in the
        // semantic leg. 13 semantic + 1 boosted.
        let candidates = retrieve(&index, &lineage, "total_revenue", 13).unwrap();
        assert_eq!(candidates.len(), 14);
        let dupes = candidates
            .iter()
            .filter(|candidate| candidate.id == "total_revenue__t1")
            .count();
        assert_eq!(dupes, 2);
    }

    #[test]
    fn name_matching_survives_case_and_separator_changes() {
        let (index, lineage) = fixture();
        let candidates = retrieve(&index, &lineage, "How was Net-Income 2023 derived?", 2).unwrap();
        let boosted: Vec<&str> = candidates[2..].iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            boosted,
            [
                "net_income_2023__n1",
                "net_income_2023__n2",
                "net_income_2023__n3",
            ]
        );
    }

    #[test]
    fn unrelated_query_still_returns_semantic_candidates() {
        let (index, lineage) = fixture();
        let candidates = retrieve(&index, &lineage, "what is the weather", 4).unwrap();
        assert_eq!(candidates.len(), 4);
    }
}
