use linex_core::sample::sample_lineage;
use linex_rag::{
    build_prompt, explain, retrieve, Attempt, Dispatcher, EmbeddingClient, GenerationBackend,
    RetrievalConfig, StepIndex, NO_BACKEND_MESSAGE,
};

struct CannedBackend;

impl GenerationBackend for CannedBackend {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn attempt(&self, prompt: &str) -> Attempt {
        assert!(prompt.contains("User asked:"));
        Attempt::Success("The metric is computed in three steps.".to_string())
    }
}

struct DownBackend;

impl GenerationBackend for DownBackend {
    fn name(&self) -> &'static str {
        "down"
    }

    fn attempt(&self, _prompt: &str) -> Attempt {
        Attempt::Unavailable("connection refused".to_string())
    }
}

#[test]
fn gross_margin_query_boosts_its_three_steps() {
    let lineage = sample_lineage();
    let index = StepIndex::build(&lineage, EmbeddingClient::hash()).unwrap();
    let query = "How was gross_margin_percentage_by_product computed?";

    let candidates = retrieve(&index, &lineage, query, 8).unwrap();
    let boosted: Vec<&str> = candidates[8..].iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
        boosted,
        [
            "gross_margin_percentage_by_product__g1",
            "gross_margin_percentage_by_product__g2",
            "gross_margin_percentage_by_product__g3",
        ]
    );

    let (_, used_metrics) = build_prompt(query, &candidates, 5);
    assert!(used_metrics
        .iter()
        .any(|metric| metric == "gross_margin_percentage_by_product"));
}

#[test]
fn explain_reports_all_retrieved_metrics() {
    let lineage = sample_lineage();
    let index = StepIndex::build(&lineage, EmbeddingClient::hash()).unwrap();
    let dispatcher = Dispatcher::new(vec![Box::new(CannedBackend)]);
    let config = RetrievalConfig::default();

    let explanation = explain(
        &index,
        &lineage,
        &dispatcher,
        &config,
        "How was total_revenue computed?",
    )
    .unwrap();
    assert_eq!(explanation.answer, "The metric is computed in three steps.");
    assert_eq!(explanation.backend, Some("canned"));
    assert!(explanation
        .referenced_metrics
        .iter()
        .any(|metric| metric == "total_revenue"));
    // Sorted and distinct.
    let mut sorted = explanation.referenced_metrics.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, explanation.referenced_metrics);
}

#[test]
fn no_backend_yields_fixed_message_and_empty_metrics() {
    let lineage = sample_lineage();
    let index = StepIndex::build(&lineage, EmbeddingClient::hash()).unwrap();
    let dispatcher = Dispatcher::new(vec![Box::new(DownBackend)]);
    let config = RetrievalConfig::default();

    let explanation = explain(&index, &lineage, &dispatcher, &config, "anything").unwrap();
    assert_eq!(explanation.answer, NO_BACKEND_MESSAGE);
    assert!(explanation.referenced_metrics.is_empty());
    assert_eq!(explanation.backend, None);
}

#[test]
fn empty_corpus_query_is_not_an_error() {
    let lineage = linex_core::Lineage::default();
    let index = StepIndex::build(&lineage, EmbeddingClient::hash()).unwrap();
    let candidates = retrieve(&index, &lineage, "anything at all", 8).unwrap();
    assert!(candidates.is_empty());

    let (prompt, used) = build_prompt("anything at all", &candidates, 5);
    assert!(used.is_empty());
    assert!(prompt.contains("anything at all"));
}
