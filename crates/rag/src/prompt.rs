use std::collections::BTreeSet;

use crate::index::Candidate;

const CANDIDATE_MARKER: &str = "---\n";
const ANSWER_CUE: &str = "\n\nAnswer:";

/// Render the instruction prompt from the first `top_k` candidates.
///
/// Earlier candidates have priority, so semantic hits outrank boosted ones
/// exactly as the retriever ordered them. Returns the prompt plus the
/// distinct metric names that actually made it into the body ("used
/// metrics"), sorted for determinism; metrics retrieved but cut off by
/// `top_k` are not in that set. Assembly never fails: with no candidates the
/// body is empty and the header's missing-information instruction carries
/// the answer.
pub fn build_prompt(
    user_query: &str,
    candidates: &[Candidate],
    top_k: usize,
) -> (String, Vec<String>) {
    let mut prompt = format!(
        "User asked: {user_query}\n\n\
         You are an assistant that explains how financial metrics were calculated. \
         Use the available lineage steps below (SQL and short descriptions). \
         Produce a clear step-by-step explanation in plain English. \
         If steps are missing, state what is missing. Cite which steps you used.\n\n"
    );
    let mut used_metrics = BTreeSet::new();
    for candidate in candidates.iter().take(top_k) {
        prompt.push_str(CANDIDATE_MARKER);
        prompt.push_str(&candidate.text);
        prompt.push('\n');
        if !candidate.metric.is_empty() {
            used_metrics.insert(candidate.metric.clone());
        }
    }
    prompt.push_str(ANSWER_CUE);
    (prompt, used_metrics.into_iter().collect())
}
