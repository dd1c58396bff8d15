use std::collections::BTreeSet;

use anyhow::Result;
use tracing::debug;

use linex_core::Lineage;
use linex_llm::{Dispatcher, GenerationOutcome};

use crate::config::RetrievalConfig;
use crate::index::StepIndex;
use crate::prompt::build_prompt;
use crate::retriever::retrieve;

/// Shown in place of a generated answer when every backend is skipped or
/// unavailable.
pub const NO_BACKEND_MESSAGE: &str =
    "No generation backend is available. Install Ollama (https://ollama.ai) or set OPENAI_API_KEY.";

#[derive(Debug, Clone)]
pub struct Explanation {
    pub answer: String,
    /// Distinct metrics across the full retrieved candidate list, not just
    /// the slice that fit the prompt. Empty when no backend answered.
    pub referenced_metrics: Vec<String>,
    pub backend: Option<&'static str>,
}

/// The per-query pipeline shared by the CLI and the service: retrieve,
/// assemble the prompt, dispatch. Backend failures never surface as errors;
/// they collapse into the fixed no-backend message.
pub fn explain(
    index: &StepIndex,
    lineage: &Lineage,
    dispatcher: &Dispatcher,
    config: &RetrievalConfig,
    query: &str,
) -> Result<Explanation> {
    let candidates = retrieve(index, lineage, query, config.k)?;
    let (prompt, used_metrics) = build_prompt(query, &candidates, config.top_k);
    debug!(
        candidates = candidates.len(),
        used_metrics = used_metrics.len(),
        prompt_chars = prompt.len(),
        "assembled prompt"
    );
    match dispatcher.dispatch(&prompt) {
        GenerationOutcome::Generated { text, backend } => {
            let referenced: BTreeSet<String> = candidates
                .iter()
                .filter(|candidate| !candidate.metric.is_empty())
                .map(|candidate| candidate.metric.clone())
                .collect();
            Ok(Explanation {
                answer: text,
                referenced_metrics: referenced.into_iter().collect(),
                backend: Some(backend),
            })
        }
        GenerationOutcome::NoBackend => Ok(Explanation {
            answer: NO_BACKEND_MESSAGE.to_string(),
            referenced_metrics: Vec::new(),
            backend: None,
        }),
    }
}
