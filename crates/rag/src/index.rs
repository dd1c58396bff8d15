use anyhow::Result;
use tracing::info;

use linex_core::{cosine_similarity, step_key, Lineage};

use crate::embedding::EmbeddingClient;

/// A retrieval hit surfaced to the prompt assembler. Fixed shape: identity,
/// verbatim document text, and the metric/step pair it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub text: String,
    pub metric: String,
    pub step_id: String,
}

struct IndexEntry {
    id: String,
    text: String,
    metric: String,
    step_id: String,
    vector: Vec<f32>,
}

impl IndexEntry {
    fn candidate(&self) -> Candidate {
        Candidate {
            id: self.id.clone(),
            text: self.text.clone(),
            metric: self.metric.clone(),
            step_id: self.step_id.clone(),
        }
    }
}

/// In-memory vector index over every step document in the corpus. Built once
/// at startup, owns its embedding client, and is read-only afterwards; a
/// brute-force cosine scan is exact (no approximation) and therefore
/// deterministic for a fixed index and query.
pub struct StepIndex {
    entries: Vec<IndexEntry>,
    embeddings: EmbeddingClient,
    min_score: Option<f32>,
}

impl StepIndex {
    /// Embeds one document per step. An embedding failure here is fatal to
    /// startup: retrieval is meaningless without the index.
    pub fn build(lineage: &Lineage, embeddings: EmbeddingClient) -> Result<Self> {
        let mut pending = Vec::with_capacity(lineage.step_count());
        let mut texts = Vec::with_capacity(lineage.step_count());
        for (name, metric) in lineage.iter() {
            for step in &metric.steps {
                let text = step.document(name);
                pending.push((step_key(name, &step.id), name.clone(), step.id.clone()));
                texts.push(text);
            }
        }
        let vectors = embeddings.embed_batch(&texts)?;
        let entries = pending
            .into_iter()
            .zip(texts)
            .zip(vectors)
            .map(|(((id, metric, step_id), text), vector)| IndexEntry {
                id,
                text,
                metric,
                step_id,
                vector,
            })
            .collect::<Vec<_>>();
        info!(documents = entries.len(), "built step index");
        Ok(Self {
            entries,
            embeddings,
            min_score: None,
        })
    }

    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Exact k-nearest-neighbor query by cosine similarity. Ties break on
    /// candidate identity so ordering is stable across runs. Without a
    /// configured floor every query returns up to `k` hits however poor the
    /// similarity; that recall/precision tradeoff is the caller's to manage.
    pub fn query(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        let query_vector = self.embeddings.embed(query)?;
        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&query_vector, &entry.vector), entry))
            .collect();
        if let Some(floor) = self.min_score {
            scored.retain(|(score, _)| *score >= floor);
        }
        scored.sort_by(|(a_score, a_entry), (b_score, b_entry)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_entry.id.cmp(&b_entry.id))
        });
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(_, entry)| entry.candidate())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
