use std::env;

pub const DEFAULT_SEARCH_K: usize = 8;
pub const DEFAULT_PROMPT_TOP_K: usize = 5;

/// Retrieval knobs, environment-driven with typed defaults.
///
/// `min_score` is a similarity floor for the semantic leg. The index returns
/// up to `k` neighbors regardless of how poor the match is; setting
/// `LINEX_MIN_SCORE` filters near-zero hits instead of baking in a guessed
/// constant.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub k: usize,
    pub top_k: usize,
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_SEARCH_K,
            top_k: DEFAULT_PROMPT_TOP_K,
            min_score: None,
        }
    }
}

impl RetrievalConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            k: env::var("LINEX_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.k),
            top_k: env::var("LINEX_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.top_k),
            min_score: env::var("LINEX_MIN_SCORE")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}
