pub mod config;
pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use config::RetrievalConfig;
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use index::{Candidate, StepIndex};
pub use pipeline::{explain, Explanation, NO_BACKEND_MESSAGE};
pub use prompt::build_prompt;
pub use retriever::retrieve;

pub use linex_llm::{
    Attempt, Dispatcher, GenerationBackend, GenerationConfig, GenerationOutcome,
};
