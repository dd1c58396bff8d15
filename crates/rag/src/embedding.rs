use std::env;

use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use linex_core::{HashEmbedder, HashEmbedderConfig};

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

#[derive(Clone)]
pub enum EmbeddingProvider {
    Hash(HashEmbedder),
    OpenAi(OpenAiEmbeddingClient),
}

/// Turns text into vectors for the step index. The hash provider is the
/// default: local, deterministic, and always constructible. The OpenAI
/// provider needs `OPENAI_API_KEY`; a missing key fails construction, which
/// callers treat as startup-fatal since retrieval is meaningless without an
/// embedder.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: EmbeddingProvider,
}

impl EmbeddingClient {
    pub fn from_env() -> Result<Self> {
        let provider = env::var("LINEX_EMBEDDING_PROVIDER")
            .unwrap_or_else(|_| "hash".to_string())
            .to_lowercase();
        match provider.as_str() {
            "openai" => {
                let model = env::var("LINEX_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
                info!(%model, "using openai embeddings");
                Ok(Self {
                    provider: EmbeddingProvider::OpenAi(OpenAiEmbeddingClient::new(&model)?),
                })
            }
            "hash" => Ok(Self::hash_from_env()),
            other => Err(anyhow!("unknown embedding provider {other}")),
        }
    }

    pub fn hash() -> Self {
        Self {
            provider: EmbeddingProvider::Hash(HashEmbedder::new(HashEmbedderConfig::default())),
        }
    }

    fn hash_from_env() -> Self {
        let mut config = HashEmbedderConfig::default();
        if let Some(dims) = env::var("LINEX_EMBED_DIMENSIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.dimensions = dims;
        }
        Self {
            provider: EmbeddingProvider::Hash(HashEmbedder::new(config)),
        }
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        match &self.provider {
            EmbeddingProvider::Hash(embedder) => Ok(inputs
                .iter()
                .map(|text| embedder.embed_text(text))
                .collect()),
            EmbeddingProvider::OpenAi(client) => client.embed_batch(inputs),
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut output = self.embed_batch(std::slice::from_ref(&text.to_string()))?;
        output
            .pop()
            .ok_or_else(|| anyhow!("embedding backend returned no vector"))
    }
}

#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    http: Client,
    model: String,
    api_key: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(model: &str) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY is required for openai embeddings"))?;
        Ok(Self {
            http: Client::new(),
            model: model.to_string(),
            api_key,
        })
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let payload = json!({
            "model": self.model,
            "input": inputs,
        });
        let response = self
            .http
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "openai embeddings request failed: {}",
                response.status()
            ));
        }
        let parsed: EmbeddingResponse = response.json()?;
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
