use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LineageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("lineage corpus not found: {0:?}")]
    CorpusNotFound(PathBuf),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LineageError>;

impl From<anyhow::Error> for LineageError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
