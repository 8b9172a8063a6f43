use thiserror::Error;

/// Errors produced while loading reply data or calling the embedding API.
///
/// None of these escape [`HybridResolver::resolve`](crate::HybridResolver::resolve);
/// a failing stage simply yields no answer.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Embedding API returned no vectors")]
    EmptyEmbedding,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid reply data: {0}")]
    InvalidData(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReplyError>;
