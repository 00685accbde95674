//! Embedding provider abstraction and implementations.
//!
//! The interface for turning text into fixed-length vectors, with a local
//! fastembed backend (the default) and an OpenAI API backend. Ingestion and
//! search both embed through this seam, which keeps the two sides in the
//! same embedding space and lets tests substitute deterministic stand-ins
//! for the model.

pub mod fastembed;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Network or API communication error
    #[error("API request failed: {0}")]
    ApiError(String),

    /// Invalid input text (e.g., empty)
    #[error("Invalid input text: {0}")]
    InvalidInput(String),

    /// Configuration error (e.g., missing API key, model init failure)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Other unexpected errors
    #[error("Unexpected error: {0}")]
    Other(String),
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Trait for text embedding providers.
///
/// Implementors map text to a fixed-dimensionality f32 vector,
/// deterministically for a given model version. The trait is async to
/// support API-backed providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// The input should already be passed through [`normalize_text`] so that
    /// queries and ingested documents embed identically.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Generate embeddings for multiple texts in a single batch.
    ///
    /// More efficient than repeated `embed` calls for providers that support
    /// batched inference; results are in input order.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Model name/identifier for this provider.
    fn model_name(&self) -> &str;
}

/// Normalizes text for consistent embedding generation.
///
/// Lowercases, trims, and collapses runs of whitespace to a single space.
/// Applied to document text at ingestion time and to queries at search time;
/// the two must match or relevance silently degrades.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
