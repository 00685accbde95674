//! FastEmbed embedding provider implementation.
//!
//! Local embedding generation via the fastembed library. The default model
//! is `AllMiniLML6V2`, the all-MiniLM-L6-v2 sentence transformer the
//! ingested collection was built with. It produces 384-dimension vectors
//! without any API calls.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// FastEmbed-backed embedding provider.
///
/// The underlying `TextEmbedding` session requires `&mut` for inference, so
/// the provider wraps it in an async mutex; one instance is shared across
/// all concurrent requests.
#[derive(Clone)]
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    embedding_dimension: usize,
}

impl FastEmbedProvider {
    /// Create a provider for the given model, downloading or loading it from
    /// the cache directory.
    ///
    /// `model` defaults to `AllMiniLML6V2`; `cache_dir` defaults to
    /// fastembed's own cache location.
    pub fn new(model: Option<EmbeddingModel>, cache_dir: Option<String>) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(EmbeddingModel::AllMiniLML6V2);
        let model_name = format!("{model_type:?}");

        let embedding_dimension = match model_type {
            EmbeddingModel::AllMiniLML6V2 => 384,
            EmbeddingModel::BGESmallENV15 => 384,
            EmbeddingModel::ParaphraseMLMiniLML12V2 => 384,
            EmbeddingModel::BGEBaseENV15 => 768,
            EmbeddingModel::NomicEmbedTextV15 => 768,
            EmbeddingModel::BGELargeENV15 => 1024,
            _ => 384,
        };

        let mut init_options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(PathBuf::from(dir));
        }

        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            EmbeddingError::ConfigError(format!("Failed to initialize fastembed model: {e}"))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }

    /// Create a provider with the default model and cache directory.
    pub fn with_defaults() -> EmbeddingResult<Self> {
        Self::new(None, None)
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let mut model = self.model.lock().await;

        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::Other(format!("Embedding generation failed: {e}")))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Other("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        for text in texts {
            if text.trim().is_empty() {
                return Err(EmbeddingError::InvalidInput(
                    "All texts must be non-empty".to_string(),
                ));
            }
        }

        let mut model = self.model.lock().await;

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();
        let embeddings = model
            .embed(text_strings, None)
            .map_err(|e| EmbeddingError::Other(format!("Batch embedding failed: {e}")))?;

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests load the real model, which means a one-time download into
    // the fastembed cache. Run them with `cargo test -- --ignored`.

    fn create_test_provider() -> FastEmbedProvider {
        FastEmbedProvider::with_defaults().expect("failed to create default provider")
    }

    #[test]
    #[ignore = "downloads the embedding model"]
    fn test_default_provider_is_minilm_384() {
        let provider = create_test_provider();
        assert_eq!(provider.dimension(), 384);
        assert!(provider.model_name().contains("AllMiniLML6V2"));
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_single_text() {
        let provider = create_test_provider();
        let embedding = provider
            .embed("graph neural networks for molecule property prediction")
            .await
            .unwrap();

        assert_eq!(embedding.len(), provider.dimension());
        assert!(embedding.iter().all(|x| x.is_finite()));
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_is_deterministic() {
        let provider = create_test_provider();
        let a = provider.embed("determinism check").await.unwrap();
        let b = provider.embed("determinism check").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_batch_matches_single() {
        let provider = create_test_provider();
        let single = provider.embed("batch consistency").await.unwrap();
        let batch = provider.embed_batch(&["batch consistency"]).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(single, batch[0]);
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_empty_text_rejected() {
        let provider = create_test_provider();
        assert!(matches!(
            provider.embed("   \n\t ").await,
            Err(EmbeddingError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_batch_with_empty_text_rejected() {
        let provider = create_test_provider();
        let result = provider.embed_batch(&["fine", "", "also fine"]).await;
        assert!(matches!(result, Err(EmbeddingError::InvalidInput(_))));
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_batch_empty_input() {
        let provider = create_test_provider();
        let result = provider.embed_batch(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
