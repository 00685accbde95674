//! OpenAI embedding provider implementation.
//!
//! API-backed alternative to the local fastembed provider. Note that the
//! OpenAI models embed into a different space (and dimension) than MiniLM;
//! a collection must be ingested and searched with the same provider.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// OpenAI embeddings API provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    api_key: String,
    model: String,
    embedding_dimension: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding provider.
    ///
    /// `model` defaults to `text-embedding-3-small` (1536 dimensions).
    pub fn new(api_key: String, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".to_string());
        let embedding_dimension = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };

        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            embedding_dimension,
        }
    }

    async fn request_embeddings(&self, inputs: Vec<&str>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let expected = inputs.len();
        let body = EmbeddingsRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiError(format!(
                "OpenAI API returned {status}: {detail}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::ApiError(format!("Malformed response: {e}")))?;

        if parsed.data.len() != expected {
            return Err(EmbeddingError::ApiError(format!(
                "Expected {expected} embeddings, got {}",
                parsed.data.len()
            )));
        }

        // The API documents data as index-ordered; sort anyway
        let mut data = parsed.data;
        data.sort_by_key(|o| o.index);

        Ok(data.into_iter().map(|o| o.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        self.request_embeddings(vec![text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::ApiError("Empty embedding response".to_string()))
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

        self.request_embeddings(texts.to_vec()).await
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
