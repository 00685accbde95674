//! Document provider module.
//!
//! Sources of document metadata for the ingestion pipeline. The
//! [`DocumentProvider`] trait abstracts where records come from (the
//! OpenAlex works API, the PatentsView patents API, or a JSON file produced
//! by an earlier fetch), so the pipeline never couples to a specific source.
//!
//! Providers return documents without embeddings (the pipeline embeds), are
//! responsible for their own pagination and rate limiting, and do not need
//! to deduplicate (the pipeline does).

pub mod json;
pub mod openalex;
pub mod patentsview;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Document;

/// Errors that can occur when fetching documents from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The remote API rejected the request
    #[error("API error: {0}")]
    ApiError(String),

    /// Other provider-specific errors
    #[error("Provider error: {0}")]
    Other(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sourcing document metadata.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Fetch all available documents from this provider.
    async fn fetch_documents(&self) -> ProviderResult<Vec<Document>>;

    /// Total documents this provider would return.
    ///
    /// The default implementation fetches and counts; override when the
    /// source can answer cheaply.
    async fn count_documents(&self) -> ProviderResult<usize> {
        self.fetch_documents().await.map(|docs| docs.len())
    }

    /// Human-readable provider name for logging.
    fn name(&self) -> &str;
}
