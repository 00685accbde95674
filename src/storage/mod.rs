//! Vector store abstraction and implementations.
//!
//! This module defines the narrow interface the rest of the crate uses to
//! talk to the external vector database: create/verify the collection,
//! upsert vectors with their document metadata, and run similarity search.
//! The abstraction keeps the search operation testable with deterministic
//! stand-ins and leaves index construction entirely to the backing service.

pub mod qdrant;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Document, SearchResult};

/// Errors that can occur during vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The vector database could not be reached
    #[error("Vector database unavailable: {0}")]
    Unavailable(String),

    /// The collection does not exist
    #[error("Collection missing: {0}")]
    CollectionMissing(String),

    /// The collection was built for a different embedding dimension
    #[error("Embedding dimension mismatch: collection has {actual}, provider produces {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Other unexpected errors
    #[error("Vector store error: {0}")]
    Other(String),
}

/// Result type for vector store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for vector store backends.
///
/// Each stored point couples one embedding vector with the full metadata of
/// the document it was computed from, so search candidates come back with
/// their metadata resolved and no second lookup is needed.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist, and verify that an
    /// existing collection matches the given embedding dimension.
    ///
    /// Idempotent; called by the ingestion pipeline before writing.
    async fn ensure_collection(&self, dimension: usize) -> StoreResult<()>;

    /// Upsert documents with their embedding vectors.
    ///
    /// `documents` and `embeddings` are parallel slices. Re-upserting a
    /// document id replaces its previous vector and metadata.
    async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> StoreResult<()>;

    /// Similarity search: the `limit` nearest stored vectors, as search
    /// results ordered by descending similarity.
    ///
    /// May return fewer than `limit` results, or duplicates of the same
    /// document id if the collection holds corrupt duplicates; callers that
    /// need distinct documents deduplicate downstream.
    async fn search(&self, query_vector: &[f32], limit: usize) -> StoreResult<Vec<SearchResult>>;

    /// Number of points in the collection.
    async fn count(&self) -> StoreResult<u64>;
}

// The store handle is shared between the search engine and the HTTP state;
// delegate through Arc so one connection serves both.
#[async_trait]
impl<T> VectorStore for std::sync::Arc<T>
where
    T: VectorStore + ?Sized,
{
    async fn ensure_collection(&self, dimension: usize) -> StoreResult<()> {
        (**self).ensure_collection(dimension).await
    }

    async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> StoreResult<()> {
        (**self).upsert(documents, embeddings).await
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> StoreResult<Vec<SearchResult>> {
        (**self).search(query_vector, limit).await
    }

    async fn count(&self) -> StoreResult<u64> {
        (**self).count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = StoreError::DimensionMismatch {
            expected: 384,
            actual: 1536,
        };
        let msg = err.to_string();
        assert!(msg.contains("384"));
        assert!(msg.contains("1536"));
    }
}
