//! Qdrant vector store implementation.
//!
//! Stores one point per document in a Qdrant collection: a 384-dimension
//! vector (cosine distance) plus the document metadata as the point payload.
//! Qdrant point ids must be integers or UUIDs, so the corpus identifier is
//! mapped to a deterministic UUIDv5 and kept verbatim in the payload; this
//! also makes re-ingestion overwrite instead of duplicate.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, vectors_config::Config, CountPointsBuilder, CreateCollectionBuilder, Distance,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use tracing::warn;
use uuid::Uuid;

use super::{StoreError, StoreResult, VectorStore};
use crate::models::{Document, SearchResult, SourceCategory};

/// Qdrant-backed vector store.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl QdrantStore {
    /// Connect to a Qdrant instance (gRPC endpoint, e.g. `http://localhost:6334`).
    ///
    /// The connection is lazy; errors surface on the first operation.
    pub fn connect(url: &str, collection: impl Into<String>) -> StoreResult<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    /// Deterministic Qdrant point id for a document identifier.
    fn point_id(doc_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, doc_id.as_bytes()).to_string()
    }

    fn payload_map(document: &Document) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("doc_id".to_string(), Value::from(document.id.clone()));
        map.insert("title".to_string(), Value::from(document.title.clone()));
        map.insert(
            "abstract".to_string(),
            Value::from(document.abstract_text.clone()),
        );
        if let Some(year) = document.year {
            map.insert("year".to_string(), Value::from(i64::from(year)));
        }
        map.insert("source".to_string(), Value::from(document.source.as_str()));
        map
    }

    /// Rebuild a document from a point payload. Returns `None` when required
    /// fields are missing or of the wrong type; such points are skipped by
    /// the search path rather than surfaced half-formed.
    fn document_from_payload(payload: &HashMap<String, Value>) -> Option<Document> {
        let id = payload_string(payload, "doc_id")?;
        let title = payload_string(payload, "title")?;
        let abstract_text = payload_string(payload, "abstract")?;
        let source = match payload_string(payload, "source")?.as_str() {
            "paper" => SourceCategory::Paper,
            "patent" => SourceCategory::Patent,
            _ => return None,
        };
        let year = payload_integer(payload, "year").and_then(|y| i32::try_from(y).ok());

        Some(Document {
            id,
            title,
            abstract_text,
            year,
            source,
        })
    }

    fn classify(err: QdrantError) -> StoreError {
        let msg = err.to_string();
        if msg.contains("Not found") || msg.contains("doesn't exist") {
            StoreError::CollectionMissing(msg)
        } else {
            StoreError::Unavailable(msg)
        }
    }

    /// Vector size of the existing collection, when it can be read from the
    /// collection info (single unnamed vector config only).
    async fn collection_dimension(&self) -> StoreResult<Option<u64>> {
        let info = self
            .client
            .collection_info(self.collection.as_str())
            .await
            .map_err(Self::classify)?;

        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                Config::Params(params) => Some(params.size),
                Config::ParamsMap(_) => None,
            });

        Ok(size)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dimension: usize) -> StoreResult<()> {
        let exists = self
            .client
            .collection_exists(self.collection.as_str())
            .await
            .map_err(Self::classify)?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(self.collection.as_str()).vectors_config(
                        VectorParamsBuilder::new(dimension as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(Self::classify)?;
            return Ok(());
        }

        if let Some(actual) = self.collection_dimension().await? {
            if actual != dimension as u64 {
                return Err(StoreError::DimensionMismatch {
                    expected: dimension,
                    actual: actual as usize,
                });
            }
        }

        Ok(())
    }

    async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> StoreResult<()> {
        if documents.len() != embeddings.len() {
            return Err(StoreError::Other(format!(
                "{} documents but {} embeddings",
                documents.len(),
                embeddings.len()
            )));
        }
        if documents.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = documents
            .iter()
            .zip(embeddings.iter())
            .map(|(document, embedding)| {
                PointStruct::new(
                    Self::point_id(&document.id),
                    embedding.clone(),
                    Payload::from(Self::payload_map(document)),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.as_str(), points).wait(true))
            .await
            .map_err(Self::classify)?;

        Ok(())
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> StoreResult<Vec<SearchResult>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.as_str(), query_vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(Self::classify)?;

        let mut results = Vec::with_capacity(response.result.len());
        for point in response.result {
            match Self::document_from_payload(&point.payload) {
                Some(document) => results.push(SearchResult::new(document, point.score)),
                None => warn!(
                    collection = %self.collection,
                    "skipping point with unreadable payload"
                ),
            }
        }

        Ok(results)
    }

    async fn count(&self) -> StoreResult<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(self.collection.as_str()).exact(true))
            .await
            .map_err(Self::classify)?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_integer(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i),
        _ => None,
    }
}
