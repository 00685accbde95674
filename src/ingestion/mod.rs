//! Ingestion pipeline module.
//!
//! The offline path from a document provider into the vector store: clean
//! the records, drop duplicate titles, embed `title + abstract` in batches,
//! and upsert vectors with metadata. The search path never runs any of this;
//! its only dependency is that the collection this pipeline fills uses the
//! same embedding space the query side embeds into, which both get from
//! sharing one [`EmbeddingProvider`] configuration.
//!
//! Re-running the pipeline is safe: point ids are derived from document
//! identifiers, so an already-ingested document is overwritten in place.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::embedding::{normalize_text, EmbeddingProvider};
use crate::models::Document;
use crate::provider::{DocumentProvider, ProviderError};
use crate::storage::VectorStore;

/// Documents per embedding/upsert batch by default.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Records with shorter abstracts are dropped as unembeddable noise.
const MIN_ABSTRACT_CHARS: usize = 20;

/// Abstracts are capped at this many characters before embedding/storage.
const MAX_ABSTRACT_CHARS: usize = 2000;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Embedding generation failed; aborts the run
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Fetching from the document provider failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Outcome counters for one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    /// Input documents seen
    pub total_processed: usize,

    /// Documents embedded and upserted
    pub inserted: usize,

    /// Documents dropped by cleaning or title deduplication
    pub skipped: usize,

    /// Documents lost to failed upsert batches
    pub failed: usize,
}

/// Ingestion pipeline over an embedding provider and a vector store.
pub struct IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: VectorStore,
{
    embedding_provider: E,
    store: S,
    batch_size: usize,
}

impl<E, S> IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: VectorStore,
{
    /// Create a pipeline. `batch_size` defaults to [`DEFAULT_BATCH_SIZE`]
    /// and is clamped to at least 1.
    pub fn new(embedding_provider: E, store: S, batch_size: Option<usize>) -> Self {
        Self {
            embedding_provider,
            store,
            batch_size: batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
        }
    }

    /// Normalize one raw record, or drop it.
    ///
    /// Trims title and abstract, rejects empty titles and abstracts below
    /// the minimum length, and caps overlong abstracts.
    pub fn clean(document: Document) -> Option<Document> {
        let title = document.title.trim();
        if title.is_empty() {
            return None;
        }

        let abstract_trimmed = document.abstract_text.trim();
        if abstract_trimmed.chars().count() < MIN_ABSTRACT_CHARS {
            return None;
        }

        let abstract_text = if abstract_trimmed.chars().count() > MAX_ABSTRACT_CHARS {
            abstract_trimmed.chars().take(MAX_ABSTRACT_CHARS).collect()
        } else {
            abstract_trimmed.to_string()
        };

        Some(Document {
            id: document.id,
            title: title.to_string(),
            abstract_text,
            year: document.year,
            source: document.source,
        })
    }

    /// The text a document is embedded from.
    fn embedding_text(document: &Document) -> String {
        normalize_text(&format!(
            "{} {}",
            document.title, document.abstract_text
        ))
    }

    /// Ingest a batch of documents.
    ///
    /// Verifies the collection (creating it if needed, rejecting a
    /// dimension mismatch), then cleans, dedupes by normalized title,
    /// embeds, and upserts in chunks of `batch_size`.
    ///
    /// An embedding failure aborts the run; a failed upsert chunk is
    /// counted and the run continues with the next chunk.
    pub async fn ingest(&self, documents: Vec<Document>) -> IngestResult<IngestionStats> {
        self.store
            .ensure_collection(self.embedding_provider.dimension())
            .await
            .map_err(|e| IngestError::Store(e.to_string()))?;

        let mut stats = IngestionStats::default();
        let mut seen_titles: HashSet<String> = HashSet::new();
        let mut pending: Vec<Document> = Vec::with_capacity(self.batch_size);

        for document in documents {
            stats.total_processed += 1;

            let Some(document) = Self::clean(document) else {
                stats.skipped += 1;
                continue;
            };

            if !seen_titles.insert(normalize_text(&document.title)) {
                stats.skipped += 1;
                continue;
            }

            pending.push(document);
            if pending.len() == self.batch_size {
                self.flush(&pending, &mut stats).await?;
                pending.clear();
            }
        }

        if !pending.is_empty() {
            self.flush(&pending, &mut stats).await?;
        }

        Ok(stats)
    }

    /// Ingest everything a provider has.
    pub async fn ingest_from_provider<P>(&self, provider: &P) -> IngestResult<IngestionStats>
    where
        P: DocumentProvider,
    {
        let documents = provider.fetch_documents().await?;
        debug!(
            provider = provider.name(),
            count = documents.len(),
            "fetched documents"
        );
        self.ingest(documents).await
    }

    async fn flush(&self, batch: &[Document], stats: &mut IngestionStats) -> IngestResult<()> {
        let texts: Vec<String> = batch.iter().map(Self::embedding_text).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let embeddings = self
            .embedding_provider
            .embed_batch(&text_refs)
            .await
            .map_err(|e| IngestError::Embedding(e.to_string()))?;

        match self.store.upsert(batch, &embeddings).await {
            Ok(()) => {
                stats.inserted += batch.len();
                debug!(batch = batch.len(), "upserted batch");
            }
            Err(e) => {
                stats.failed += batch.len();
                warn!(batch = batch.len(), error = %e, "upsert failed, continuing");
            }
        }

        Ok(())
    }
}
