//! Query processing and ranking module.
//!
//! The core search operation: validate the query, embed it with the same
//! model used at ingestion time, pull an oversampled candidate set from the
//! vector database, deduplicate by document identifier, and return the top-k
//! results in descending score order.
//!
//! # Usage
//!
//! ```rust,no_run
//! use techdoc_search::query::{SearchQuery, SemanticSearchEngine, SearchEngine};
//! use techdoc_search::embedding::fastembed::FastEmbedProvider;
//! use techdoc_search::storage::qdrant::QdrantStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let embedding = FastEmbedProvider::with_defaults()?;
//! let store = QdrantStore::connect("http://localhost:6334", "documents")?;
//! let engine = SemanticSearchEngine::new(embedding, store);
//!
//! let query = SearchQuery::new("federated learning".to_string(), Some(10));
//! for result in engine.search(&query).await? {
//!     println!("{:.3}  {}", result.score, result.document.title);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::embedding::{normalize_text, EmbeddingProvider};
use crate::models::SearchResult;
use crate::storage::VectorStore;

/// Default maximum number of results per query.
pub const DEFAULT_RESULT_LIMIT: usize = 50;

/// Candidates requested from the vector store per result slot, to absorb
/// losses from identifier deduplication.
const OVERSAMPLE_FACTOR: usize = 3;

/// Errors surfaced by the search operation.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Empty or whitespace-only query; rejected before any backend call
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The embedding model failed or is not loaded
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The vector database is unreachable or the collection is missing
    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Result type for search operations.
pub type SearchOpResult<T> = Result<T, SearchError>;

/// Search query parameters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Free-text query (normalized and embedded by the engine)
    pub query: String,

    /// Maximum number of results to return
    pub limit: usize,
}

impl SearchQuery {
    /// Create a new search query.
    ///
    /// `limit` defaults to [`DEFAULT_RESULT_LIMIT`] and is clamped to at
    /// least 1.
    pub fn new(query: String, limit: Option<usize>) -> Self {
        Self {
            query,
            limit: limit.unwrap_or(DEFAULT_RESULT_LIMIT).max(1),
        }
    }
}

/// Trait for search engines.
///
/// Object-safe so the HTTP layer can hold an `Arc<dyn SearchEngine>` and
/// tests can substitute deterministic implementations.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a search and return results ordered by descending score,
    /// with duplicate document identifiers removed.
    async fn search(&self, query: &SearchQuery) -> SearchOpResult<Vec<SearchResult>>;
}

/// The production search engine: an embedding provider in front of a vector
/// store.
///
/// Stateless per request. The two handles are process-wide shared resources,
/// read-only from this path.
pub struct SemanticSearchEngine<E, S>
where
    E: EmbeddingProvider,
    S: VectorStore,
{
    embedding_provider: E,
    store: S,
}

impl<E, S> SemanticSearchEngine<E, S>
where
    E: EmbeddingProvider,
    S: VectorStore,
{
    pub fn new(embedding_provider: E, store: S) -> Self {
        Self {
            embedding_provider,
            store,
        }
    }
}

#[async_trait]
impl<E, S> SearchEngine for SemanticSearchEngine<E, S>
where
    E: EmbeddingProvider,
    S: VectorStore,
{
    async fn search(&self, query: &SearchQuery) -> SearchOpResult<Vec<SearchResult>> {
        // Reject before touching the model or the database
        let trimmed = query.query.trim();
        if trimmed.is_empty() {
            return Err(SearchError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }

        let normalized = normalize_text(trimmed);
        let query_embedding = self
            .embedding_provider
            .embed(&normalized)
            .await
            .map_err(|e| SearchError::EmbeddingUnavailable(e.to_string()))?;

        // Oversample so deduplication losses still leave `limit` results
        let candidates = self
            .store
            .search(&query_embedding, query.limit * OVERSAMPLE_FACTOR)
            .await
            .map_err(|e| SearchError::BackendUnavailable(e.to_string()))?;

        // Deduplicate by document id, keeping the best-scoring occurrence
        let mut best: HashMap<String, SearchResult> = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            match best.entry(candidate.document.id.clone()) {
                Entry::Occupied(mut entry) => {
                    if candidate.score > entry.get().score {
                        entry.insert(candidate);
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(candidate);
                }
            }
        }

        let mut results: Vec<SearchResult> = best.into_values().collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(query.limit);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, EmbeddingResult};
    use crate::models::{Document, SourceCategory};
    use crate::storage::{StoreError, StoreResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // Mock embedding provider: fixed vectors per text, with failure injection
    #[derive(Clone)]
    struct MockEmbeddingProvider {
        vectors: HashMap<String, Vec<f32>>,
        default_vector: Vec<f32>,
        should_fail: bool,
        embed_calls: Arc<AtomicUsize>,
    }

    impl MockEmbeddingProvider {
        fn new() -> Self {
            Self {
                vectors: HashMap::new(),
                default_vector: vec![1.0, 0.0, 0.0],
                should_fail: false,
                embed_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(normalize_text(text), vector);
            self
        }

        fn with_failure() -> Self {
            Self {
                should_fail: true,
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.embed_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            self.embed_calls.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                return Err(EmbeddingError::ApiError("mock embed failure".to_string()));
            }
            Ok(self
                .vectors
                .get(text)
                .cloned()
                .unwrap_or_else(|| self.default_vector.clone()))
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            self.default_vector.len()
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    // Mock vector store: brute-force cosine over seeded points, so scores
    // behave like the real backend's
    #[derive(Clone)]
    struct MockVectorStore {
        points: Vec<(Document, Vec<f32>)>,
        should_fail: bool,
        search_calls: Arc<AtomicUsize>,
        last_limit: Arc<Mutex<Option<usize>>>,
    }

    impl MockVectorStore {
        fn new(points: Vec<(Document, Vec<f32>)>) -> Self {
            Self {
                points,
                should_fail: false,
                search_calls: Arc::new(AtomicUsize::new(0)),
                last_limit: Arc::new(Mutex::new(None)),
            }
        }

        fn unreachable() -> Self {
            Self {
                should_fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn calls(&self) -> usize {
            self.search_calls.load(Ordering::SeqCst)
        }

        fn last_limit(&self) -> Option<usize> {
            *self.last_limit.lock().unwrap()
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[async_trait]
    impl VectorStore for MockVectorStore {
        async fn ensure_collection(&self, _dimension: usize) -> StoreResult<()> {
            Ok(())
        }

        async fn upsert(
            &self,
            _documents: &[Document],
            _embeddings: &[Vec<f32>],
        ) -> StoreResult<()> {
            Ok(())
        }

        async fn search(
            &self,
            query_vector: &[f32],
            limit: usize,
        ) -> StoreResult<Vec<SearchResult>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_limit.lock().unwrap() = Some(limit);

            if self.should_fail {
                return Err(StoreError::Unavailable(
                    "mock store unreachable".to_string(),
                ));
            }

            let mut results: Vec<SearchResult> = self
                .points
                .iter()
                .map(|(doc, vector)| SearchResult::new(doc.clone(), cosine(query_vector, vector)))
                .collect();
            results.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            results.truncate(limit);
            Ok(results)
        }

        async fn count(&self) -> StoreResult<u64> {
            Ok(self.points.len() as u64)
        }
    }

    fn doc(id: &str, title: &str) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            abstract_text: format!("Abstract of {title}"),
            year: Some(2022),
            source: SourceCategory::Paper,
        }
    }

    fn engine(
        provider: MockEmbeddingProvider,
        store: MockVectorStore,
    ) -> SemanticSearchEngine<MockEmbeddingProvider, MockVectorStore> {
        SemanticSearchEngine::new(provider, store)
    }

    #[test]
    fn test_search_query_defaults() {
        let query = SearchQuery::new("test".to_string(), None);
        assert_eq!(query.limit, DEFAULT_RESULT_LIMIT);

        let zero = SearchQuery::new("test".to_string(), Some(0));
        assert_eq!(zero.limit, 1);
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_any_backend_call() {
        let provider = MockEmbeddingProvider::new();
        let store = MockVectorStore::new(vec![(doc("A", "A"), vec![1.0, 0.0, 0.0])]);
        let engine = engine(provider.clone(), store.clone());

        for query_text in ["", "   ", "\t\n"] {
            let query = SearchQuery::new(query_text.to_string(), Some(10));
            let result = engine.search(&query).await;
            assert!(matches!(result, Err(SearchError::InvalidQuery(_))));
        }

        assert_eq!(provider.calls(), 0);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_results_are_limited_and_distinct() {
        let points = (0..10)
            .map(|i| {
                (
                    doc(&format!("D{i}"), &format!("Doc {i}")),
                    vec![1.0, i as f32 * 0.1, 0.0],
                )
            })
            .collect();
        let engine = engine(MockEmbeddingProvider::new(), MockVectorStore::new(points));

        let query = SearchQuery::new("anything".to_string(), Some(4));
        let results = engine.search(&query).await.unwrap();

        assert_eq!(results.len(), 4);

        let mut seen = std::collections::HashSet::new();
        for result in &results {
            assert!(seen.insert(result.document.id.clone()), "duplicate id");
        }
    }

    #[tokio::test]
    async fn test_scores_are_non_increasing() {
        let points = vec![
            (doc("A", "Far"), vec![0.0, 1.0, 0.0]),
            (doc("B", "Near"), vec![1.0, 0.1, 0.0]),
            (doc("C", "Mid"), vec![0.7, 0.7, 0.0]),
        ];
        let engine = engine(MockEmbeddingProvider::new(), MockVectorStore::new(points));

        let query = SearchQuery::new("anything".to_string(), Some(10));
        let results = engine.search(&query).await.unwrap();

        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(results[0].document.id, "B");
    }

    #[tokio::test]
    async fn test_zero_candidates_is_empty_not_error() {
        let engine = engine(MockEmbeddingProvider::new(), MockVectorStore::new(Vec::new()));

        let query = SearchQuery::new("no matches".to_string(), Some(10));
        let results = engine.search(&query).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_backend_unavailable() {
        let engine = engine(MockEmbeddingProvider::new(), MockVectorStore::unreachable());

        let query = SearchQuery::new("anything".to_string(), Some(10));
        let result = engine.search(&query).await;
        assert!(matches!(result, Err(SearchError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_embedding_unavailable() {
        let store = MockVectorStore::new(vec![(doc("A", "A"), vec![1.0, 0.0, 0.0])]);
        let engine = engine(MockEmbeddingProvider::with_failure(), store.clone());

        let query = SearchQuery::new("anything".to_string(), Some(10));
        let result = engine.search(&query).await;

        assert!(matches!(result, Err(SearchError::EmbeddingUnavailable(_))));
        // the store must not be consulted when embedding fails
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_store_receives_oversampled_limit() {
        let store = MockVectorStore::new(Vec::new());
        let engine = engine(MockEmbeddingProvider::new(), store.clone());

        let query = SearchQuery::new("anything".to_string(), Some(10));
        engine.search(&query).await.unwrap();

        assert_eq!(store.last_limit(), Some(30));
    }

    #[tokio::test]
    async fn test_seeded_near_identical_match_scores_high() {
        // One record whose stored embedding nearly equals the query embedding
        let p1 = Document {
            id: "P1".to_string(),
            title: "ML Algorithms Review".to_string(),
            abstract_text: "A review of machine learning methods.".to_string(),
            year: Some(2020),
            source: SourceCategory::Paper,
        };
        let provider = MockEmbeddingProvider::new()
            .with_vector("machine learning algorithms", vec![1.0, 0.0, 0.0]);
        let store = MockVectorStore::new(vec![(p1, vec![0.99, 0.05, 0.0])]);
        let engine = engine(provider, store);

        let query = SearchQuery::new("machine learning algorithms".to_string(), None);
        let results = engine.search(&query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "P1");
        assert!(results[0].score > 0.5);
    }

    #[tokio::test]
    async fn test_duplicate_identifiers_keep_highest_score() {
        // Two points with the same id but different metadata, simulating a
        // corrupted duplicate in the collection
        let mut stale = doc("DUP", "Stale copy");
        stale.year = Some(2018);
        let fresh = doc("DUP", "Fresh copy");

        let points = vec![
            (stale, vec![0.2, 1.0, 0.0]),  // lower similarity to [1,0,0]
            (fresh, vec![0.95, 0.1, 0.0]), // higher similarity
            (doc("OTHER", "Other"), vec![0.5, 0.5, 0.0]),
        ];
        let engine = engine(MockEmbeddingProvider::new(), MockVectorStore::new(points));

        let query = SearchQuery::new("anything".to_string(), Some(10));
        let results = engine.search(&query).await.unwrap();

        let dups: Vec<_> = results
            .iter()
            .filter(|r| r.document.id == "DUP")
            .collect();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].document.title, "Fresh copy");
        assert_eq!(results[0].document.id, "DUP");
    }

    #[tokio::test]
    async fn test_query_is_normalized_before_embedding() {
        let provider = MockEmbeddingProvider::new()
            .with_vector("Quantum  Error\tCorrection", vec![0.0, 0.0, 1.0]);
        let store = MockVectorStore::new(vec![
            (doc("Q", "Quantum"), vec![0.0, 0.0, 1.0]),
            (doc("X", "Unrelated"), vec![1.0, 0.0, 0.0]),
        ]);
        let engine = engine(provider, store);

        // messy spacing and case must hit the same embedding as the clean form
        let query = SearchQuery::new("  Quantum  Error\tCorrection ".to_string(), Some(1));
        let results = engine.search(&query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "Q");
    }
}
