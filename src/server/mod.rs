//! HTTP server module.
//!
//! The network surface of the search service: a single `GET /search`
//! endpoint backed by the search engine, plus `GET /status` for operational
//! checks. The embedding model and vector store handles are created once at
//! startup and injected through [`AppState`]; handlers hold no other state.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::SearchResult;
use crate::query::{SearchEngine, SearchError, SearchQuery, DEFAULT_RESULT_LIMIT};
use crate::storage::VectorStore;

/// Abstracts longer than this are cut down for transport; the full text
/// stays in the collection.
const ABSTRACT_PREVIEW_CHARS: usize = 300;

/// Errors that can occur while running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared handles for request handling, initialized once at startup.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn SearchEngine>,
    pub store: Arc<dyn VectorStore>,
}

/// Query parameters for `GET /search`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Free-text query
    pub query: String,

    /// Requested number of results; capped at the configured maximum
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// One result row as serialized to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub year: Option<i32>,
    pub source: crate::models::SourceCategory,
    pub score: f32,
}

impl From<SearchResult> for SearchHit {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.document.id,
            title: result.document.title,
            abstract_text: preview(&result.document.abstract_text),
            year: result.document.year,
            source: result.document.source,
            score: result.score,
        }
    }
}

/// Response body for `GET /search`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponseBody {
    pub query: String,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

/// Response body for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
    pub documents: u64,
    pub version: String,
}

/// Error body returned for failed requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Wrapper mapping [`SearchError`] onto HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub SearchError);

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            SearchError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
            SearchError::EmbeddingUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable")
            }
            SearchError::BackendUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable")
            }
        };

        let body = ErrorBody {
            error: code.to_string(),
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// GET /search: embed the query, search the collection, return ranked hits.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponseBody>, ApiError> {
    let limit = params
        .top_k
        .unwrap_or(DEFAULT_RESULT_LIMIT)
        .min(DEFAULT_RESULT_LIMIT);

    let query = SearchQuery::new(params.query.clone(), Some(limit));
    let results = state.engine.search(&query).await?;

    let hits: Vec<SearchHit> = results.into_iter().map(SearchHit::from).collect();
    Ok(Json(SearchResponseBody {
        query: params.query,
        count: hits.len(),
        results: hits,
    }))
}

/// GET /status: liveness plus the collection's document count.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusBody>, ApiError> {
    let documents = state
        .store
        .count()
        .await
        .map_err(|e| ApiError(SearchError::BackendUnavailable(e.to_string())))?;

    Ok(Json(StatusBody {
        status: "ok".to_string(),
        documents,
        version: crate::VERSION.to_string(),
    }))
}

/// Build the application router.
///
/// CORS is permissive: the demo frontend is served from a different origin
/// during development.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/status", get(status))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ServerError> {
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!("listening on {addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Cut a string to at most [`ABSTRACT_PREVIEW_CHARS`] characters, appending
/// an ellipsis when something was removed. Character-based, so multi-byte
/// text never splits mid-codepoint.
fn preview(text: &str) -> String {
    if text.chars().count() <= ABSTRACT_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(ABSTRACT_PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, SourceCategory};
    use crate::query::SearchOpResult;
    use crate::storage::{StoreError, StoreResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    // Canned engine: returns a fixed outcome and records the limit it saw
    struct CannedEngine {
        outcome: Mutex<Option<SearchOpResult<Vec<SearchResult>>>>,
        seen_limit: Mutex<Option<usize>>,
    }

    impl CannedEngine {
        fn ok(results: Vec<SearchResult>) -> Self {
            Self {
                outcome: Mutex::new(Some(Ok(results))),
                seen_limit: Mutex::new(None),
            }
        }

        fn err(err: SearchError) -> Self {
            Self {
                outcome: Mutex::new(Some(Err(err))),
                seen_limit: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl SearchEngine for CannedEngine {
        async fn search(&self, query: &SearchQuery) -> SearchOpResult<Vec<SearchResult>> {
            *self.seen_limit.lock().unwrap() = Some(query.limit);
            self.outcome
                .lock()
                .unwrap()
                .take()
                .expect("engine called more than once")
        }
    }

    struct CannedStore {
        count: StoreResult<u64>,
    }

    #[async_trait]
    impl VectorStore for CannedStore {
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
            _query_vector: &[f32],
            _limit: usize,
        ) -> StoreResult<Vec<SearchResult>> {
            Ok(Vec::new())
        }

        async fn count(&self) -> StoreResult<u64> {
            match &self.count {
                Ok(n) => Ok(*n),
                Err(StoreError::Unavailable(msg)) => Err(StoreError::Unavailable(msg.clone())),
                Err(e) => Err(StoreError::Other(e.to_string())),
            }
        }
    }

    fn state_with(engine: CannedEngine, store: CannedStore) -> (AppState, Arc<CannedEngine>) {
        let engine = Arc::new(engine);
        let state = AppState {
            engine: engine.clone(),
            store: Arc::new(store),
        };
        (state, engine)
    }

    fn result(id: &str, score: f32, abstract_len: usize) -> SearchResult {
        SearchResult::new(
            Document {
                id: id.to_string(),
                title: format!("Title {id}"),
                abstract_text: "x".repeat(abstract_len),
                year: Some(2021),
                source: SourceCategory::Paper,
            },
            score,
        )
    }

    #[tokio::test]
    async fn test_search_returns_hits_with_previewed_abstracts() {
        let (state, _) = state_with(
            CannedEngine::ok(vec![result("A", 0.9, 400), result("B", 0.7, 100)]),
            CannedStore { count: Ok(0) },
        );

        let params = SearchParams {
            query: "transformers".to_string(),
            top_k: Some(10),
        };
        let Json(body) = search(State(state), Query(params)).await.unwrap();

        assert_eq!(body.query, "transformers");
        assert_eq!(body.count, 2);
        assert_eq!(body.results.len(), 2);
        // 400-char abstract is previewed to 300 chars + ellipsis
        assert_eq!(body.results[0].abstract_text.chars().count(), 303);
        assert!(body.results[0].abstract_text.ends_with("..."));
        // short abstract passes through untouched
        assert_eq!(body.results[1].abstract_text.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_search_caps_requested_top_k() {
        let (state, engine) = state_with(
            CannedEngine::ok(Vec::new()),
            CannedStore { count: Ok(0) },
        );

        let params = SearchParams {
            query: "q".to_string(),
            top_k: Some(500),
        };
        search(State(state), Query(params)).await.unwrap();

        assert_eq!(*engine.seen_limit.lock().unwrap(), Some(DEFAULT_RESULT_LIMIT));
    }

    #[tokio::test]
    async fn test_invalid_query_maps_to_400() {
        let (state, _) = state_with(
            CannedEngine::err(SearchError::InvalidQuery("query must not be empty".into())),
            CannedStore { count: Ok(0) },
        );

        let params = SearchParams {
            query: "   ".to_string(),
            top_k: None,
        };
        let err = search(State(state), Query(params)).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_errors_map_to_503() {
        for err in [
            SearchError::BackendUnavailable("qdrant down".into()),
            SearchError::EmbeddingUnavailable("model not loaded".into()),
        ] {
            let (state, _) = state_with(CannedEngine::err(err), CannedStore { count: Ok(0) });
            let params = SearchParams {
                query: "q".to_string(),
                top_k: None,
            };
            let err = search(State(state), Query(params)).await.unwrap_err();
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn test_status_reports_document_count() {
        let (state, _) = state_with(CannedEngine::ok(Vec::new()), CannedStore { count: Ok(1234) });

        let Json(body) = status(State(state)).await.unwrap();
        assert_eq!(body.status, "ok");
        assert_eq!(body.documents, 1234);
        assert_eq!(body.version, crate::VERSION);
    }

    #[tokio::test]
    async fn test_status_maps_store_failure_to_503() {
        let (state, _) = state_with(
            CannedEngine::ok(Vec::new()),
            CannedStore {
                count: Err(StoreError::Unavailable("no route".into())),
            },
        );

        let err = status(State(state)).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_preview_is_char_aware() {
        let short = "short abstract";
        assert_eq!(preview(short), short);

        let exact = "y".repeat(ABSTRACT_PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);

        // multi-byte characters must not split
        let long = "ß".repeat(ABSTRACT_PREVIEW_CHARS + 50);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), ABSTRACT_PREVIEW_CHARS + 3);
        assert!(cut.ends_with("..."));
    }
}
