//! Semantic search over research papers and patents.
//!
//! This library backs a small full-stack search application: document
//! metadata is pulled from the OpenAlex and PatentsView APIs, embedded with a
//! pretrained sentence-embedding model, and stored in a Qdrant collection.
//! A single HTTP endpoint answers free-text queries with ranked results.
//!
//! # Architecture
//!
//! - **models**: Core data structures (Document, SearchResult)
//! - **embedding**: Text embedding generation and normalization
//! - **storage**: Vector database persistence and similarity search
//! - **query**: The search operation (embed, search, dedupe, rank)
//! - **provider**: Document metadata sources (OpenAlex, PatentsView, JSON)
//! - **ingestion**: Offline pipeline from providers into the vector store
//! - **server**: HTTP API
//!
//! # Workflow
//!
//! ## Offline Ingestion
//!
//! 1. Fetch paper and patent metadata from the data APIs
//! 2. Clean records and drop duplicate titles
//! 3. Embed `title + abstract` text in batches
//! 4. Upsert vectors and metadata into the Qdrant collection
//!
//! ## Online Search
//!
//! 1. Receive a free-text query over HTTP
//! 2. Normalize and embed the query text
//! 3. Retrieve an oversampled candidate set from the vector database
//! 4. Deduplicate by document identifier, keeping the best score
//! 5. Return the top-k results, ranked by descending similarity
//!
//! # Example
//!
//! ```ignore
//! use techdoc_search::{
//!     embedding::fastembed::FastEmbedProvider,
//!     storage::qdrant::QdrantStore,
//!     query::{SearchQuery, SemanticSearchEngine, SearchEngine},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let embedding = FastEmbedProvider::with_defaults()?;
//!     let store = QdrantStore::connect("http://localhost:6334", "documents")?;
//!     let engine = SemanticSearchEngine::new(embedding, store);
//!
//!     let query = SearchQuery::new("machine learning algorithms".to_string(), None);
//!     for result in engine.search(&query).await? {
//!         println!("{:.3}  {}", result.score, result.document.title);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod embedding;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod query;
pub mod server;
pub mod storage;

// Re-export commonly used types at the crate root
pub use embedding::EmbeddingProvider;
pub use models::{Document, SearchResult, SourceCategory};
pub use query::{SearchEngine, SearchQuery, SemanticSearchEngine};
pub use storage::VectorStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model name (fastembed's all-MiniLM-L6-v2)
pub const DEFAULT_EMBEDDING_MODEL: &str = "AllMiniLML6V2";

/// Embedding dimension of the default model
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Default Qdrant collection name
pub const DEFAULT_COLLECTION: &str = "documents";
