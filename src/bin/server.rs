//! HTTP server binary entry point.
//!
//! Loads the embedding model, connects to Qdrant, and serves the search API.
//! The model and the store connection are created once here and shared with
//! every request through the application state.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use techdoc_search::embedding::fastembed::FastEmbedProvider;
use techdoc_search::embedding::EmbeddingProvider;
use techdoc_search::query::SemanticSearchEngine;
use techdoc_search::server::{serve, AppState};
use techdoc_search::storage::qdrant::QdrantStore;
use techdoc_search::storage::VectorStore;

/// HTTP API server for the document search service
#[derive(Parser, Debug)]
#[command(
    name = "server",
    version,
    about = "Serve the semantic document search API",
    long_about = "Serve the semantic document search API.

EXAMPLES:
  Default local setup (Qdrant on localhost):
    server

  Bind publicly against a remote Qdrant:
    server --bind 0.0.0.0:8000 --qdrant-url http://qdrant.internal:6334

  Custom collection and model cache:
    server --collection documents_v2 --cache-dir /var/cache/fastembed"
)]
struct Args {
    /// Address to bind the HTTP listener to
    #[arg(long, value_name = "ADDR", default_value = "127.0.0.1:8000", env = "BIND_ADDR")]
    bind: SocketAddr,

    /// Qdrant gRPC endpoint
    #[arg(
        long,
        value_name = "URL",
        default_value = "http://localhost:6334",
        env = "QDRANT_URL"
    )]
    qdrant_url: String,

    /// Qdrant collection name
    #[arg(long, value_name = "NAME", default_value = techdoc_search::DEFAULT_COLLECTION)]
    collection: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<String>,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("loading embedding model");
    let embedding = FastEmbedProvider::new(None, args.cache_dir.clone())
        .context("Failed to initialize the embedding model")?;
    info!(
        model = embedding.model_name(),
        dimension = embedding.dimension(),
        "embedding model ready"
    );

    let store = Arc::new(
        QdrantStore::connect(&args.qdrant_url, args.collection.clone())
            .context("Failed to create Qdrant client")?,
    );

    // The collection is owned by the ingestion side; report its state but
    // start serving either way, surfacing backend errors per request.
    match store.count().await {
        Ok(documents) => info!(documents, collection = %args.collection, "collection ready"),
        Err(e) => warn!(
            collection = %args.collection,
            error = %e,
            "collection not reachable at startup; searches will fail until it is"
        ),
    }

    let engine = Arc::new(SemanticSearchEngine::new(embedding, store.clone()));
    let state = AppState {
        engine,
        store,
    };

    info!(addr = %args.bind, "starting HTTP server");
    serve(args.bind, state).await.context("Server exited with an error")?;

    Ok(())
}
