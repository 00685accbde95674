//! Ingestion CLI entry point.
//!
//! Builds and updates the vector store in two separable steps: `fetch-*`
//! pulls document metadata from the data APIs into JSON files, `load`
//! embeds those files and upserts them into the Qdrant collection.
//!
//! # Examples
//!
//! Fetch both corpora, then load them:
//! ```bash
//! ingest fetch-papers --out data/papers.json
//! ingest fetch-patents --out data/patents.json --term "neural network"
//! ingest load --input data/papers.json --input data/patents.json
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use techdoc_search::embedding::fastembed::FastEmbedProvider;
use techdoc_search::embedding::openai::OpenAiEmbedding;
use techdoc_search::embedding::{EmbeddingProvider, EmbeddingResult};
use techdoc_search::ingestion::{IngestionPipeline, IngestionStats};
use techdoc_search::models::Document;
use techdoc_search::provider::json::JsonFileProvider;
use techdoc_search::provider::openalex::OpenAlexProvider;
use techdoc_search::provider::patentsview::PatentsViewProvider;
use techdoc_search::provider::DocumentProvider;
use techdoc_search::storage::qdrant::QdrantStore;

/// Search terms used for papers when none are given; breadth over depth so
/// the demo corpus spans domains.
const DEFAULT_PAPER_TERMS: [&str; 10] = [
    "machine learning",
    "artificial intelligence",
    "computer science",
    "engineering",
    "medicine",
    "biology",
    "physics",
    "chemistry",
    "mathematics",
    "data science",
];

/// Wrapper enum for embedding providers to allow dynamic dispatch
enum DynamicEmbeddingProvider {
    FastEmbed(FastEmbedProvider),
    OpenAi(OpenAiEmbedding),
}

#[async_trait::async_trait]
impl EmbeddingProvider for DynamicEmbeddingProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed(text).await,
            DynamicEmbeddingProvider::OpenAi(p) => p.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed_batch(texts).await,
            DynamicEmbeddingProvider::OpenAi(p) => p.embed_batch(texts).await,
        }
    }

    fn dimension(&self) -> usize {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.dimension(),
            DynamicEmbeddingProvider::OpenAi(p) => p.dimension(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.model_name(),
            DynamicEmbeddingProvider::OpenAi(p) => p.model_name(),
        }
    }
}

/// Embedding provider type
#[derive(Debug, Clone, ValueEnum)]
enum EmbeddingProviderType {
    /// FastEmbed local embedding provider (default, no API required)
    FastEmbed,
    /// OpenAI cloud-based embedding provider (requires OPENAI_API_KEY)
    OpenAi,
}

/// Ingestion CLI for building and updating the document search collection
#[derive(Parser, Debug)]
#[command(
    name = "ingest",
    version,
    about = "Fetch document metadata and load it into the vector store"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch research papers from OpenAlex into a JSON file
    FetchPapers {
        /// Output file
        #[arg(long, value_name = "FILE", default_value = "data/papers.json")]
        out: PathBuf,

        /// Search term; repeat for several (defaults to a broad built-in set)
        #[arg(long = "term", value_name = "TERM")]
        terms: Vec<String>,

        /// Maximum works fetched per term
        #[arg(long, value_name = "N", default_value = "1000")]
        max_per_term: usize,
    },

    /// Fetch patents from PatentsView into a JSON file
    FetchPatents {
        /// Output file
        #[arg(long, value_name = "FILE", default_value = "data/patents.json")]
        out: PathBuf,

        /// Title search term
        #[arg(long, value_name = "TERM", default_value = "machine learning")]
        term: String,

        /// Maximum patents fetched
        #[arg(long, value_name = "N", default_value = "1000")]
        max_results: usize,
    },

    /// Embed fetched JSON files and upsert them into the vector store
    Load {
        /// Input file; repeat to load several
        #[arg(long = "input", value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,

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

        /// Embedding provider to use
        #[arg(long, value_enum, default_value = "fast-embed")]
        embedding_provider: EmbeddingProviderType,

        /// Specific embedding model name (provider-dependent)
        #[arg(long, value_name = "MODEL")]
        embedding_model: Option<String>,

        /// Documents per embedding batch
        #[arg(long, value_name = "N", default_value = "100")]
        batch_size: usize,

        /// FastEmbed model cache directory
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<String>,
    },
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn create_embedding_provider(
    provider_type: &EmbeddingProviderType,
    model: Option<String>,
    cache_dir: Option<String>,
) -> Result<DynamicEmbeddingProvider> {
    match provider_type {
        EmbeddingProviderType::FastEmbed => {
            info!("initializing FastEmbed provider");
            let cache_dir = cache_dir.or_else(|| {
                dirs::cache_dir().map(|p| p.join("fastembed").to_string_lossy().to_string())
            });
            let provider = FastEmbedProvider::new(None, cache_dir)
                .context("Failed to initialize FastEmbed provider")?;
            info!(
                model = provider.model_name(),
                dimension = provider.dimension(),
                "FastEmbed provider ready"
            );
            Ok(DynamicEmbeddingProvider::FastEmbed(provider))
        }
        EmbeddingProviderType::OpenAi => {
            info!("initializing OpenAI embedding provider");
            let api_key = std::env::var("OPENAI_API_KEY").context(
                "OPENAI_API_KEY environment variable must be set when using the OpenAI provider",
            )?;
            let provider = OpenAiEmbedding::new(api_key, model);
            info!(
                model = provider.model_name(),
                dimension = provider.dimension(),
                "OpenAI provider ready"
            );
            Ok(DynamicEmbeddingProvider::OpenAi(provider))
        }
    }
}

fn fetch_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg} [{elapsed_precise}]")
            .expect("Invalid spinner template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(message);
    spinner
}

async fn write_documents(out: &PathBuf, documents: &[Document]) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create output directory {parent:?}"))?;
        }
    }

    let json = JsonFileProvider::to_json(documents)?;
    tokio::fs::write(out, json)
        .await
        .with_context(|| format!("Failed to write {out:?}"))?;

    println!("Wrote {} documents to {}", documents.len(), out.display());
    Ok(())
}

async fn run_fetch<P: DocumentProvider>(provider: P, out: &PathBuf) -> Result<()> {
    let spinner = fetch_spinner(format!("fetching from {}", provider.name()));
    let documents = provider
        .fetch_documents()
        .await
        .with_context(|| format!("Fetching from {} failed", provider.name()))?;
    spinner.finish_with_message(format!(
        "fetched {} documents from {}",
        documents.len(),
        provider.name()
    ));

    if documents.is_empty() {
        warn!("nothing fetched; not writing {out:?}");
        return Ok(());
    }

    write_documents(out, &documents).await
}

fn print_summary(stats: &IngestionStats, elapsed: std::time::Duration) {
    println!("\n╔════════════════════════════════════════╗");
    println!("║          Ingestion Completed           ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Total processed:      {:>16} ║", stats.total_processed);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Skipped:              {:>16} ║", stats.skipped);
    println!("║ Failed:               {:>16} ║", stats.failed);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    match args.command {
        Command::FetchPapers {
            out,
            terms,
            max_per_term,
        } => {
            let terms = if terms.is_empty() {
                DEFAULT_PAPER_TERMS.iter().map(|t| t.to_string()).collect()
            } else {
                terms
            };
            info!(terms = terms.len(), max_per_term, "fetching papers");
            run_fetch(OpenAlexProvider::new(terms, max_per_term), &out).await
        }

        Command::FetchPatents {
            out,
            term,
            max_results,
        } => {
            info!(%term, max_results, "fetching patents");
            run_fetch(PatentsViewProvider::new(term, max_results), &out).await
        }

        Command::Load {
            inputs,
            qdrant_url,
            collection,
            embedding_provider,
            embedding_model,
            batch_size,
            cache_dir,
        } => {
            let start = Instant::now();

            let embedding =
                create_embedding_provider(&embedding_provider, embedding_model, cache_dir)?;
            let store = QdrantStore::connect(&qdrant_url, collection.clone())
                .context("Failed to create Qdrant client")?;
            let pipeline = IngestionPipeline::new(embedding, store, Some(batch_size));

            let mut totals = IngestionStats::default();
            for input in &inputs {
                let provider = JsonFileProvider::from_file(input)
                    .await
                    .with_context(|| format!("Failed to load documents from {input:?}"))?;
                let count = provider.count_documents().await?;
                info!(input = %input.display(), count, "loading file");

                let spinner = fetch_spinner(format!(
                    "embedding and upserting {count} documents from {}",
                    input.display()
                ));
                let stats = pipeline
                    .ingest_from_provider(&provider)
                    .await
                    .with_context(|| format!("Ingestion failed for {input:?}"))?;
                spinner.finish_with_message(format!(
                    "{}: {} inserted, {} skipped, {} failed",
                    input.display(),
                    stats.inserted,
                    stats.skipped,
                    stats.failed
                ));

                totals.total_processed += stats.total_processed;
                totals.inserted += stats.inserted;
                totals.skipped += stats.skipped;
                totals.failed += stats.failed;
            }

            print_summary(&totals, start.elapsed());

            if totals.failed > 0 {
                warn!(
                    failed = totals.failed,
                    "some documents failed to load - check logs for details"
                );
            }

            Ok(())
        }
    }
}
