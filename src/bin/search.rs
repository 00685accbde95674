//! Search CLI entry point.
//!
//! Queries the collection through the same engine the HTTP server uses,
//! without going over the network. Supports single-query and interactive
//! REPL modes with table or JSON output.
//!
//! # Examples
//!
//! Single query:
//! ```bash
//! search --query "neural networks"
//! ```
//!
//! JSON output, more results:
//! ```bash
//! search --query "adaptive signal processing" --format json --top-k 25
//! ```
//!
//! Interactive mode:
//! ```bash
//! search --interactive
//! ```

use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use techdoc_search::embedding::fastembed::FastEmbedProvider;
use techdoc_search::models::SearchResult;
use techdoc_search::query::{SearchEngine, SearchQuery, SemanticSearchEngine};
use techdoc_search::storage::qdrant::QdrantStore;

/// Output format for search results
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table
    Table,
    /// Machine-readable JSON
    Json,
}

/// Command-line client for the document search collection
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Search the document collection using semantic similarity",
    long_about = "Query the document collection using semantic search, directly against \
                  Qdrant and the local embedding model.

EXAMPLES:
  Single query:
    search --query \"neural networks\"

  JSON output, more results:
    search --query \"adaptive signal processing\" --format json --top-k 25

  Interactive mode:
    search --interactive"
)]
struct Args {
    /// Search query (required unless --interactive is set)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Number of results to return
    #[arg(long, value_name = "N", default_value = "10")]
    top_k: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

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
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

fn format_results_table(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("Source").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);

    for (idx, result) in results.iter().enumerate() {
        let year = result
            .document
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(format!("{}", idx + 1)),
            Cell::new(truncate_chars(&result.document.title, 60)),
            Cell::new(year),
            Cell::new(result.document.source.as_str()),
            Cell::new(format!("{:.4}", result.score)),
        ]);
    }

    table.to_string()
}

fn format_results_json(results: &[SearchResult]) -> Result<String> {
    serde_json::to_string_pretty(results).context("Failed to serialize results to JSON")
}

async fn run_query(
    engine: &dyn SearchEngine,
    text: &str,
    top_k: usize,
    format: &OutputFormat,
) -> Result<()> {
    let start = Instant::now();
    let query = SearchQuery::new(text.to_string(), Some(top_k));
    let results = engine
        .search(&query)
        .await
        .with_context(|| format!("Search failed for query: '{text}'"))?;
    let elapsed = start.elapsed();

    match format {
        OutputFormat::Table => {
            println!("{}", format_results_table(&results));
            println!(
                "\nFound {} results in {:.2}s",
                results.len(),
                elapsed.as_secs_f64()
            );
        }
        OutputFormat::Json => println!("{}", format_results_json(&results)?),
    }

    Ok(())
}

fn print_repl_help() {
    println!("Commands:");
    println!("  <query>         - Search the collection");
    println!("  /top N          - Set number of results to N");
    println!("  /format table   - Use table output format");
    println!("  /format json    - Use JSON output format");
    println!("  /help           - Show this help");
    println!("  Ctrl+D or Ctrl+C - Exit");
}

async fn run_interactive(
    engine: &dyn SearchEngine,
    mut top_k: usize,
    mut format: OutputFormat,
) -> Result<()> {
    println!("Interactive Document Search");
    print_repl_help();
    println!();

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;

    loop {
        match rl.readline("Search> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();

                if let Some(command) = line.strip_prefix('/') {
                    let parts: Vec<&str> = command.split_whitespace().collect();
                    match parts.as_slice() {
                        ["help"] => print_repl_help(),
                        ["top", n] => match n.parse::<usize>() {
                            Ok(n) if n > 0 => {
                                top_k = n;
                                println!("Set top-k to {top_k}");
                            }
                            _ => eprintln!("Invalid number: must be a positive integer"),
                        },
                        ["format", "table"] => {
                            format = OutputFormat::Table;
                            println!("Set output format to table");
                        }
                        ["format", "json"] => {
                            format = OutputFormat::Json;
                            println!("Set output format to JSON");
                        }
                        _ => eprintln!("Unknown command: /{command}. Type /help for options."),
                    }
                    continue;
                }

                if let Err(e) = run_query(engine, line, top_k, &format).await {
                    eprintln!("Error: {e:#}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Readline failure"),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    if args.query.is_none() && !args.interactive {
        anyhow::bail!("either --query or --interactive is required");
    }

    let embedding = FastEmbedProvider::new(None, args.cache_dir.clone())
        .context("Failed to initialize the embedding model")?;
    let store = QdrantStore::connect(&args.qdrant_url, args.collection.clone())
        .context("Failed to create Qdrant client")?;
    let engine = SemanticSearchEngine::new(embedding, store);

    if args.interactive {
        run_interactive(&engine, args.top_k, args.format).await
    } else {
        let query = args.query.as_deref().unwrap_or_default();
        run_query(&engine, query, args.top_k, &args.format).await
    }
}
