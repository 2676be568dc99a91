//! Search binary entry point.
//!
//! Opens a persisted hybrid index and runs a single query or an interactive REPL,
//! with table or JSON output.
//!
//! # Examples
//!
//! Single query with default settings:
//! ```bash
//! search --index-dir paper_index --query "neural networks"
//! ```
//!
//! Keyword-heavy ranking as JSON:
//! ```bash
//! search --query "transformers" --weight 0.3 --format json
//! ```
//!
//! Interactive mode:
//! ```bash
//! search --index-dir paper_index --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use paper_hybrid_search::{
    config::{EngineConfig, DEFAULT_HYBRID_WEIGHT, DEFAULT_MIN_SIMILARITY},
    embedding::{
        fastembed::FastEmbedProvider,
        hash::{HashEmbeddingProvider, DEFAULT_HASH_DIMENSION},
        EmbeddingProvider,
    },
    models::{IndexStats, RelevanceLevel, SearchResult},
    query::{SearchEngine, SearchQuery},
    storage::FileStorage,
    HybridIndex,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Index = HybridIndex<Box<dyn EmbeddingProvider>, FileStorage>;

/// Output format for search results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table with colored relevance levels
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Embedding provider type
#[derive(Debug, Clone, ValueEnum)]
enum EmbeddingProviderType {
    /// FastEmbed local ONNX model (downloaded on first use)
    FastEmbed,
    /// Deterministic feature hashing, no model required
    Hash,
}

/// Search binary CLI for querying the paper index
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Search papers with hybrid semantic and keyword ranking",
    long_about = "Query a persisted paper index. Dense similarity and TF-IDF keyword scores are \
                  fused with a tunable weight; with too small a corpus for a keyword model the \
                  ranking is semantic only.

EXAMPLES:
  Single query:
    search --index-dir paper_index --query \"neural networks\"

  Favour keyword matches, JSON output:
    search --query \"transformers\" --weight 0.3 --format json

  Interactive mode:
    search --index-dir paper_index --interactive

  Offline index built with the hash encoder:
    search --embedding-provider hash --query \"graph neural networks\""
)]
struct Args {
    /// Index directory
    #[arg(long, value_name = "DIR", env = "PAPER_INDEX_DIR", default_value = "paper_index")]
    index_dir: PathBuf,

    /// Search query (required for single-query mode, omitted in interactive mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Number of results to return
    #[arg(long, value_name = "N", default_value = "10")]
    top_k: usize,

    /// Weight of the semantic score in [0, 1]; 1.0 is dense-only ranking
    #[arg(long, value_name = "W", default_value_t = DEFAULT_HYBRID_WEIGHT)]
    weight: f32,

    /// Minimum final score
    #[arg(long, value_name = "S", default_value_t = DEFAULT_MIN_SIMILARITY)]
    min_similarity: f32,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Embedding provider the index was built with
    #[arg(long, value_enum, default_value = "fast-embed")]
    embedding_provider: EmbeddingProviderType,

    /// FastEmbed model identifier
    #[arg(long, value_name = "MODEL", env = "PAPER_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Vector dimension for the hash provider
    #[arg(long, value_name = "N", default_value_t = DEFAULT_HASH_DIMENSION)]
    dimension: usize,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

fn create_embedding_provider(args: &Args) -> Result<Box<dyn EmbeddingProvider>> {
    match args.embedding_provider {
        EmbeddingProviderType::FastEmbed => {
            let cache_dir = args
                .cache_dir
                .clone()
                .or_else(|| dirs::cache_dir().map(|p| p.join("fastembed")));
            let provider = FastEmbedProvider::new(args.embedding_model.as_deref(), cache_dir)
                .context("Failed to create FastEmbed provider")?;
            Ok(Box::new(provider))
        }
        EmbeddingProviderType::Hash => Ok(Box::new(HashEmbeddingProvider::new(args.dimension))),
    }
}

/// Truncate to `max` characters, appending an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Format results as a pretty table
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
        Cell::new("Authors").add_attribute(Attribute::Bold),
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("Relevance").add_attribute(Attribute::Bold),
        Cell::new("Semantic").add_attribute(Attribute::Bold),
        Cell::new("Keyword").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);

    for (idx, result) in results.iter().enumerate() {
        let authors = result
            .paper
            .authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let (relevance_str, color) = match result.relevance {
            RelevanceLevel::Identical => ("IDENTICAL", Color::Green),
            RelevanceLevel::HighlySimilar => ("HIGHLY_SIMILAR", Color::Cyan),
            RelevanceLevel::Similar => ("SIMILAR", Color::Yellow),
            RelevanceLevel::Relevant => ("RELEVANT", Color::White),
        };

        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(truncate(&result.paper.title, 60)),
            Cell::new(truncate(&authors, 40)),
            Cell::new(
                result
                    .paper
                    .publish_year
                    .map_or_else(|| "-".to_string(), |y| y.to_string()),
            ),
            Cell::new(relevance_str).fg(color),
            Cell::new(format!("{:.4}", result.semantic_score)),
            Cell::new(
                result
                    .keyword_score
                    .map_or_else(|| "-".to_string(), |s| format!("{:.4}", s)),
            ),
            Cell::new(format!("{:.4}", result.final_score)),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(results: &[SearchResult]) -> Result<String> {
    serde_json::to_string_pretty(results).context("Failed to serialize results to JSON")
}

fn print_results(results: &[SearchResult], format: OutputFormat, elapsed_secs: f64) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", format_results_table(results));
            let method = results
                .first()
                .map_or("-", |r| r.search_method.as_str());
            println!(
                "\nFound {} results in {:.2}s ({} search)",
                results.len(),
                elapsed_secs,
                method
            );
        }
        OutputFormat::Json => println!("{}", format_results_json(results)?),
    }
    Ok(())
}

/// Display detailed view of a single result
fn display_result_detail(result: &SearchResult, rank: usize) {
    let paper = &result.paper;
    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("Title: {}", paper.title);
    println!(
        "Authors: {}",
        paper
            .authors
            .iter()
            .map(|a| match &a.affiliation {
                Some(aff) => format!("{} ({})", a.name, aff),
                None => a.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    );
    if let Some(year) = paper.publish_year {
        println!("Year: {}", year);
    }
    if let Some(venue) = &paper.venue {
        println!("Venue: {}", venue);
    }
    if !paper.concepts.is_empty() {
        println!("Concepts: {}", paper.concepts.join(", "));
    }
    if !paper.keywords.is_empty() {
        println!("Keywords: {}", paper.keywords.join(", "));
    }
    if let Some(id) = &paper.external_id {
        println!("External id: {}", id);
    }
    println!("Relevance: {:?}", result.relevance);
    println!(
        "Scores: final {:.4}, semantic {:.4}, keyword {} ({})",
        result.final_score,
        result.semantic_score,
        result
            .keyword_score
            .map_or_else(|| "-".to_string(), |s| format!("{:.4}", s)),
        result.search_method
    );
    if !paper.abstract_text.is_empty() {
        println!("\nAbstract:\n{}", paper.abstract_text);
    }
    println!("{}", "═".repeat(80));
}

fn display_stats(stats: &IndexStats) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.add_row(vec!["Papers".to_string(), stats.corpus_size.to_string()]);
    table.add_row(vec!["Model".to_string(), stats.model_name.clone()]);
    table.add_row(vec!["Dimension".to_string(), stats.vector_dimension.to_string()]);
    table.add_row(vec![
        "Keyword search".to_string(),
        if stats.lexical_enabled { "enabled" } else { "disabled" }.to_string(),
    ]);
    table.add_row(vec![
        "Vocabulary".to_string(),
        stats.lexical_vocabulary_size.to_string(),
    ]);
    table.add_row(vec![
        "Memory (approx.)".to_string(),
        format!("{:.1} KiB", stats.approx_memory_bytes as f64 / 1024.0),
    ]);
    if let Some(err) = &stats.last_persist_error {
        table.add_row(vec!["Last persist error".to_string(), err.clone()]);
    }
    println!("{}", table);
}

fn print_help() {
    println!("Commands:");
    println!("  <query>          - Search for papers");
    println!("  /top N           - Set number of results to N");
    println!("  /weight W        - Set semantic weight (0.0 keyword only, 1.0 semantic only)");
    println!("  /min S           - Set minimum final score");
    println!("  /format table    - Use table output format");
    println!("  /format json     - Use JSON output format");
    println!("  /detail N        - Show full details for result rank N");
    println!("  /stats           - Show index statistics");
    println!("  /help            - Show this help");
    println!("  Ctrl+D or Ctrl+C - Exit");
}

/// Query settings adjustable from the REPL.
struct Settings {
    top_k: usize,
    weight: f32,
    min_similarity: f32,
    format: OutputFormat,
}

impl Settings {
    fn query(&self, text: &str) -> SearchQuery {
        SearchQuery::new(text, Some(self.top_k))
            .with_hybrid_weight(self.weight)
            .with_min_similarity(self.min_similarity)
    }
}

/// Run interactive REPL mode
async fn run_interactive(index: Index, mut settings: Settings) -> Result<()> {
    println!("Interactive Paper Search");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;
    let mut last_results: Vec<SearchResult> = Vec::new();

    loop {
        match rl.readline("Search> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match (parts[0], parts.get(1)) {
                        ("/help", _) => print_help(),
                        ("/top", Some(n)) => match n.parse::<usize>() {
                            Ok(n) if n > 0 => {
                                settings.top_k = n;
                                println!("Set top-k to {}", n);
                            }
                            _ => eprintln!("Invalid number: must be a positive integer"),
                        },
                        ("/weight", Some(w)) => match w.parse::<f32>() {
                            Ok(w) if (0.0..=1.0).contains(&w) => {
                                settings.weight = w;
                                println!("Set semantic weight to {}", w);
                            }
                            _ => eprintln!("Invalid weight: must be between 0.0 and 1.0"),
                        },
                        ("/min", Some(s)) => match s.parse::<f32>() {
                            Ok(s) if s.is_finite() => {
                                settings.min_similarity = s;
                                println!("Set minimum score to {}", s);
                            }
                            _ => eprintln!("Invalid score: must be a number"),
                        },
                        ("/format", Some(&"table")) => {
                            settings.format = OutputFormat::Table;
                            println!("Set output format to table");
                        }
                        ("/format", Some(&"json")) => {
                            settings.format = OutputFormat::Json;
                            println!("Set output format to JSON");
                        }
                        ("/format", _) => eprintln!("Usage: /format [table|json]"),
                        ("/detail", Some(n)) => match n.parse::<usize>() {
                            Ok(rank) if rank > 0 && rank <= last_results.len() => {
                                display_result_detail(&last_results[rank - 1], rank);
                            }
                            Ok(rank) if rank > last_results.len() => eprintln!(
                                "Rank {} out of range (last search had {} results)",
                                rank,
                                last_results.len()
                            ),
                            _ => eprintln!("Invalid rank: must be a positive integer"),
                        },
                        ("/stats", _) => display_stats(&index.stats().await),
                        ("/top" | "/weight" | "/min" | "/detail", None) => {
                            eprintln!("Missing argument. Type /help for usage.")
                        }
                        (cmd, _) => eprintln!(
                            "Unknown command: {}. Type /help for available commands.",
                            cmd
                        ),
                    }
                } else {
                    let start = Instant::now();
                    match index.execute(&settings.query(line)).await {
                        Ok(results) => {
                            let elapsed = start.elapsed().as_secs_f64();
                            if let Err(e) = print_results(&results, settings.format, elapsed) {
                                eprintln!("Error formatting results: {}", e);
                            }
                            last_results = results;
                        }
                        Err(e) => eprintln!("Search failed: {}", e),
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Run single-query mode
async fn run_single_query(index: Index, query: &str, settings: Settings) -> Result<()> {
    let start = Instant::now();
    let results = index
        .execute(&settings.query(query))
        .await
        .with_context(|| format!("Failed to execute search for query: '{}'", query))?;
    print_results(&results, settings.format, start.elapsed().as_secs_f64())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level);
    debug!("CLI arguments: {:?}", args);

    if !args.interactive && args.query.is_none() {
        anyhow::bail!(
            "Either --query or --interactive must be specified.\n\
             Use --help for usage information."
        );
    }
    if !(0.0..=1.0).contains(&args.weight) {
        anyhow::bail!("--weight must be between 0.0 and 1.0, got {}", args.weight);
    }
    if !args.index_dir.exists() {
        anyhow::bail!(
            "Index directory not found: {}\n\
             Please run the ingestion binary first to build the index.",
            args.index_dir.display()
        );
    }

    let provider = create_embedding_provider(&args)?;
    info!(
        "Embedding provider: {} (dimension {})",
        provider.model_name(),
        provider.dimension()
    );

    let config = EngineConfig::new(&args.index_dir, provider.model_name(), provider.dimension());
    let index = HybridIndex::open_dir(config, provider)
        .await
        .context("Failed to open index")?;

    let stats = index.stats().await;
    if stats.corpus_size == 0 {
        anyhow::bail!(
            "Index at {} is empty or was built with a different embedding model.\n\
             Please run the ingestion binary with the same provider first.",
            args.index_dir.display()
        );
    }
    info!(
        "Index contains {} papers (keyword search {})",
        stats.corpus_size,
        if stats.lexical_enabled { "enabled" } else { "disabled" }
    );

    let settings = Settings {
        top_k: args.top_k,
        weight: args.weight,
        min_similarity: args.min_similarity,
        format: args.format,
    };

    match &args.query {
        Some(query) if !args.interactive => run_single_query(index, query, settings).await,
        _ => run_interactive(index, settings).await,
    }
}
