//! Ingestion binary entry point.
//!
//! Reads paper records from a JSON file, embeds them, refits the keyword model
//! and writes the index snapshot to a directory.
//!
//! # Examples
//!
//! Build or extend an index:
//! ```bash
//! ingestion --input papers.json --index-dir paper_index
//! ```
//!
//! Rebuild from scratch with the offline hash encoder:
//! ```bash
//! ingestion --input papers.json --clear --embedding-provider hash
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use paper_hybrid_search::{
    config::{EngineConfig, DEFAULT_BATCH_SIZE},
    embedding::{
        fastembed::FastEmbedProvider,
        hash::{HashEmbeddingProvider, DEFAULT_HASH_DIMENSION},
        EmbeddingProvider,
    },
    ingestion::IngestionPipeline,
    provider::{json::JsonFilePaperProvider, PaperProvider},
    HybridIndex,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Embedding provider type
#[derive(Debug, Clone, ValueEnum)]
enum EmbeddingProviderType {
    /// FastEmbed local ONNX model (default, downloaded on first use)
    FastEmbed,
    /// Deterministic feature hashing, no model required
    Hash,
}

/// Ingestion CLI for building and updating the paper index
#[derive(Parser, Debug)]
#[command(
    name = "ingestion",
    version,
    about = "Build and update the hybrid paper index",
    long_about = "Ingest research paper records into a persistent hybrid index. Every run appends \
                  to the index in --index-dir, refits the keyword model over the whole corpus and \
                  rewrites the snapshot.

EXAMPLES:
  Build or extend an index:
    ingestion --input papers.json --index-dir paper_index

  Start over:
    ingestion --input papers.json --clear

  Offline encoder:
    ingestion --input papers.json --embedding-provider hash --dimension 384

  Skip titles already indexed, verbose logs:
    ingestion --input papers.json --skip-duplicates --log-level debug"
)]
struct IngestionArgs {
    /// Input JSON file containing paper records
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Index directory
    #[arg(long, value_name = "DIR", env = "PAPER_INDEX_DIR", default_value = "paper_index")]
    index_dir: PathBuf,

    /// Embedding provider to use
    #[arg(long, value_enum, default_value = "fast-embed")]
    embedding_provider: EmbeddingProviderType,

    /// FastEmbed model identifier
    #[arg(long, value_name = "MODEL", env = "PAPER_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Vector dimension for the hash provider
    #[arg(long, value_name = "N", default_value_t = DEFAULT_HASH_DIMENSION)]
    dimension: usize,

    /// Number of papers per embedding batch
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Skip papers whose normalized title is already indexed
    #[arg(long)]
    skip_duplicates: bool,

    /// Fail if the snapshot cannot be written
    #[arg(long)]
    strict: bool,

    /// Delete the existing index before ingesting
    #[arg(long)]
    clear: bool,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Create an embedding provider based on CLI arguments
fn create_embedding_provider(args: &IngestionArgs) -> Result<Box<dyn EmbeddingProvider>> {
    let provider: Box<dyn EmbeddingProvider> = match args.embedding_provider {
        EmbeddingProviderType::FastEmbed => {
            let cache_dir = args
                .cache_dir
                .clone()
                .or_else(|| dirs::cache_dir().map(|p| p.join("fastembed")));
            debug!("Using fastembed cache directory: {:?}", cache_dir);
            Box::new(
                FastEmbedProvider::new(args.embedding_model.as_deref(), cache_dir)
                    .context("Failed to initialize FastEmbed provider")?,
            )
        }
        EmbeddingProviderType::Hash => Box::new(HashEmbeddingProvider::new(args.dimension)),
    };

    info!(
        "Embedding provider initialized: model={}, dimension={}",
        provider.model_name(),
        provider.dimension()
    );
    Ok(provider)
}

fn create_spinner(total: usize) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner} {msg}")
            .context("Invalid progress template")?,
    );
    spinner.set_message(format!("Indexing {} papers...", total));
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = IngestionArgs::parse();
    init_logging(&args.log_level);

    info!("Starting paper ingestion");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {:?}", args.input);
    }

    let provider = create_embedding_provider(&args).context("Failed to create embedding provider")?;

    let mut config =
        EngineConfig::new(&args.index_dir, provider.model_name(), provider.dimension());
    config.batch_size = args.batch_size;
    config.skip_duplicate_titles = args.skip_duplicates;
    config.strict_persistence = args.strict;

    let index = HybridIndex::open_dir(config, provider)
        .await
        .with_context(|| format!("Failed to open index at {:?}", args.index_dir))?;

    if args.clear {
        index.clear().await.context("Failed to clear existing index")?;
        info!("Cleared existing index at {:?}", args.index_dir);
    }
    let initial_size = index.len().await;

    let papers = JsonFilePaperProvider::from_file(&args.input)
        .await
        .with_context(|| format!("Failed to load papers from {:?}", args.input))?;
    let paper_count = papers.count_papers().await?;
    info!("Found {} papers from {}", paper_count, papers.name());

    if paper_count == 0 {
        warn!("No papers found in input file");
        return Ok(());
    }

    let spinner = create_spinner(paper_count)?;
    let pipeline = IngestionPipeline::new(&index);
    let result = pipeline.ingest_from_provider(&papers).await;
    spinner.finish_and_clear();
    let stats = result.context("Failed to ingest papers")?;

    let index_stats = index.stats().await;
    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Ingestion Completed               ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Total processed:      {:>16} ║", stats.total_processed);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Duplicates skipped:   {:>16} ║", stats.duplicates_skipped);
    println!("║ Failed:               {:>16} ║", stats.failed);
    println!("║ Corpus size:          {:>16} ║", index_stats.corpus_size);
    println!("║ Keyword vocabulary:   {:>16} ║", index_stats.lexical_vocabulary_size);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");

    debug!(
        "Corpus grew from {} to {} papers",
        initial_size, index_stats.corpus_size
    );
    if stats.failed > 0 {
        warn!("{} papers failed to process - check logs for details", stats.failed);
    }
    if !index_stats.lexical_enabled {
        warn!("Keyword search is disabled: the corpus is too small to fit a vocabulary");
    }
    if let Some(err) = &index_stats.last_persist_error {
        warn!("Index snapshot was not fully written: {}", err);
    }

    info!("Ingestion completed");
    Ok(())
}
