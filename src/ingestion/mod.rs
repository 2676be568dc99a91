//! Ingestion pipeline module.
//!
//! Validates incoming paper records, synthesizes their index text and feeds them
//! into a [`HybridIndex`]. Encoding, insertion, lexical refit and persistence are
//! performed by [`HybridIndex::add_documents`]; this module owns the per-paper
//! preparation and the provider-driven entry point used by the `ingestion` binary.
//!
//! # Usage
//!
//! ```ignore
//! use paper_hybrid_search::ingestion::IngestionPipeline;
//! use paper_hybrid_search::provider::json::JsonFilePaperProvider;
//!
//! let index = HybridIndex::open_dir(config, provider).await?;
//! let pipeline = IngestionPipeline::new(&index);
//!
//! let papers = JsonFilePaperProvider::from_file("new_papers.json").await?;
//! let stats = pipeline.ingest_from_provider(&papers).await?;
//! println!("Inserted: {}, Duplicates: {}", stats.inserted, stats.duplicates_skipped);
//! ```

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::embedding::EmbeddingProvider;
use crate::engine::{EngineError, HybridIndex};
use crate::models::{Author, Paper};
use crate::provider::{PaperProvider, ProviderError};
use crate::storage::IndexStorage;
use crate::text::synthesize_index_text;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Record failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider operation failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The engine rejected the batch as a whole
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Statistics from an ingestion run.
///
/// This struct tracks the outcomes of processing a batch of papers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionStats {
    /// Total number of input papers processed
    pub total_processed: usize,

    /// Number of papers successfully inserted
    pub inserted: usize,

    /// Number of papers skipped due to deduplication
    pub duplicates_skipped: usize,

    /// Number of papers that failed validation, encoding or insertion
    pub failed: usize,
}

impl IngestionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful insertion.
    pub fn record_inserted(&mut self) {
        self.total_processed += 1;
        self.inserted += 1;
    }

    /// Record a duplicate that was skipped.
    pub fn record_duplicate(&mut self) {
        self.total_processed += 1;
        self.duplicates_skipped += 1;
    }

    /// Record a failed processing attempt.
    pub fn record_failed(&mut self) {
        self.total_processed += 1;
        self.failed += 1;
    }
}

fn trimmed_nonempty(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Validate and normalize a caller-supplied paper.
///
/// The title is required. String fields are trimmed, empty list entries are
/// dropped, any caller-supplied `vector_id` is discarded and `index_text` is
/// synthesized from the cleaned record.
///
/// # Errors
/// Returns `IngestionError::InvalidInput` if the title is empty.
pub fn prepare_paper(mut paper: Paper) -> IngestionResult<Paper> {
    paper.title = paper.title.trim().to_string();
    if paper.title.is_empty() {
        return Err(IngestionError::InvalidInput(
            "paper title is required".to_string(),
        ));
    }

    paper.abstract_text = paper.abstract_text.trim().to_string();
    paper.authors = paper
        .authors
        .into_iter()
        .filter_map(|author| {
            let name = author.name.trim();
            (!name.is_empty()).then(|| Author {
                name: name.to_string(),
                affiliation: author
                    .affiliation
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty()),
            })
        })
        .collect();
    paper.concepts = trimmed_nonempty(paper.concepts);
    paper.keywords = trimmed_nonempty(paper.keywords);
    paper.venue = paper
        .venue
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    paper.vector_id = None;
    paper.index_text = Some(synthesize_index_text(&paper));
    Ok(paper)
}

/// Ingestion pipeline coordinator.
///
/// Borrows an open index and pulls papers from providers into it.
pub struct IngestionPipeline<'a, E, S>
where
    E: EmbeddingProvider,
    S: IndexStorage,
{
    index: &'a HybridIndex<E, S>,
}

impl<'a, E, S> IngestionPipeline<'a, E, S>
where
    E: EmbeddingProvider,
    S: IndexStorage,
{
    pub fn new(index: &'a HybridIndex<E, S>) -> Self {
        Self { index }
    }

    /// Ingest a batch of papers.
    ///
    /// # Errors
    /// Per-paper failures are counted in the returned stats. An error is only
    /// returned when the whole batch is rejected (strict persistence).
    pub async fn ingest_batch(&self, papers: Vec<Paper>) -> IngestionResult<IngestionStats> {
        Ok(self.index.add_documents(papers).await?)
    }

    /// Ingest all papers a provider supplies.
    ///
    /// # Errors
    /// Returns `IngestionError::Provider` if papers cannot be fetched.
    pub async fn ingest_from_provider<P>(&self, provider: &P) -> IngestionResult<IngestionStats>
    where
        P: PaperProvider,
    {
        let papers = provider.fetch_papers().await?;
        info!("Fetched {} papers from {}", papers.len(), provider.name());
        self.ingest_batch(papers).await
    }
}
