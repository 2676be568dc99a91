//! Paper provider module.
//!
//! The `PaperProvider` trait abstracts the source of paper records so the
//! ingestion pipeline can be fed from local files or remote catalogues without
//! coupling to either.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Paper;

pub mod json;

/// Errors that can occur when fetching papers from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sourcing paper records.
///
/// Providers return raw records. Validation, index-text synthesis and optional
/// duplicate skipping happen at ingestion.
#[async_trait]
pub trait PaperProvider: Send + Sync {
    /// Fetch all available papers from this provider.
    async fn fetch_papers(&self) -> ProviderResult<Vec<Paper>>;

    /// Fetch at most `limit` papers.
    async fn fetch_papers_limit(&self, limit: usize) -> ProviderResult<Vec<Paper>> {
        let all_papers = self.fetch_papers().await?;
        Ok(all_papers.into_iter().take(limit).collect())
    }

    /// Total number of papers available, for progress reporting.
    async fn count_papers(&self) -> ProviderResult<usize> {
        self.fetch_papers().await.map(|papers| papers.len())
    }

    /// Human-readable name of this provider for logs.
    fn name(&self) -> &str;
}
