//! Query parameters and the search engine interface.
//!
//! # Usage
//!
//! ```rust,no_run
//! use paper_hybrid_search::config::EngineConfig;
//! use paper_hybrid_search::embedding::hash::HashEmbeddingProvider;
//! use paper_hybrid_search::engine::HybridIndex;
//! use paper_hybrid_search::query::{SearchEngine, SearchQuery};
//! use paper_hybrid_search::storage::FileStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::new("papers_index", "fnv1a-384", 384);
//! let storage = FileStorage::new(&config.storage_dir);
//! let index = HybridIndex::open(config, HashEmbeddingProvider::new(384), storage).await?;
//!
//! let query = SearchQuery::new("graph neural networks", Some(5));
//! for result in index.execute(&query).await? {
//!     println!("{} - {:.3} ({})", result.paper.title, result.final_score, result.search_method);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::EngineResult;
use crate::models::SearchResult;

/// Default number of results.
pub const DEFAULT_TOP_K: usize = 10;

/// Errors raised for malformed queries.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    /// Query text is empty after normalization
    #[error("Query text is empty")]
    EmptyQuery,

    /// Semantic weight outside `[0, 1]`
    #[error("hybrid_weight must be in [0, 1], got {0}")]
    InvalidWeight(f32),

    /// Threshold is NaN or infinite
    #[error("min_similarity must be finite, got {0}")]
    InvalidThreshold(f32),
}

/// Result type for query validation.
pub type QueryResult<T> = Result<T, QueryError>;

/// Check a semantic weight and threshold before they reach fusion.
pub fn validate_parameters(hybrid_weight: f32, min_similarity: f32) -> QueryResult<()> {
    if !(0.0..=1.0).contains(&hybrid_weight) {
        return Err(QueryError::InvalidWeight(hybrid_weight));
    }
    if !min_similarity.is_finite() {
        return Err(QueryError::InvalidThreshold(min_similarity));
    }
    Ok(())
}

/// Search query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Free-text query
    pub query: String,

    /// Maximum number of results to return
    pub top_k: usize,

    /// Semantic weight override; the engine default applies when `None`
    pub hybrid_weight: Option<f32>,

    /// Score threshold override; the engine default applies when `None`
    pub min_similarity: Option<f32>,
}

impl SearchQuery {
    /// Create a new search query with engine defaults for weight and threshold.
    ///
    /// # Arguments
    /// * `query` - The search query text
    /// * `top_k` - Maximum number of results to return (default: 10)
    pub fn new(query: impl Into<String>, top_k: Option<usize>) -> Self {
        Self {
            query: query.into(),
            top_k: top_k.unwrap_or(DEFAULT_TOP_K),
            hybrid_weight: None,
            min_similarity: None,
        }
    }

    pub fn with_hybrid_weight(mut self, weight: f32) -> Self {
        self.hybrid_weight = Some(weight);
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }
}

/// Trait for search and ranking engines.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a search query and return results sorted by descending final score.
    async fn execute(&self, query: &SearchQuery) -> EngineResult<Vec<SearchResult>>;
}
