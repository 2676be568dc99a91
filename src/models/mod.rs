//! Core data models for the hybrid paper search engine.
//!
//! This module contains the fundamental data structures used across the application,
//! including paper records, author information, scored search results and index stats.

use serde::{Deserialize, Serialize};

/// Stable internal identifier of a document inside the index.
///
/// Ids are dense and zero-based: the n-th inserted paper gets id `n - 1`, and the
/// same id addresses its dense vector, its lexical matrix row and its metadata.
pub type VectorId = u64;

/// Represents a single author with their affiliation information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    /// Full name of the author
    pub name: String,

    /// Institutional affiliation (e.g., university, research lab)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    /// Create an author without an affiliation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
        }
    }
}

/// A research paper record.
///
/// Caller-supplied fields describe the paper. The two derived fields
/// (`index_text` and `vector_id`) are filled in by the engine at insertion time
/// and are ignored on input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    /// Paper title (required)
    pub title: String,

    /// Authors in publication order
    #[serde(default)]
    pub authors: Vec<Author>,

    /// Abstract or summary text
    #[serde(default, alias = "abstract", alias = "summary")]
    pub abstract_text: String,

    /// Topic concepts (e.g. from a concept tagger), most relevant first
    #[serde(default)]
    pub concepts: Vec<String>,

    /// Free-form author keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Publication venue (journal or conference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,

    /// Identifier assigned by the caller (DOI, OpenAlex id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    /// Year of publication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,

    /// Synthesized text fed to both the encoder and the lexical model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_text: Option<String>,

    /// Internal id assigned by the index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_id: Option<VectorId>,
}

impl Paper {
    /// Create a paper with only a title set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Which retrieval modalities produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// Dense similarity only (lexical index disabled)
    Semantic,

    /// Weighted fusion of dense and lexical scores
    Hybrid,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Semantic => "semantic",
            SearchMethod::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relevance classification for search results.
///
/// Papers are categorized by their final score, allowing clients to understand
/// the quality of matches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelevanceLevel {
    /// Extremely high score (> 0.95)
    Identical,

    /// Very high score (> 0.85)
    HighlySimilar,

    /// Moderate score (> 0.70)
    Similar,

    /// Lower score but still above the similarity threshold
    Relevant,
}

impl RelevanceLevel {
    /// Determine relevance level from a final score.
    pub fn from_score(score: f32) -> Self {
        if score > 0.95 {
            RelevanceLevel::Identical
        } else if score > 0.85 {
            RelevanceLevel::HighlySimilar
        } else if score > 0.70 {
            RelevanceLevel::Similar
        } else {
            RelevanceLevel::Relevant
        }
    }
}

/// A single ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The paper metadata (with `vector_id` and `index_text` populated)
    pub paper: Paper,

    /// Raw dense similarity (0.0 when the paper was only a lexical candidate)
    pub semantic_score: f32,

    /// Raw lexical score; `None` when the lexical index is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,

    /// Score used for ranking and thresholding
    pub final_score: f32,

    /// Which modalities produced this ranking
    pub search_method: SearchMethod,

    /// Categorical relevance classification of `final_score`
    pub relevance: RelevanceLevel,
}

/// Configuration of the embedding model that produced the stored vectors.
///
/// Persisted alongside the dense index so that a snapshot written with one model
/// is never searched with another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Name/identifier of the embedding model
    pub model_name: String,

    /// Dimension of the embedding vectors
    pub dimension: usize,
}

/// Administrative snapshot of the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    /// Number of indexed papers
    pub corpus_size: usize,

    /// Dimension of the dense vectors
    pub vector_dimension: usize,

    /// Number of terms in the fitted lexical vocabulary (0 when disabled)
    pub lexical_vocabulary_size: usize,

    /// Rough in-memory footprint of vectors, lexical weights and metadata text
    pub approx_memory_bytes: usize,

    /// Whether hybrid search is currently available
    pub lexical_enabled: bool,

    /// Embedding model the index was built with
    pub model_name: String,

    /// Error message of the most recent failed snapshot write, if the last one failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_persist_error: Option<String>,
}
