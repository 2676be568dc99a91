//! Engine configuration.
//!
//! Everything the engine needs is injected through [`EngineConfig`]; there is no
//! process-wide state, so independent instances can coexist (one per tenant, one
//! per test).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::index::LexicalConfig;

/// Default weight of the semantic score in fusion.
pub const DEFAULT_HYBRID_WEIGHT: f32 = 0.7;

/// Default fused-score threshold.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.1;

/// Default candidate oversampling factor per modality.
pub const DEFAULT_OVERSAMPLE_FACTOR: usize = 2;

/// Default number of papers encoded per embedding batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration of a [`HybridIndex`](crate::engine::HybridIndex).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Directory holding the four snapshot artifacts
    pub storage_dir: PathBuf,

    /// Identifier of the embedding model
    pub model_name: String,

    /// Expected embedding dimension; checked against the encoder at construction
    pub dimension: usize,

    /// Semantic weight used when a query does not specify one
    pub default_hybrid_weight: f32,

    /// Threshold used when a query does not specify one
    pub default_min_similarity: f32,

    /// Each modality retrieves `k × oversample_factor` candidates
    pub oversample_factor: usize,

    /// Papers per `embed_batch` call during ingestion
    pub batch_size: usize,

    /// Skip papers whose normalized title is already indexed
    pub skip_duplicate_titles: bool,

    /// Return snapshot write failures from `add` instead of only logging them
    pub strict_persistence: bool,

    /// TF-IDF fit parameters
    pub lexical: LexicalConfig,
}

impl EngineConfig {
    /// Configuration for a model with the given identifier and dimension.
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        model_name: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            model_name: model_name.into(),
            dimension,
            ..Self::default()
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.dimension == 0 {
            return Err("dimension must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.default_hybrid_weight) {
            return Err(format!(
                "default_hybrid_weight must be in [0, 1], got {}",
                self.default_hybrid_weight
            ));
        }
        if !self.default_min_similarity.is_finite() {
            return Err("default_min_similarity must be finite".to_string());
        }
        if self.oversample_factor == 0 {
            return Err("oversample_factor must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        let lexical = &self.lexical;
        if lexical.max_features == 0 {
            return Err("lexical.max_features must be positive".to_string());
        }
        if !(lexical.max_df > 0.0 && lexical.max_df <= 1.0) {
            return Err(format!("lexical.max_df must be in (0, 1], got {}", lexical.max_df));
        }
        if lexical.ngram_min == 0 || lexical.ngram_min > lexical.ngram_max {
            return Err(format!(
                "lexical ngram range ({}, {}) is invalid",
                lexical.ngram_min, lexical.ngram_max
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("paper_index"),
            model_name: String::new(),
            dimension: 384,
            default_hybrid_weight: DEFAULT_HYBRID_WEIGHT,
            default_min_similarity: DEFAULT_MIN_SIMILARITY,
            oversample_factor: DEFAULT_OVERSAMPLE_FACTOR,
            batch_size: DEFAULT_BATCH_SIZE,
            skip_duplicate_titles: false,
            strict_persistence: false,
            lexical: LexicalConfig::default(),
        }
    }
}
