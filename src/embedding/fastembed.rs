//! FastEmbed embedding provider implementation.
//!
//! This module provides an implementation of the `EmbeddingProvider` trait
//! using the fastembed library for local embedding generation.
//!
//! Models are selected by identifier, either the Hugging Face model code
//! (`BAAI/bge-small-en-v1.5`) or the fastembed enum name (`BGESmallENV15`).
//! The output dimension always comes from the fastembed model catalogue.

use super::{check_dimension, EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default model used when no identifier is given.
pub const DEFAULT_FASTEMBED_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Resolve a model identifier against the fastembed catalogue.
///
/// Matching is case-insensitive on both the model code and the enum name.
/// Returns the model together with its output dimension and canonical code.
pub fn resolve_model(identifier: &str) -> EmbeddingResult<(EmbeddingModel, usize, String)> {
    let wanted = identifier.trim().to_lowercase();
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| {
            info.model_code.to_lowercase() == wanted
                || format!("{:?}", info.model).to_lowercase() == wanted
        })
        .map(|info| (info.model, info.dim, info.model_code))
        .ok_or_else(|| {
            EmbeddingError::ConfigError(format!(
                "Unknown fastembed model '{}'",
                identifier
            ))
        })
}

/// FastEmbed embedding provider.
///
/// Holds a loaded model behind an async mutex; inference requires exclusive access.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The embedding model instance (wrapped in Arc<Mutex> for thread-safety)
    model: Arc<Mutex<TextEmbedding>>,

    /// Canonical model identifier
    model_name: String,

    /// Dimension of the embedding vectors, from the model catalogue
    embedding_dimension: usize,
}

impl FastEmbedProvider {
    /// Load a FastEmbed model by identifier.
    ///
    /// # Arguments
    /// * `identifier` - Model code or enum name (defaults to all-MiniLM-L6-v2)
    /// * `cache_dir` - Optional cache directory for model files
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if the identifier is unknown or the
    /// model cannot be downloaded/loaded
    pub fn new(identifier: Option<&str>, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let identifier = identifier.unwrap_or(DEFAULT_FASTEMBED_MODEL);
        let (model_type, embedding_dimension, model_name) = resolve_model(identifier)?;

        let mut init_options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            debug!("Using fastembed cache directory: {}", dir.display());
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options).map_err(|e| {
            EmbeddingError::ConfigError(format!(
                "Failed to initialize FastEmbed model '{}': {}",
                model_name, e
            ))
        })?;

        info!(
            "Loaded fastembed model {} (dimension {})",
            model_name, embedding_dimension
        );

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let mut model = self.model.lock().await;
        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))?;

        let embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationFailed("No embedding generated".to_string()))?;
        check_dimension(&embedding, self.embedding_dimension)?;
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(
                "All texts must be non-empty".to_string(),
            ));
        }

        let mut model = self.model.lock().await;
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();
        let embeddings = model
            .embed(text_strings, None)
            .map_err(|e| EmbeddingError::GenerationFailed(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationFailed(format!(
                "Expected {} embeddings, model returned {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}
