//! Storage layer abstraction and implementations.
//!
//! The index persists as four artifacts: dense index, metadata map, fitted
//! lexical model and lexical weight matrix. This module defines the interface for
//! writing and reading those snapshots; [`files::FileStorage`] keeps them as four
//! files in one directory.

pub mod files;
pub mod metadata;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::{DenseIndex, LexicalIndex};
use crate::models::EmbeddingConfig;

pub use files::FileStorage;
pub use metadata::MetadataStore;

/// File name of the dense index artifact.
pub const DENSE_INDEX_FILE: &str = "dense_index.bin";
/// File name of the metadata artifact.
pub const METADATA_FILE: &str = "metadata.json";
/// File name of the fitted lexical model artifact.
pub const LEXICAL_MODEL_FILE: &str = "lexical_model.bin";
/// File name of the lexical weight matrix artifact.
pub const LEXICAL_MATRIX_FILE: &str = "lexical_matrix.bin";

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing an artifact failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Artifact could not be encoded or decoded
    #[error("Serialization error in {artifact}: {message}")]
    Serialization { artifact: String, message: String },

    /// Artifacts decoded but contradict each other
    #[error("Inconsistent snapshot: {0}")]
    Inconsistent(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// On-disk form of the dense index, tagged with the model that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseArtifact {
    pub embedding: EmbeddingConfig,
    pub index: DenseIndex,
}

/// Borrowed view of everything a snapshot contains.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRef<'a> {
    pub embedding: &'a EmbeddingConfig,
    pub dense: &'a DenseIndex,
    pub metadata: &'a MetadataStore,
    pub lexical: Option<&'a LexicalIndex>,
}

/// Dense index and metadata as loaded from storage.
#[derive(Debug, Clone)]
pub struct CoreSnapshot {
    pub embedding: EmbeddingConfig,
    pub dense: DenseIndex,
    pub metadata: MetadataStore,
}

/// Trait for index snapshot backends.
#[async_trait]
pub trait IndexStorage: Send + Sync {
    /// Write all artifacts. A `None` lexical index removes stale lexical artifacts.
    ///
    /// Artifacts are written one after another; if a later write fails the
    /// earlier ones stay on disk.
    async fn save(&self, snapshot: SnapshotRef<'_>) -> StorageResult<()>;

    /// Load dense index and metadata; `Ok(None)` if either artifact is absent.
    async fn load_core(&self) -> StorageResult<Option<CoreSnapshot>>;

    /// Load the lexical model and matrix; `Ok(None)` if either artifact is absent.
    async fn load_lexical(&self) -> StorageResult<Option<LexicalIndex>>;

    /// Delete all artifacts. Missing artifacts are not an error.
    async fn clear(&self) -> StorageResult<()>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}
