//! Directory-backed snapshot storage.
//!
//! Each artifact is written to a `.tmp` sibling and renamed into place, so a single
//! file is never observed half-written. The four renames are not atomic as a group.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{
    CoreSnapshot, DenseArtifact, IndexStorage, MetadataStore, SnapshotRef, StorageError,
    StorageResult, DENSE_INDEX_FILE, LEXICAL_MATRIX_FILE, LEXICAL_MODEL_FILE, METADATA_FILE,
};
use crate::index::lexical::{LexicalIndex, TermMatrix, TfidfVectorizer};
use crate::models::{Paper, VectorId};

/// Snapshot storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn encode_bin<T: Serialize>(artifact: &str, value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization {
        artifact: artifact.to_string(),
        message: e.to_string(),
    })
}

fn decode_bin<T: DeserializeOwned>(artifact: &str, bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Serialization {
        artifact: artifact.to_string(),
        message: e.to_string(),
    })
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn write_atomic(&self, name: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let path = self.artifact_path(name);
        let tmp = self.artifact_path(&format!("{}.tmp", name));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn read_optional(&self, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.artifact_path(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn exists(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.artifact_path(name))
            .await
            .unwrap_or(false)
    }

    async fn remove_if_exists(&self, name: &str) -> StorageResult<()> {
        let path = self.artifact_path(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[async_trait]
impl IndexStorage for FileStorage {
    async fn save(&self, snapshot: SnapshotRef<'_>) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let dense = DenseArtifact {
            embedding: snapshot.embedding.clone(),
            index: snapshot.dense.clone(),
        };
        self.write_atomic(DENSE_INDEX_FILE, encode_bin(DENSE_INDEX_FILE, &dense)?)
            .await?;

        let metadata = serde_json::to_vec(snapshot.metadata.as_map()).map_err(|e| {
            StorageError::Serialization {
                artifact: METADATA_FILE.to_string(),
                message: e.to_string(),
            }
        })?;
        self.write_atomic(METADATA_FILE, metadata).await?;

        match snapshot.lexical {
            Some(lexical) => {
                self.write_atomic(
                    LEXICAL_MODEL_FILE,
                    encode_bin(LEXICAL_MODEL_FILE, &lexical.model)?,
                )
                .await?;
                self.write_atomic(
                    LEXICAL_MATRIX_FILE,
                    encode_bin(LEXICAL_MATRIX_FILE, &lexical.matrix)?,
                )
                .await?;
            }
            None => {
                self.remove_if_exists(LEXICAL_MODEL_FILE).await?;
                self.remove_if_exists(LEXICAL_MATRIX_FILE).await?;
            }
        }
        Ok(())
    }

    async fn load_core(&self) -> StorageResult<Option<CoreSnapshot>> {
        if !(self.exists(DENSE_INDEX_FILE).await && self.exists(METADATA_FILE).await) {
            return Ok(None);
        }
        let (Some(dense_bytes), Some(meta_bytes)) = (
            self.read_optional(DENSE_INDEX_FILE).await?,
            self.read_optional(METADATA_FILE).await?,
        ) else {
            return Ok(None);
        };

        let dense: DenseArtifact = decode_bin(DENSE_INDEX_FILE, &dense_bytes)?;
        let papers: BTreeMap<VectorId, Paper> =
            serde_json::from_slice(&meta_bytes).map_err(|e| StorageError::Serialization {
                artifact: METADATA_FILE.to_string(),
                message: e.to_string(),
            })?;

        Ok(Some(CoreSnapshot {
            embedding: dense.embedding,
            dense: dense.index,
            metadata: MetadataStore::from_map(papers),
        }))
    }

    async fn load_lexical(&self) -> StorageResult<Option<LexicalIndex>> {
        let (Some(model_bytes), Some(matrix_bytes)) = (
            self.read_optional(LEXICAL_MODEL_FILE).await?,
            self.read_optional(LEXICAL_MATRIX_FILE).await?,
        ) else {
            return Ok(None);
        };

        let model: TfidfVectorizer = decode_bin(LEXICAL_MODEL_FILE, &model_bytes)?;
        let matrix: TermMatrix = decode_bin(LEXICAL_MATRIX_FILE, &matrix_bytes)?;
        let lexical = LexicalIndex { model, matrix };
        lexical
            .check_consistency()
            .map_err(|e| StorageError::Inconsistent(format!("lexical index: {}", e)))?;
        Ok(Some(lexical))
    }

    async fn clear(&self) -> StorageResult<()> {
        for name in [
            DENSE_INDEX_FILE,
            METADATA_FILE,
            LEXICAL_MODEL_FILE,
            LEXICAL_MATRIX_FILE,
        ] {
            self.remove_if_exists(name).await?;
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}
