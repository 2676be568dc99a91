//! JSON file paper provider.
//!
//! Accepts either a top-level array of paper records or an object with a
//! `papers` array. Unknown fields are ignored.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{PaperProvider, ProviderError, ProviderResult};
use crate::models::Paper;

#[derive(Deserialize)]
#[serde(untagged)]
enum PaperFile {
    List(Vec<Paper>),
    Wrapped { papers: Vec<Paper> },
}

/// Papers read from a JSON file, loaded eagerly.
#[derive(Debug, Clone)]
pub struct JsonFilePaperProvider {
    name: String,
    papers: Vec<Paper>,
}

impl JsonFilePaperProvider {
    /// Read and parse `path`.
    ///
    /// # Errors
    /// Returns `ProviderError::IoError` if the file cannot be read and
    /// `ProviderError::ParseError` if it is not a valid paper list.
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let papers = Self::parse(&bytes)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", path.display(), e)))?;
        debug!("Parsed {} papers from {}", papers.len(), path.display());
        Ok(Self {
            name: format!("json:{}", path.display()),
            papers,
        })
    }

    /// Parse an in-memory JSON document.
    pub fn parse(bytes: &[u8]) -> Result<Vec<Paper>, serde_json::Error> {
        Ok(match serde_json::from_slice::<PaperFile>(bytes)? {
            PaperFile::List(papers) | PaperFile::Wrapped { papers } => papers,
        })
    }
}

#[async_trait]
impl PaperProvider for JsonFilePaperProvider {
    async fn fetch_papers(&self) -> ProviderResult<Vec<Paper>> {
        Ok(self.papers.clone())
    }

    async fn count_papers(&self) -> ProviderResult<usize> {
        Ok(self.papers.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
