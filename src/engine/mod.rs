//! The hybrid index engine.
//!
//! [`HybridIndex`] owns the dense index, the metadata store and the optional
//! lexical index behind one `RwLock`, and persists every mutation through an
//! [`IndexStorage`] backend. Ids are dense and shared by all three structures.
//!
//! Ingestion encodes papers before taking the write lock, appends them, refits
//! the lexical model over the whole corpus and then downgrades to a read guard
//! for the snapshot write. Searches take the read lock.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::embedding::{
    check_dimension, normalize_text, EmbeddingError, EmbeddingProvider, EmbeddingResult,
};
use crate::index::{fuse, DenseIndex, FusionParams, IndexError, LexicalConfig, LexicalIndex};
use crate::ingestion::{prepare_paper, IngestionStats};
use crate::models::{
    EmbeddingConfig, IndexStats, Paper, RelevanceLevel, SearchMethod, SearchResult, VectorId,
};
use crate::query::{validate_parameters, QueryError, SearchEngine, SearchQuery};
use crate::storage::{FileStorage, IndexStorage, MetadataStore, SnapshotRef, StorageError};

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Encoder and configuration disagree, or the configuration is invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A vector has the wrong number of components
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Reading or writing an artifact failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An artifact could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The encoder failed
    #[error("Embedding error: {0}")]
    Embedding(EmbeddingError),

    /// A document or vector was rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Query parameters were rejected
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// Persisted artifacts contradict each other
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<EmbeddingError> for EngineError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                EngineError::DimensionMismatch { expected, actual }
            }
            other => EngineError::Embedding(other),
        }
    }
}

impl From<IndexError> for EngineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DimensionMismatch { expected, actual } => {
                EngineError::DimensionMismatch { expected, actual }
            }
            IndexError::NonFinite => EngineError::InvalidInput(err.to_string()),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io { path, source } => EngineError::Io { path, source },
            StorageError::Serialization { artifact, message } => {
                EngineError::Serialization(format!("{}: {}", artifact, message))
            }
            StorageError::Inconsistent(message) => EngineError::Storage(message),
        }
    }
}

/// Mutable state guarded by the engine lock.
#[derive(Debug)]
struct IndexState {
    dense: DenseIndex,
    metadata: MetadataStore,
    lexical: Option<LexicalIndex>,
}

impl IndexState {
    fn empty(dimension: usize) -> Self {
        Self {
            dense: DenseIndex::new(dimension),
            metadata: MetadataStore::new(),
            lexical: None,
        }
    }

    /// Refit the lexical model over the full corpus. A corpus too small or too
    /// uniform to yield a vocabulary disables lexical search.
    fn refit_lexical(&mut self, config: &LexicalConfig) {
        let fitted = LexicalIndex::fit(config.clone(), &self.metadata.texts());
        match fitted {
            Ok(lexical) => {
                debug!(
                    "Refitted lexical index: {} terms over {} papers",
                    lexical.vocabulary_size(),
                    self.metadata.len()
                );
                self.lexical = Some(lexical);
            }
            Err(e) => {
                info!("Lexical search disabled: {}", e);
                self.lexical = None;
            }
        }
    }

    fn snapshot<'a>(&'a self, embedding: &'a EmbeddingConfig) -> SnapshotRef<'a> {
        SnapshotRef {
            embedding,
            dense: &self.dense,
            metadata: &self.metadata,
            lexical: self.lexical.as_ref(),
        }
    }

    fn result(
        &self,
        id: VectorId,
        semantic_score: f32,
        keyword_score: Option<f32>,
        final_score: f32,
        search_method: SearchMethod,
    ) -> Option<SearchResult> {
        let Some(paper) = self.metadata.get(id) else {
            warn!("Search hit {} has no metadata", id);
            return None;
        };
        Some(SearchResult {
            paper: paper.clone(),
            semantic_score,
            keyword_score,
            final_score,
            search_method,
            relevance: RelevanceLevel::from_score(final_score),
        })
    }
}

/// Load the persisted state, falling back to an empty index on any problem.
async fn load_state<S: IndexStorage>(storage: &S, embedding: &EmbeddingConfig) -> IndexState {
    let location = storage.location();
    let core = match storage.load_core().await {
        Ok(Some(core)) => core,
        Ok(None) => {
            info!("No index found at {}; starting empty", location);
            return IndexState::empty(embedding.dimension);
        }
        Err(e) => {
            error!("Failed to load index from {}: {}; starting empty", location, e);
            return IndexState::empty(embedding.dimension);
        }
    };

    if core.embedding != *embedding {
        warn!(
            "Index at {} was built with {} ({} dims) but the encoder is {} ({} dims); starting empty",
            location,
            core.embedding.model_name,
            core.embedding.dimension,
            embedding.model_name,
            embedding.dimension
        );
        return IndexState::empty(embedding.dimension);
    }

    if core.dense.dimension() != embedding.dimension
        || !core.dense.is_well_formed()
        || core.dense.len() != core.metadata.len()
        || !core.metadata.is_contiguous()
    {
        error!(
            "Index at {} is inconsistent ({} vectors, {} papers); starting empty",
            location,
            core.dense.len(),
            core.metadata.len()
        );
        return IndexState::empty(embedding.dimension);
    }

    let corpus_size = core.metadata.len();
    let lexical = match storage.load_lexical().await {
        Ok(Some(lexical)) if lexical.is_aligned_with(corpus_size) => Some(lexical),
        Ok(Some(lexical)) => {
            warn!(
                "Lexical index has {} rows for {} papers; lexical search disabled until the next insertion",
                lexical.matrix.n_rows(),
                corpus_size
            );
            None
        }
        Ok(None) => {
            info!(
                "No lexical index at {}; lexical search disabled until the next insertion",
                location
            );
            None
        }
        Err(e) => {
            warn!(
                "Failed to load lexical index: {}; lexical search disabled until the next insertion",
                e
            );
            None
        }
    };

    info!(
        "Loaded {} papers from {} (lexical {})",
        corpus_size,
        location,
        if lexical.is_some() { "enabled" } else { "disabled" }
    );
    IndexState {
        dense: core.dense,
        metadata: core.metadata,
        lexical,
    }
}

/// Persistent hybrid dense + lexical paper index.
///
/// Multiple instances with different storage locations can coexist.
pub struct HybridIndex<E, S>
where
    E: EmbeddingProvider,
    S: IndexStorage,
{
    config: EngineConfig,
    embedding: EmbeddingConfig,
    provider: E,
    storage: S,
    state: RwLock<IndexState>,
    /// Serializes snapshot writes and holds the last write error.
    persist_lock: Mutex<Option<String>>,
}

impl<E> HybridIndex<E, FileStorage>
where
    E: EmbeddingProvider,
{
    /// Open an index stored in `config.storage_dir`.
    pub async fn open_dir(config: EngineConfig, provider: E) -> EngineResult<Self> {
        let storage = FileStorage::new(&config.storage_dir);
        Self::open(config, provider, storage).await
    }
}

impl<E, S> HybridIndex<E, S>
where
    E: EmbeddingProvider,
    S: IndexStorage,
{
    /// Construct the engine and load any persisted snapshot.
    ///
    /// A missing, unreadable or inconsistent snapshot yields an empty index; a
    /// missing or misaligned lexical snapshot leaves lexical search disabled.
    ///
    /// # Errors
    /// Returns `EngineError::Configuration` if the configuration is invalid or
    /// the encoder's dimension or model name disagrees with it.
    pub async fn open(config: EngineConfig, provider: E, storage: S) -> EngineResult<Self> {
        config.validate().map_err(EngineError::Configuration)?;

        if provider.dimension() != config.dimension {
            return Err(EngineError::Configuration(format!(
                "encoder '{}' produces {}-dimensional vectors but the configuration expects {}",
                provider.model_name(),
                provider.dimension(),
                config.dimension
            )));
        }
        if !config.model_name.is_empty() && config.model_name != provider.model_name() {
            return Err(EngineError::Configuration(format!(
                "configured model '{}' does not match encoder '{}'",
                config.model_name,
                provider.model_name()
            )));
        }

        let embedding = EmbeddingConfig {
            model_name: provider.model_name().to_string(),
            dimension: config.dimension,
        };
        let state = load_state(&storage, &embedding).await;

        Ok(Self {
            config,
            embedding,
            provider,
            storage,
            state: RwLock::new(state),
            persist_lock: Mutex::new(None),
        })
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.metadata.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.metadata.is_empty()
    }

    /// Whether hybrid search is currently available.
    pub async fn is_lexical_enabled(&self) -> bool {
        self.state.read().await.lexical.is_some()
    }

    /// Stored paper by id.
    pub async fn get(&self, id: VectorId) -> Option<Paper> {
        self.state.read().await.metadata.get(id).cloned()
    }

    /// Insert papers and return how many were indexed.
    pub async fn add(&self, papers: Vec<Paper>) -> EngineResult<usize> {
        Ok(self.add_documents(papers).await?.inserted)
    }

    /// Insert papers, refit the lexical model and persist.
    ///
    /// Papers that fail validation, encoding or insertion are logged and
    /// counted; they never abort the batch.
    ///
    /// # Errors
    /// Only with `strict_persistence`: the snapshot write failed. The papers
    /// remain indexed in memory.
    pub async fn add_documents(&self, papers: Vec<Paper>) -> EngineResult<IngestionStats> {
        let mut stats = IngestionStats::new();

        let mut prepared = Vec::with_capacity(papers.len());
        for paper in papers {
            match prepare_paper(paper) {
                Ok(paper) => prepared.push(paper),
                Err(e) => {
                    warn!("Skipping paper: {}", e);
                    stats.record_failed();
                }
            }
        }

        if self.config.skip_duplicate_titles {
            prepared = self.drop_duplicates(prepared, &mut stats).await;
        }

        let encoded = self.encode_papers(prepared, &mut stats).await;
        if encoded.is_empty() {
            return Ok(stats);
        }

        let mut state = self.state.write().await;
        let mut inserted = 0usize;
        for (paper, vector) in encoded {
            // Another insert may have landed while this batch was encoding.
            if self.config.skip_duplicate_titles && state.metadata.contains_title(&paper.title) {
                debug!("Skipping duplicate title '{}'", paper.title);
                stats.record_duplicate();
                continue;
            }
            match state.dense.add(&vector) {
                Ok(id) => {
                    state.metadata.insert(id, paper);
                    stats.record_inserted();
                    inserted += 1;
                }
                Err(e) => {
                    warn!("Failed to index paper '{}': {}", paper.title, e);
                    stats.record_failed();
                }
            }
        }
        if inserted == 0 {
            return Ok(stats);
        }
        info!(
            "Inserted {} papers; corpus size is {}",
            inserted,
            state.metadata.len()
        );
        state.refit_lexical(&self.config.lexical);

        let state = state.downgrade();
        let persisted = self.persist(&state).await;
        drop(state);

        match persisted {
            Err(e) if self.config.strict_persistence => Err(e),
            _ => Ok(stats),
        }
    }

    async fn drop_duplicates(&self, papers: Vec<Paper>, stats: &mut IngestionStats) -> Vec<Paper> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        papers
            .into_iter()
            .filter(|paper| {
                let fresh = !state.metadata.contains_title(&paper.title)
                    && seen.insert(normalize_text(&paper.title));
                if !fresh {
                    debug!("Skipping duplicate title '{}'", paper.title);
                    stats.record_duplicate();
                }
                fresh
            })
            .collect()
    }

    async fn encode_papers(
        &self,
        papers: Vec<Paper>,
        stats: &mut IngestionStats,
    ) -> Vec<(Paper, Vec<f32>)> {
        let mut encoded = Vec::with_capacity(papers.len());
        let mut papers = papers.into_iter();
        loop {
            let chunk: Vec<Paper> = papers.by_ref().take(self.config.batch_size).collect();
            if chunk.is_empty() {
                break;
            }
            let vectors = self.encode_chunk(&chunk).await;
            for (paper, vector) in chunk.into_iter().zip(vectors) {
                match vector {
                    Ok(vector) => encoded.push((paper, vector)),
                    Err(e) => {
                        warn!("Failed to embed paper '{}': {}", paper.title, e);
                        stats.record_failed();
                    }
                }
            }
        }
        encoded
    }

    /// Encode one chunk with `embed_batch`, retrying one document at a time if the
    /// batch call fails.
    async fn encode_chunk(&self, chunk: &[Paper]) -> Vec<EmbeddingResult<Vec<f32>>> {
        let texts: Vec<String> = chunk
            .iter()
            .map(|p| normalize_text(p.index_text.as_deref().unwrap_or_default()))
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let dimension = self.embedding.dimension;

        match self.provider.embed_batch(&refs).await {
            Ok(vectors) if vectors.len() == refs.len() => {
                return vectors
                    .into_iter()
                    .map(|v| check_dimension(&v, dimension).map(|()| v))
                    .collect();
            }
            Ok(vectors) => warn!(
                "Batch embedding returned {} vectors for {} texts; retrying one by one",
                vectors.len(),
                refs.len()
            ),
            Err(e) => warn!("Batch embedding failed ({}); retrying one by one", e),
        }

        let mut results = Vec::with_capacity(refs.len());
        for text in &refs {
            let result = self
                .provider
                .embed(text)
                .await
                .and_then(|v| check_dimension(&v, dimension).map(|()| v));
            results.push(result);
        }
        results
    }

    async fn persist(&self, state: &IndexState) -> EngineResult<()> {
        let mut last_error = self.persist_lock.lock().await;
        match self.storage.save(state.snapshot(&self.embedding)).await {
            Ok(()) => {
                *last_error = None;
                debug!(
                    "Persisted {} papers to {}",
                    state.metadata.len(),
                    self.storage.location()
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to persist index to {}: {}", self.storage.location(), e);
                *last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Rewrite the current snapshot.
    pub async fn save(&self) -> EngineResult<()> {
        let state = self.state.read().await;
        self.persist(&state).await
    }

    /// Drop every paper and delete the persisted artifacts. Ids restart at 0.
    ///
    /// # Errors
    /// The in-memory index is emptied even if deleting the artifacts fails.
    pub async fn clear(&self) -> EngineResult<()> {
        let mut state = self.state.write().await;
        *state = IndexState::empty(self.embedding.dimension);

        let mut last_error = self.persist_lock.lock().await;
        match self.storage.clear().await {
            Ok(()) => {
                *last_error = None;
                info!("Cleared index at {}", self.storage.location());
                Ok(())
            }
            Err(e) => {
                error!("Failed to clear index at {}: {}", self.storage.location(), e);
                *last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Rank papers for a free-text query.
    ///
    /// `hybrid_weight` is the weight of the semantic score and `min_similarity`
    /// the threshold on the final score; `None` uses the configured defaults.
    /// With the lexical index disabled the ranking is dense-only and the final
    /// score is the raw similarity.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidQuery` for an out-of-range weight, a
    /// non-finite threshold or an empty query against a non-empty index.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        hybrid_weight: Option<f32>,
        min_similarity: Option<f32>,
    ) -> EngineResult<Vec<SearchResult>> {
        let weight = hybrid_weight.unwrap_or(self.config.default_hybrid_weight);
        let min_similarity = min_similarity.unwrap_or(self.config.default_min_similarity);
        validate_parameters(weight, min_similarity)?;

        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let normalized = normalize_text(query);
        if normalized.is_empty() {
            return Err(QueryError::EmptyQuery.into());
        }
        let vector = self.provider.embed(&normalized).await?;
        check_dimension(&vector, self.embedding.dimension)?;

        let state = self.state.read().await;
        let candidates = k.saturating_mul(self.config.oversample_factor);
        let dense = state.dense.search(&vector, candidates)?;

        let results = match &state.lexical {
            Some(lexical) => {
                let keyword = lexical.search(&normalized, candidates);
                debug!(
                    "Hybrid search: {} dense and {} lexical candidates, weight {}",
                    dense.len(),
                    keyword.len(),
                    weight
                );
                let params = FusionParams {
                    semantic_weight: weight,
                    min_similarity,
                    k,
                };
                fuse(&dense, &keyword, &params)
                    .into_iter()
                    .filter_map(|c| {
                        state.result(
                            c.id,
                            c.semantic_score,
                            Some(c.keyword_score),
                            c.fused_score,
                            SearchMethod::Hybrid,
                        )
                    })
                    .collect()
            }
            None => {
                debug!("Semantic-only search over {} candidates", dense.len());
                dense
                    .into_iter()
                    .filter(|(_, score)| *score >= min_similarity)
                    .take(k)
                    .filter_map(|(id, score)| {
                        state.result(id, score, None, score, SearchMethod::Semantic)
                    })
                    .collect()
            }
        };
        Ok(results)
    }

    /// Administrative snapshot of the index.
    pub async fn stats(&self) -> IndexStats {
        let state = self.state.read().await;
        let last_persist_error = self.persist_lock.lock().await.clone();
        IndexStats {
            corpus_size: state.metadata.len(),
            vector_dimension: self.embedding.dimension,
            lexical_vocabulary_size: state
                .lexical
                .as_ref()
                .map_or(0, LexicalIndex::vocabulary_size),
            approx_memory_bytes: state.dense.memory_bytes()
                + state.lexical.as_ref().map_or(0, LexicalIndex::memory_bytes)
                + state.metadata.memory_bytes(),
            lexical_enabled: state.lexical.is_some(),
            model_name: self.embedding.model_name.clone(),
            last_persist_error,
        }
    }
}

#[async_trait]
impl<E, S> SearchEngine for HybridIndex<E, S>
where
    E: EmbeddingProvider,
    S: IndexStorage,
{
    async fn execute(&self, query: &SearchQuery) -> EngineResult<Vec<SearchResult>> {
        self.search(
            &query.query,
            query.top_k,
            query.hybrid_weight,
            query.min_similarity,
        )
        .await
    }
}
