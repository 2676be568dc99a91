//! Paper Hybrid Search - a persistent hybrid dense + lexical retrieval engine
//! for research papers.
//!
//! Each paper is reduced to one synthesized index text, which is encoded into a
//! dense vector and fed to a TF-IDF model. Queries are scored by both, the two
//! candidate lists are max-normalized and fused with a tunable weight, and the
//! whole index is snapshotted to a directory after every insertion.
//!
//! # Architecture
//!
//! - **models**: Core data structures (Paper, Author, SearchResult, IndexStats)
//! - **embedding**: Encoder trait with fastembed and feature-hashing providers
//! - **text**: Index text synthesis shared by both modalities
//! - **index**: Dense index, TF-IDF lexical index and score fusion
//! - **storage**: Metadata store and directory snapshot persistence
//! - **engine**: The `HybridIndex` tying everything together
//! - **query**: Query parameters and the `SearchEngine` trait
//! - **ingestion**: Paper validation and provider-driven ingestion
//! - **provider**: Paper sources (JSON files)
//! - **config**: Engine configuration
//!
//! # Example
//!
//! ```no_run
//! use paper_hybrid_search::{
//!     embedding::hash::HashEmbeddingProvider, EngineConfig, HybridIndex, Paper,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::new("papers_index", "", 384);
//!     let index = HybridIndex::open_dir(config, HashEmbeddingProvider::new(384)).await?;
//!
//!     index
//!         .add(vec![
//!             Paper::new("Neural Networks"),
//!             Paper::new("Quantum Computing"),
//!             Paper::new("Neural Architecture Search"),
//!         ])
//!         .await?;
//!
//!     for result in index.search("neural", 5, Some(0.7), None).await? {
//!         println!("{}: {:.3}", result.paper.title, result.final_score);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod embedding;
pub mod engine;
pub mod index;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod query;
pub mod storage;
pub mod text;

// Re-export commonly used types at the crate root
pub use config::EngineConfig;
pub use embedding::EmbeddingProvider;
pub use engine::{EngineError, EngineResult, HybridIndex};
pub use ingestion::IngestionStats;
pub use models::{
    Author, EmbeddingConfig, IndexStats, Paper, RelevanceLevel, SearchMethod, SearchResult,
};
pub use query::{SearchEngine, SearchQuery};
pub use storage::{FileStorage, IndexStorage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
