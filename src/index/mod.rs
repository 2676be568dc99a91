//! In-memory retrieval structures.
//!
//! - **dense**: unit-normalized vectors searched by inner product
//! - **lexical**: TF-IDF weighted term matrix searched by dot product
//! - **fusion**: weighted combination of the two candidate lists
//!
//! All three address documents by [`VectorId`](crate::models::VectorId).

pub mod dense;
pub mod fusion;
pub mod lexical;

use thiserror::Error;

pub use dense::DenseIndex;
pub use fusion::{fuse, FusedCandidate, FusionParams};
pub use lexical::{LexicalConfig, LexicalFitError, LexicalIndex, TfidfVectorizer};

/// Errors raised by the in-memory indices.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Vector length differs from the index dimension
    #[error("Dimension mismatch: index has {expected}, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector contains NaN or infinite components
    #[error("Vector contains non-finite values")]
    NonFinite,
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Rank `(id, score)` pairs descending by score, ties by ascending id, keep `k`.
pub(crate) fn top_k(mut scored: Vec<(u64, f32)>, k: usize) -> Vec<(u64, f32)> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}
