//! Dense vector index.
//!
//! Exact (brute-force) inner-product search over L2-normalized vectors, which is
//! cosine similarity. Vectors are stored contiguously; position `i` holds the
//! vector of document `i`.

use serde::{Deserialize, Serialize};

use super::{top_k, IndexError, IndexResult};
use crate::models::VectorId;

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Flat inner-product index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DenseIndex {
    dimension: usize,
    /// Row-major `len × dimension` matrix
    data: Vec<f32>,
}

impl DenseIndex {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the stored data is a whole number of rows.
    pub fn is_well_formed(&self) -> bool {
        self.dimension > 0 && self.data.len() % self.dimension == 0
    }

    /// Bytes used by the vector data.
    pub fn memory_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Normalize and append one vector, returning its id.
    ///
    /// # Errors
    /// `DimensionMismatch` if the length is wrong, `NonFinite` on NaN/inf input.
    /// The index is unchanged on error.
    pub fn add(&mut self, vector: &[f32]) -> IndexResult<VectorId> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::NonFinite);
        }

        let id = self.len() as VectorId;
        let mut normalized = vector.to_vec();
        l2_normalize(&mut normalized);
        self.data.extend_from_slice(&normalized);
        Ok(id)
    }

    /// Append several vectors; each entry fails or succeeds on its own.
    pub fn add_batch(&mut self, vectors: &[Vec<f32>]) -> Vec<IndexResult<VectorId>> {
        vectors.iter().map(|v| self.add(v)).collect()
    }

    /// Stored (normalized) vector for an id.
    pub fn get(&self, id: VectorId) -> Option<&[f32]> {
        let start = (id as usize).checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Top-k ids by inner product with the normalized query, descending.
    ///
    /// Returns an empty list for an empty index or `k == 0`.
    ///
    /// # Errors
    /// `DimensionMismatch` if the query has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<(VectorId, f32)>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let scored: Vec<(VectorId, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, row)| {
                let score: f32 = row.iter().zip(&q).map(|(a, b)| a * b).sum();
                (id as VectorId, score)
            })
            .filter(|(_, score)| score.is_finite())
            .collect();

        Ok(top_k(scored, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assigns_sequential_ids_and_normalizes() {
        let mut index = DenseIndex::new(2);
        assert_eq!(index.add(&[3.0, 4.0]).unwrap(), 0);
        assert_eq!(index.add(&[0.0, 2.0]).unwrap(), 1);
        assert_eq!(index.len(), 2);

        let v = index.get(0).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_fails_only_that_item() {
        let mut index = DenseIndex::new(3);
        let results = index.add_batch(&[vec![1.0, 0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0, 0.0]]);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(IndexError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert_eq!(*results[2].as_ref().unwrap(), 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_non_finite_vector_rejected() {
        let mut index = DenseIndex::new(2);
        assert!(matches!(index.add(&[f32::NAN, 1.0]), Err(IndexError::NonFinite)));
        assert!(index.is_empty());
    }

    #[test]
    fn test_partial_row_is_not_well_formed() {
        let mut index = DenseIndex::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        assert!(index.is_well_formed());

        index.data.push(0.5);
        assert!(!index.is_well_formed());
        assert_eq!(index.len(), 1);
        assert!(!DenseIndex::new(0).is_well_formed());
    }

    #[test]
    fn test_search_empty_index_returns_nothing() {
        let index = DenseIndex::new(3);
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_ranks_by_cosine() {
        let mut index = DenseIndex::new(3);
        index.add(&[1.0, 0.0, 0.0]).unwrap();
        index.add(&[0.8, 0.6, 0.0]).unwrap();
        index.add(&[0.0, 1.0, 0.0]).unwrap();

        let results = index.search(&[2.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, 0);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results[1].0, 1);
        assert!((results[1].1 - 0.8).abs() < 1e-6);
        assert_eq!(results[2].0, 2);
    }

    #[test]
    fn test_search_truncates_to_k() {
        let mut index = DenseIndex::new(2);
        for i in 0..5 {
            index.add(&[1.0, i as f32]).unwrap();
        }
        assert_eq!(index.search(&[1.0, 0.0], 2).unwrap().len(), 2);
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let mut index = DenseIndex::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_memory_bytes() {
        let mut index = DenseIndex::new(4);
        index.add(&[1.0; 4]).unwrap();
        index.add(&[1.0; 4]).unwrap();
        assert_eq!(index.memory_bytes(), 32);
    }
}
