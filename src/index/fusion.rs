//! Weighted score fusion of dense and lexical candidates.
//!
//! Each candidate list is normalized by its own maximum, then combined as
//! `w × semantic + (1 − w) × lexical`, with 0 for a modality that did not return
//! the document. Only the union of the two oversampled candidate lists is scored,
//! never the whole corpus.

use std::collections::HashMap;

use crate::models::VectorId;

/// Tunables for one fusion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    /// Weight of the semantic score, in `[0, 1]`
    pub semantic_weight: f32,

    /// Fused scores below this are dropped
    pub min_similarity: f32,

    /// Maximum number of results
    pub k: usize,
}

/// One fused document with its raw per-modality scores.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub id: VectorId,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub fused_score: f32,
}

fn max_or_one(candidates: &[(VectorId, f32)]) -> f32 {
    let max = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(f32::NEG_INFINITY, f32::max);
    if max.is_finite() && max > 0.0 {
        max
    } else {
        1.0
    }
}

/// Fuse dense and lexical candidates into one ranked list.
///
/// Output is sorted by fused score descending (ties by ascending id), filtered by
/// `min_similarity` and truncated to `k`.
pub fn fuse(
    dense: &[(VectorId, f32)],
    lexical: &[(VectorId, f32)],
    params: &FusionParams,
) -> Vec<FusedCandidate> {
    let dense_max = max_or_one(dense);
    let lexical_max = max_or_one(lexical);
    let w = params.semantic_weight;

    let mut order: Vec<VectorId> = Vec::with_capacity(dense.len() + lexical.len());
    let mut scores: HashMap<VectorId, (f32, f32)> = HashMap::new();
    for &(id, score) in dense {
        if scores.insert(id, (score, 0.0)).is_none() {
            order.push(id);
        }
    }
    for &(id, score) in lexical {
        let entry = scores.entry(id).or_insert_with(|| {
            order.push(id);
            (0.0, 0.0)
        });
        entry.1 = score;
    }

    let mut fused: Vec<FusedCandidate> = order
        .into_iter()
        .map(|id| {
            let (semantic, keyword) = scores[&id];
            let fused_score = w * (semantic / dense_max) + (1.0 - w) * (keyword / lexical_max);
            FusedCandidate {
                id,
                semantic_score: semantic,
                keyword_score: keyword,
                fused_score,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    fused.retain(|c| c.fused_score >= params.min_similarity);
    fused.truncate(params.k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(w: f32, min: f32, k: usize) -> FusionParams {
        FusionParams {
            semantic_weight: w,
            min_similarity: min,
            k,
        }
    }

    fn ids(results: &[FusedCandidate]) -> Vec<VectorId> {
        results.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_weighted_sum_of_normalized_scores() {
        let dense = vec![(1, 0.8), (2, 0.4)];
        let lexical = vec![(2, 0.5), (3, 0.25)];
        let fused = fuse(&dense, &lexical, &params(0.7, 0.0, 10));

        let by_id: HashMap<_, _> = fused.iter().map(|c| (c.id, c.fused_score)).collect();
        assert!((by_id[&1] - 0.7).abs() < 1e-6);
        assert!((by_id[&2] - (0.7 * 0.5 + 0.3 * 1.0)).abs() < 1e-6);
        assert!((by_id[&3] - 0.3 * 0.5).abs() < 1e-6);
        assert_eq!(ids(&fused), vec![1, 2, 3]);

        let c2 = fused.iter().find(|c| c.id == 2).unwrap();
        assert_eq!(c2.semantic_score, 0.4);
        assert_eq!(c2.keyword_score, 0.5);
    }

    #[test]
    fn test_empty_lists() {
        assert!(fuse(&[], &[], &params(0.7, 0.0, 5)).is_empty());
        let fused = fuse(&[], &[(4, 2.0)], &params(0.5, 0.0, 5));
        assert_eq!(fused.len(), 1);
        assert!((fused[0].fused_score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_full_semantic_weight_matches_dense_order() {
        let dense = vec![(5, 0.9), (1, 0.7), (3, 0.2)];
        let lexical = vec![(3, 1.0), (8, 0.6), (1, 0.1)];
        let fused = fuse(&dense, &lexical, &params(1.0, 0.0, 3));
        assert_eq!(ids(&fused), vec![5, 1, 3]);
    }

    #[test]
    fn test_zero_semantic_weight_matches_lexical_order() {
        let dense = vec![(5, 0.9), (1, 0.7), (3, 0.2)];
        let lexical = vec![(3, 1.0), (8, 0.6), (1, 0.1)];
        let fused = fuse(&dense, &lexical, &params(0.0, 0.0, 3));
        assert_eq!(ids(&fused), vec![3, 8, 1]);
    }

    #[test]
    fn test_threshold_and_truncation() {
        let dense = vec![(0, 1.0), (1, 0.5), (2, 0.05)];
        let fused = fuse(&dense, &[], &params(1.0, 0.1, 10));
        assert_eq!(ids(&fused), vec![0, 1]);

        let fused = fuse(&dense, &[], &params(1.0, 0.0, 1));
        assert_eq!(ids(&fused), vec![0]);
    }

    #[test]
    fn test_equal_fused_scores_order_by_id() {
        // 9 is strong semantically, 4 lexically; at w = 0.5 both fuse to 0.5.
        let dense = vec![(9, 0.8), (2, 0.2)];
        let lexical = vec![(4, 0.6)];
        let fused = fuse(&dense, &lexical, &params(0.5, 0.0, 10));
        assert_eq!(fused[0].fused_score, fused[1].fused_score);
        assert_eq!(ids(&fused), vec![4, 9, 2]);
    }

    #[test]
    fn test_non_positive_max_does_not_flip_order() {
        let dense = vec![(0, -0.1), (1, -0.5)];
        let fused = fuse(&dense, &[], &params(1.0, -1.0, 10));
        assert_eq!(ids(&fused), vec![0, 1]);
    }
}
