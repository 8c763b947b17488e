//! Cosine ranking of course embeddings

use super::Embedding;
use crate::catalog::CourseId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// A course and its similarity to the query vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub course_id: CourseId,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Compute the cosine similarity between two vectors.
///
/// Degenerate inputs (different lengths, empty, zero norm, non-finite values)
/// score 0 so one bad row cannot fail a ranking pass.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() || !dot.is_finite() {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Element-wise mean of `vectors`.
///
/// The first vector fixes the dimension; vectors of any other length are
/// skipped. Returns `None` when nothing is left to average.
pub fn centroid<'a, I>(vectors: I) -> Option<Embedding>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut sum: Vec<f64> = Vec::new();
    let mut count = 0usize;

    for vector in vectors {
        if vector.is_empty() {
            continue;
        }
        if count == 0 {
            sum = vec![0.0; vector.len()];
        } else if vector.len() != sum.len() {
            warn!(
                "Skipping vector of dimension {} while averaging {}-dimensional vectors",
                vector.len(),
                sum.len()
            );
            continue;
        }
        for (acc, &value) in sum.iter_mut().zip(vector.iter()) {
            *acc += f64::from(value);
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let n = count as f64;
    Some(sum.into_iter().map(|v| (v / n) as f32).collect())
}

/// Score every candidate against `query` and keep the best `top_n`.
///
/// Ordered by descending score; equal scores are ordered by ascending
/// course id so the result is reproducible.
pub fn rank(
    query: &[f32],
    candidates: &[(CourseId, Embedding)],
    top_n: usize,
) -> Vec<SimilarityResult> {
    let mut scored: Vec<SimilarityResult> = candidates
        .iter()
        .map(|(course_id, embedding)| SimilarityResult {
            course_id: *course_id,
            score: cosine_similarity(query, embedding),
        })
        .collect();

    scored.sort_by(compare_results);
    scored.truncate(top_n);
    scored
}

/// Like [`rank`] but only the course ids
pub fn rank_ids(query: &[f32], candidates: &[(CourseId, Embedding)], top_n: usize) -> Vec<CourseId> {
    rank(query, candidates, top_n)
        .into_iter()
        .map(|r| r.course_id)
        .collect()
}

fn compare_results(a: &SimilarityResult, b: &SimilarityResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.course_id.cmp(&b.course_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_centroid_of_unit_axes() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let center = centroid([a.as_slice(), b.as_slice()]).unwrap();
        assert_eq!(center, vec![0.5, 0.5]);

        let sim = cosine_similarity(&center, &[1.0, 1.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_centroid_skips_mismatched_dimensions() {
        let a = vec![2.0, 0.0];
        let bad = vec![1.0, 1.0, 1.0];
        let b = vec![0.0, 2.0];
        let center = centroid([a.as_slice(), bad.as_slice(), b.as_slice()]).unwrap();
        assert_eq!(center, vec![1.0, 1.0]);
    }

    #[test]
    fn test_centroid_of_nothing() {
        let empty: Vec<&[f32]> = Vec::new();
        assert!(centroid(empty).is_none());
    }

    #[test]
    fn test_rank_orders_by_score() {
        let query = vec![1.0, 0.0, 0.0];
        let candidates = vec![
            (1, vec![0.0, 1.0, 0.0]),
            (2, vec![1.0, 0.0, 0.0]),
            (3, vec![0.7, 0.7, 0.0]),
        ];

        let results = rank(&query, &candidates, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].course_id, 2);
        assert_eq!(results[1].course_id, 3);
    }

    #[test]
    fn test_rank_ties_break_by_ascending_id() {
        let query = vec![1.0, 1.0];
        let candidates = vec![
            (9, vec![1.0, 0.0]),
            (4, vec![0.0, 1.0]),
            (7, vec![1.0, 1.0]),
        ];

        let first = rank_ids(&query, &candidates, 3);
        assert_eq!(first, vec![7, 4, 9]);

        for _ in 0..10 {
            assert_eq!(rank_ids(&query, &candidates, 3), first);
        }
    }

    #[test]
    fn test_rank_empty_and_short_candidate_sets() {
        assert!(rank(&[1.0], &[], 3).is_empty());

        let candidates = vec![(1, vec![1.0])];
        assert_eq!(rank_ids(&[1.0], &candidates, 5), vec![1]);
        assert!(rank_ids(&[1.0], &candidates, 0).is_empty());
    }

    #[test]
    fn test_malformed_candidate_ranks_as_zero() {
        let query = vec![1.0, 0.0];
        let candidates = vec![(1, Vec::new()), (2, vec![-1.0, 0.0]), (3, vec![1.0, 0.0])];
        let results = rank(&query, &candidates, 3);
        let ids: Vec<CourseId> = results.iter().map(|r| r.course_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(results[1].score, 0.0);
    }
}
