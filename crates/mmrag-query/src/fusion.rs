//! Score normalization and cross-collection merging.

/// Similarity from a cosine distance. Non-finite values score 0.
#[must_use]
pub fn similarity(distance: f32) -> f32 {
    let s = 1.0 - distance;
    if s.is_finite() { s } else { 0.0 }
}

/// Min-max normalize similarities into `[0, 1]`.
///
/// A single score, or scores that are all (nearly) equal, normalize to 1.0.
#[must_use]
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    let Some(first) = scores.first() else {
        return Vec::new();
    };
    let (min, max) = scores
        .iter()
        .fold((*first, *first), |(lo, hi), &s| (lo.min(s), hi.max(s)));

    let range = max - min;
    if range <= f32::EPSILON * max.abs().max(min.abs()).max(1.0) {
        return vec![1.0; scores.len()];
    }
    scores
        .iter()
        .map(|s| ((s - min) / range).clamp(0.0, 1.0))
        .collect()
}

/// Merge two scored lists and keep the best `top_k`.
///
/// `first` precedes `second` before a stable descending sort, so ties keep
/// that order.
pub fn merge<T>(first: Vec<(T, f32)>, second: Vec<(T, f32)>, top_k: usize) -> Vec<(T, f32)> {
    let mut merged: Vec<(T, f32)> = first.into_iter().chain(second).collect();
    merged.sort_by(|a, b| b.1.total_cmp(&a.1));
    merged.truncate(top_k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_similarity() {
        assert!((similarity(0.25) - 0.75).abs() < 1e-6);
        assert_eq!(similarity(f32::NAN), 0.0);
        assert_eq!(similarity(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn test_normalize_single() {
        assert_eq!(normalize_scores(&[0.3]), vec![1.0]);
    }

    #[test]
    fn test_normalize_all_equal() {
        assert_eq!(normalize_scores(&[0.5, 0.5, 0.5]), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_normalize_range() {
        let normalized = normalize_scores(&[0.9, 0.5, 0.7]);
        assert!((normalized[0] - 1.0).abs() < 1e-6);
        assert!(normalized[1].abs() < 1e-6);
        assert!((normalized[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_merge_prefers_first_on_ties() {
        let merged = merge(vec![("t0", 1.0), ("t1", 0.0)], vec![("i0", 1.0)], 3);
        let ids: Vec<_> = merged.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["t0", "i0", "t1"]);
    }

    #[test]
    fn test_merge_truncates() {
        let merged = merge(vec![("a", 0.2), ("b", 0.9)], vec![("c", 0.5)], 2);
        let ids: Vec<_> = merged.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_merge_with_empty_side() {
        let merged = merge(Vec::new(), vec![("only", 1.0)], 5);
        assert_eq!(merged.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_normalized_within_unit_interval(scores in prop::collection::vec(-1.0f32..1.0, 0..20)) {
            let normalized = normalize_scores(&scores);
            prop_assert_eq!(normalized.len(), scores.len());
            for s in &normalized {
                prop_assert!((0.0..=1.0).contains(s));
            }
        }

        #[test]
        fn prop_normalized_spans_unit_interval(scores in prop::collection::vec(-1.0f32..1.0, 2..20)) {
            let normalized = normalize_scores(&scores);
            let min = normalized.iter().copied().fold(f32::INFINITY, f32::min);
            let max = normalized.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if min < 1.0 {
                prop_assert!(min.abs() < 1e-6);
            }
            prop_assert!((max - 1.0).abs() < 1e-6);
        }

        #[test]
        fn prop_normalization_preserves_order(scores in prop::collection::vec(-1.0f32..1.0, 2..20)) {
            let normalized = normalize_scores(&scores);
            for i in 0..scores.len() {
                for j in 0..scores.len() {
                    if scores[i] < scores[j] {
                        prop_assert!(normalized[i] <= normalized[j]);
                    }
                }
            }
        }

        #[test]
        fn prop_merge_bounded_and_sorted(
            first in prop::collection::vec(0.0f32..1.0, 0..10),
            second in prop::collection::vec(0.0f32..1.0, 0..10),
            top_k in 1usize..15,
        ) {
            let first: Vec<_> = first.into_iter().map(|s| ((), s)).collect();
            let second: Vec<_> = second.into_iter().map(|s| ((), s)).collect();
            let total = first.len() + second.len();

            let merged = merge(first, second, top_k);
            prop_assert_eq!(merged.len(), total.min(top_k));
            for pair in merged.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
            }
        }
    }
}
