//! Distance → similarity normalization.

use caremind_core::hit::unit_interval;

/// Convert a vector-store distance into a similarity in `[0, 1]`.
///
/// `clamp(1 - distance, 0, 1)`: identical vectors (distance 0) score 1,
/// anything at distance 1 or beyond scores 0, and negative distances clamp
/// to 1. NaN maps to 0.
#[must_use]
pub fn distance_to_similarity(distance: f32) -> f32 {
    unit_interval(1.0 - distance)
}

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`.
///
/// Returns `None` for mismatched lengths or a zero-norm vector.
#[must_use]
pub fn cosine_distance(left: &[f32], right: &[f32]) -> Option<f32> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut left_norm_sq = 0.0_f32;
    let mut right_norm_sq = 0.0_f32;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f32::EPSILON {
        return None;
    }

    Some(1.0 - (dot / denom).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clamp_examples() {
        assert!((distance_to_similarity(0.0) - 1.0).abs() < f32::EPSILON);
        assert!((distance_to_similarity(0.25) - 0.75).abs() < 1e-6);
        assert!(distance_to_similarity(1.0).abs() < f32::EPSILON);
        assert!(distance_to_similarity(1.7).abs() < f32::EPSILON);
        assert!((distance_to_similarity(-5.0) - 1.0).abs() < f32::EPSILON);
        assert!(distance_to_similarity(f32::NAN).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_distance_of_parallel_and_opposite_vectors() {
        let d = cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).expect("valid");
        assert!(d.abs() < 1e-6);

        let d = cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]).expect("valid");
        assert!((d - 2.0).abs() < 1e-6);

        let d = cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).expect("valid");
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_rejects_degenerate_input() {
        assert!(cosine_distance(&[], &[]).is_none());
        assert!(cosine_distance(&[1.0], &[1.0, 2.0]).is_none());
        assert!(cosine_distance(&[0.0, 0.0], &[1.0, 2.0]).is_none());
    }

    proptest! {
        #[test]
        fn similarity_always_in_unit_interval(d in any::<f32>()) {
            let s = distance_to_similarity(d);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn similarity_is_non_increasing_in_distance(a in -3.0f32..3.0, b in -3.0f32..3.0) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(distance_to_similarity(near) >= distance_to_similarity(far));
        }
    }
}
