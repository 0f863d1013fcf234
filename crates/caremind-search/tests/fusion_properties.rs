//! Property tests for both fusion strategies.
//!
//! # Properties covered
//!
//! 1. **Bounded output** - `len(fused) <= topn`, and every input identity is
//!    present when the inputs hold at most `topn` distinct identities.
//! 2. **Identity uniqueness** - no `(source, id)` appears twice.
//! 3. **Ordering** - fused scores are non-increasing.
//! 4. **Determinism** - the same inputs give the same output.
//! 5. **RRF scale invariance** - scaling one list's scores by a positive
//!    factor leaves the RRF result unchanged.
//! 6. **Empty inputs** - both strategies accept empty lists.

use caremind_core::{FusedHit, Hit, HitMeta, HitSource};
use caremind_search::FusionStrategy;
use proptest::prelude::*;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Scores on a 1/1000 grid so power-of-two scaling is exact.
fn scores(max_len: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec((0_u16..=1000).prop_map(|i| f32::from(i) / 1000.0), 0..max_len)
}

fn hits(scores: &[f32], source: HitSource) -> Vec<Hit> {
    scores
        .iter()
        .enumerate()
        .map(|(i, score)| {
            let id = match source {
                HitSource::Guideline => format!("g{i}"),
                HitSource::Drug => format!("drug:{i}"),
            };
            Hit::new(id, "content", HitMeta::default(), *score, source)
        })
        .collect()
}

fn strategies() -> impl Strategy<Value = FusionStrategy> {
    prop_oneof![
        (0.0_f32..=1.0).prop_map(|alpha| FusionStrategy::Linear { alpha }),
        (0.5_f32..200.0).prop_map(|k| FusionStrategy::Rrf { k }),
    ]
}

fn identities(fused: &[FusedHit]) -> Vec<(HitSource, String)> {
    fused
        .iter()
        .map(|f| (f.hit.source, f.hit.id.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn output_is_bounded_and_complete(
        g in scores(12),
        d in scores(12),
        strategy in strategies(),
        topn in 1_usize..30,
    ) {
        let guideline = hits(&g, HitSource::Guideline);
        let drug = hits(&d, HitSource::Drug);
        let fused = strategy.fuse(&guideline, &drug, topn).expect("valid parameters");

        prop_assert!(fused.len() <= topn);
        prop_assert_eq!(fused.len(), topn.min(g.len() + d.len()));
    }

    #[test]
    fn identities_are_unique(
        g in scores(12),
        d in scores(12),
        strategy in strategies(),
        duplicate in any::<bool>(),
    ) {
        let mut guideline = hits(&g, HitSource::Guideline);
        if duplicate && !guideline.is_empty() {
            let again = guideline[0].clone();
            guideline.push(again);
        }
        let drug = hits(&d, HitSource::Drug);
        let fused = strategy.fuse(&guideline, &drug, 50).expect("valid parameters");

        let ids = identities(&fused);
        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn fused_scores_are_non_increasing(
        g in scores(12),
        d in scores(12),
        strategy in strategies(),
    ) {
        let fused = strategy
            .fuse(&hits(&g, HitSource::Guideline), &hits(&d, HitSource::Drug), 50)
            .expect("valid parameters");
        for pair in fused.windows(2) {
            prop_assert!(pair[0].fused_score >= pair[1].fused_score);
        }
    }

    #[test]
    fn fusion_is_deterministic(
        g in scores(12),
        d in scores(12),
        strategy in strategies(),
        topn in 1_usize..30,
    ) {
        let guideline = hits(&g, HitSource::Guideline);
        let drug = hits(&d, HitSource::Drug);
        let first = strategy.fuse(&guideline, &drug, topn).expect("first");
        let second = strategy.fuse(&guideline, &drug, topn).expect("second");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn rrf_ignores_positive_scaling(
        g in scores(12),
        d in scores(12),
        shift in 1_i32..4,
        k in 1.0_f32..100.0,
    ) {
        let factor = 2.0_f32.powi(-shift);
        let scaled: Vec<f32> = g.iter().map(|s| s * factor).collect();
        let strategy = FusionStrategy::Rrf { k };

        let drug = hits(&d, HitSource::Drug);
        let base = strategy.fuse(&hits(&g, HitSource::Guideline), &drug, 50).expect("base");
        let after = strategy.fuse(&hits(&scaled, HitSource::Guideline), &drug, 50).expect("scaled");

        prop_assert_eq!(identities(&base), identities(&after));
        for (a, b) in base.iter().zip(&after) {
            prop_assert!((a.fused_score - b.fused_score).abs() < 1e-7);
        }
    }
}

// ---------------------------------------------------------------------------
// Fixed cases
// ---------------------------------------------------------------------------

#[test]
fn linear_is_sensitive_to_scale_differences_between_lists() {
    let strategy = FusionStrategy::Linear { alpha: 0.5 };
    let drug = hits(&[0.6], HitSource::Drug);

    let before = strategy
        .fuse(&hits(&[0.8], HitSource::Guideline), &drug, 5)
        .expect("before");
    let after = strategy
        .fuse(&hits(&[0.4], HitSource::Guideline), &drug, 5)
        .expect("after");

    assert_eq!(before[0].hit.id, "g0");
    assert_eq!(after[0].hit.id, "drug:0");
}

#[test]
fn empty_inputs_are_valid_for_both_strategies() {
    for strategy in [
        FusionStrategy::Linear { alpha: 0.6 },
        FusionStrategy::Rrf { k: 60.0 },
    ] {
        assert!(strategy.fuse(&[], &[], 8).expect("empty").is_empty());
        let only_drug = hits(&[0.7, 0.2], HitSource::Drug);
        assert_eq!(strategy.fuse(&[], &only_drug, 8).expect("drug only").len(), 2);
    }
}

#[test]
fn invalid_parameters_are_rejected() {
    let g = hits(&[0.9], HitSource::Guideline);
    assert!(FusionStrategy::Linear { alpha: 1.5 }.fuse(&g, &[], 3).is_err());
    assert!(FusionStrategy::Linear { alpha: f32::NAN }.fuse(&g, &[], 3).is_err());
    assert!(FusionStrategy::Rrf { k: 0.0 }.fuse(&g, &[], 3).is_err());
    assert!(FusionStrategy::Rrf { k: f32::INFINITY }.fuse(&g, &[], 3).is_err());
    assert!(FusionStrategy::default().fuse(&g, &[], 0).is_err());
}
