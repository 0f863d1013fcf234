//! Weighted-linear fusion.

use super::sort_by_fused_desc;
use caremind_core::{FusedHit, Hit, HitSource};
use std::collections::HashSet;

/// Guideline hits weighted by `alpha`, drug hits by `1 - alpha`, merged in
/// one stable descending sort. Ties keep input order, guideline list first.
/// A repeated `(source, id)` keeps only its highest-ranked entry.
pub(crate) fn fuse_linear(
    guideline: &[Hit],
    drug: &[Hit],
    alpha: f32,
    topn: usize,
) -> Vec<FusedHit> {
    let weighted = |hits: &[Hit], weight: f32| {
        hits.iter()
            .map(move |hit| FusedHit {
                fused_score: weight * hit.score,
                hit: hit.clone(),
            })
            .collect::<Vec<_>>()
    };

    let mut fused = weighted(guideline, alpha);
    fused.extend(weighted(drug, 1.0 - alpha));
    sort_by_fused_desc(&mut fused);

    let mut seen: HashSet<(HitSource, String)> = HashSet::with_capacity(fused.len());
    fused.retain(|f| seen.insert((f.hit.source, f.hit.id.clone())));
    fused.truncate(topn);
    fused
}
