//! Reciprocal rank fusion.
//!
//! ```text
//! rrf(identity) = sum over lists of 1 / (k + rank_in_list)
//! ```
//!
//! Ranks are 1-indexed and come from each list's native scores (descending,
//! ties in input order), so only the order within a list matters, never the
//! scale of its scores.

use super::sort_by_fused_desc;
use caremind_core::{FusedHit, Hit, HitSource};
use std::collections::HashMap;

/// Fuse both lists with RRF and keep the best `topn`.
///
/// Identities are accumulated in traversal order (guideline list by rank,
/// then drug list by rank); that order breaks ties in the final sort. An
/// identity seen again adds to its existing entry.
pub(crate) fn fuse_rrf(guideline: &[Hit], drug: &[Hit], k: f32, topn: usize) -> Vec<FusedHit> {
    let mut fused: Vec<FusedHit> = Vec::with_capacity(guideline.len() + drug.len());
    let mut index: HashMap<(HitSource, &str), usize> = HashMap::new();

    for list in [guideline, drug] {
        for (position, hit_idx) in rank_order(list).into_iter().enumerate() {
            let hit = &list[hit_idx];
            let contribution = reciprocal_rank(k, position + 1);

            match index.get(&hit.identity()) {
                Some(&slot) => fused[slot].fused_score += contribution,
                None => {
                    index.insert(hit.identity(), fused.len());
                    fused.push(FusedHit {
                        hit: hit.clone(),
                        fused_score: contribution,
                    });
                }
            }
        }
    }

    sort_by_fused_desc(&mut fused);
    fused.truncate(topn);
    fused
}

/// Indices of `hits` ordered by descending score; equal scores keep input
/// order.
fn rank_order(hits: &[Hit]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..hits.len()).collect();
    order.sort_by(|&a, &b| hits[b].score.total_cmp(&hits[a].score));
    order
}

#[allow(clippy::cast_precision_loss)]
fn reciprocal_rank(k: f32, rank: usize) -> f32 {
    1.0 / (k + rank as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caremind_core::HitMeta;

    fn hit(id: &str, score: f32, source: HitSource) -> Hit {
        Hit::new(id, id, HitMeta::default(), score, source)
    }

    fn ids(fused: &[FusedHit]) -> Vec<&str> {
        fused.iter().map(|f| f.hit.id.as_str()).collect()
    }

    #[test]
    fn top_ranks_of_both_lists_tie_and_guideline_goes_first() {
        let g = vec![
            hit("g1", 0.9, HitSource::Guideline),
            hit("g2", 0.5, HitSource::Guideline),
        ];
        let d = vec![
            hit("drug:1", 0.8, HitSource::Drug),
            hit("drug:2", 0.2, HitSource::Drug),
        ];

        let fused = fuse_rrf(&g, &d, 60.0, 10);
        assert_eq!(ids(&fused), vec!["g1", "drug:1", "g2", "drug:2"]);
        assert!((fused[0].fused_score - 1.0 / 61.0).abs() < 1e-7);
        assert!((fused[2].fused_score - 1.0 / 62.0).abs() < 1e-7);
    }

    #[test]
    fn ranks_follow_scores_not_input_order() {
        let g = vec![
            hit("low", 0.1, HitSource::Guideline),
            hit("high", 0.9, HitSource::Guideline),
        ];
        let fused = fuse_rrf(&g, &[], 60.0, 10);
        assert_eq!(ids(&fused), vec!["high", "low"]);
    }

    #[test]
    fn equal_scores_rank_in_input_order() {
        let g = vec![
            hit("a", 0.5, HitSource::Guideline),
            hit("b", 0.5, HitSource::Guideline),
            hit("c", 0.5, HitSource::Guideline),
        ];
        let fused = fuse_rrf(&g, &[], 60.0, 10);
        assert_eq!(ids(&fused), vec!["a", "b", "c"]);
    }

    #[test]
    fn repeated_identity_accumulates() {
        let g = vec![
            hit("g1", 0.9, HitSource::Guideline),
            hit("g2", 0.8, HitSource::Guideline),
            hit("g1", 0.7, HitSource::Guideline),
        ];
        let fused = fuse_rrf(&g, &[], 60.0, 10);

        assert_eq!(ids(&fused), vec!["g1", "g2"]);
        let expected = 1.0 / 61.0 + 1.0 / 63.0;
        assert!((fused[0].fused_score - expected).abs() < 1e-7);
        assert!((fused[0].hit.score - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn smaller_k_widens_rank_gaps() {
        let g = vec![
            hit("g1", 0.9, HitSource::Guideline),
            hit("g2", 0.8, HitSource::Guideline),
        ];
        let wide = fuse_rrf(&g, &[], 1.0, 10);
        let narrow = fuse_rrf(&g, &[], 600.0, 10);
        let gap = |f: &[FusedHit]| f[0].fused_score - f[1].fused_score;
        assert!(gap(&wide) > gap(&narrow));
    }

    #[test]
    fn respects_topn_and_empty_inputs() {
        let g: Vec<Hit> = (0..6)
            .map(|i| hit(&format!("g{i}"), 0.5, HitSource::Guideline))
            .collect();
        assert_eq!(fuse_rrf(&g, &[], 60.0, 2).len(), 2);
        assert!(fuse_rrf(&[], &[], 60.0, 8).is_empty());
    }
}
