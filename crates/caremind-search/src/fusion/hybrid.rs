//! Hybrid retrieval: query both providers, then fuse.
//!
//! The retriever does not catch provider errors. Substituting empty evidence
//! for an unavailable store is the caller's decision (see
//! [`crate::answer::DegradePolicy`]).

use super::{FusionStrategy, validate_topn};
use crate::provider::{RelationalSearchProvider, VectorSearchProvider, validate_query};
use caremind_core::config::RetrievalSettings;
use caremind_core::{FusedHit, Hit, RetrievalError};
use serde::Serialize;
use tracing::{debug, instrument};

/// Upper bound applied to per-provider `k` when none is configured.
pub const DEFAULT_MAX_K: usize = 8;

/// Per-query retrieval parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridParams {
    pub k_guideline: usize,
    pub k_drug: usize,
    pub strategy: FusionStrategy,
    pub topn: usize,
}

impl Default for HybridParams {
    fn default() -> Self {
        Self {
            k_guideline: 6,
            k_drug: 6,
            strategy: FusionStrategy::default(),
            topn: 8,
        }
    }
}

impl HybridParams {
    #[must_use]
    pub const fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            k_guideline: settings.k_guideline,
            k_drug: settings.k_drug,
            strategy: FusionStrategy::from_settings(settings),
            topn: settings.topn,
        }
    }
}

/// The four views of one hybrid query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridSearchResult {
    pub query: String,
    pub guideline_hits: Vec<Hit>,
    pub drug_hits: Vec<Hit>,
    pub fused_hits: Vec<FusedHit>,
}

/// Calls the vector and relational providers once each and fuses their
/// results.
pub struct HybridRetriever<'a> {
    vector: &'a dyn VectorSearchProvider,
    relational: &'a dyn RelationalSearchProvider,
    max_k: usize,
}

impl<'a> HybridRetriever<'a> {
    #[must_use]
    pub fn new(
        vector: &'a dyn VectorSearchProvider,
        relational: &'a dyn RelationalSearchProvider,
    ) -> Self {
        Self {
            vector,
            relational,
            max_k: DEFAULT_MAX_K,
        }
    }

    /// Set the upper bound for per-provider `k` (at least 1).
    #[must_use]
    pub fn with_max_k(mut self, max_k: usize) -> Self {
        self.max_k = max_k.max(1);
        self
    }

    /// Run one hybrid query.
    ///
    /// The query and fusion parameters are validated before either provider
    /// is called. `k_guideline` and `k_drug` are clamped into `1..=max_k`.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::EmptyQuery`], [`RetrievalError::InvalidParameter`],
    /// or whatever a provider returns.
    #[instrument(skip(self, params), fields(strategy = %params.strategy))]
    pub fn hybrid_search(
        &self,
        query: &str,
        params: &HybridParams,
    ) -> Result<HybridSearchResult, RetrievalError> {
        let trimmed = validate_query(query)?;
        let strategy = params.strategy.validate()?;
        validate_topn(params.topn)?;

        let k_guideline = params.k_guideline.clamp(1, self.max_k);
        let k_drug = params.k_drug.clamp(1, self.max_k);

        let guideline_hits = self.vector.search(trimmed, k_guideline)?;
        let drug_hits = self.relational.search(trimmed, k_drug)?;
        let fused_hits = strategy.fuse(&guideline_hits, &drug_hits, params.topn)?;

        debug!(
            guideline = guideline_hits.len(),
            drug = drug_hits.len(),
            fused = fused_hits.len(),
            "hybrid search complete"
        );

        Ok(HybridSearchResult {
            query: query.to_string(),
            guideline_hits,
            drug_hits,
            fused_hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caremind_core::{HitMeta, HitSource};
    use std::cell::{Cell, RefCell};

    struct FixedGuidelines {
        hits: Vec<Hit>,
        requested_k: Cell<Option<usize>>,
    }

    impl FixedGuidelines {
        fn new(scores: &[f32]) -> Self {
            let hits = scores
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    Hit::new(
                        format!("g{}", i + 1),
                        format!("guideline {}", i + 1),
                        HitMeta::default(),
                        *s,
                        HitSource::Guideline,
                    )
                })
                .collect();
            Self {
                hits,
                requested_k: Cell::new(None),
            }
        }
    }

    impl VectorSearchProvider for FixedGuidelines {
        fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>, RetrievalError> {
            validate_query(query)?;
            self.requested_k.set(Some(k));
            Ok(self.hits.iter().take(k).cloned().collect())
        }
    }

    struct FixedDrugs {
        hits: Vec<Hit>,
        queries: RefCell<Vec<String>>,
    }

    impl FixedDrugs {
        fn new(scores: &[f32]) -> Self {
            let hits = scores
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    Hit::new(
                        format!("drug:{}", i + 1),
                        format!("drug {}", i + 1),
                        HitMeta::default(),
                        *s,
                        HitSource::Drug,
                    )
                })
                .collect();
            Self {
                hits,
                queries: RefCell::new(Vec::new()),
            }
        }
    }

    impl RelationalSearchProvider for FixedDrugs {
        fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>, RetrievalError> {
            self.queries.borrow_mut().push(query.to_string());
            Ok(self.hits.iter().take(k).cloned().collect())
        }

        fn get_by_name(&self, _name: &str) -> Result<Option<Hit>, RetrievalError> {
            Ok(self.hits.first().cloned())
        }
    }

    struct Unavailable;

    impl RelationalSearchProvider for Unavailable {
        fn search(&self, _query: &str, _k: usize) -> Result<Vec<Hit>, RetrievalError> {
            Err(RetrievalError::unavailable("drug", "store missing"))
        }

        fn get_by_name(&self, _name: &str) -> Result<Option<Hit>, RetrievalError> {
            Err(RetrievalError::unavailable("drug", "store missing"))
        }
    }

    #[test]
    fn returns_all_four_views() {
        let g = FixedGuidelines::new(&[0.95, 0.40]);
        let d = FixedDrugs::new(&[1.0]);
        let retriever = HybridRetriever::new(&g, &d);

        let params = HybridParams {
            k_guideline: 2,
            k_drug: 2,
            topn: 3,
            ..HybridParams::default()
        };
        let result = retriever
            .hybrid_search("阿司匹林禁忌症", &params)
            .expect("hybrid search");

        assert_eq!(result.query, "阿司匹林禁忌症");
        assert_eq!(result.guideline_hits.len(), 2);
        assert_eq!(result.drug_hits.len(), 1);
        let order: Vec<&str> = result.fused_hits.iter().map(|f| f.hit.id.as_str()).collect();
        assert_eq!(order, vec!["g1", "drug:1", "g2"]);
    }

    #[test]
    fn k_is_clamped_to_max_k() {
        let g = FixedGuidelines::new(&[0.9; 10]);
        let d = FixedDrugs::new(&[]);
        let retriever = HybridRetriever::new(&g, &d).with_max_k(4);

        let params = HybridParams {
            k_guideline: 50,
            ..HybridParams::default()
        };
        retriever.hybrid_search("q", &params).expect("search");
        assert_eq!(g.requested_k.get(), Some(4));

        let params = HybridParams {
            k_guideline: 0,
            ..HybridParams::default()
        };
        retriever.hybrid_search("q", &params).expect("search");
        assert_eq!(g.requested_k.get(), Some(1));
    }

    #[test]
    fn invalid_parameters_fail_before_providers_run() {
        let g = FixedGuidelines::new(&[0.9]);
        let d = FixedDrugs::new(&[0.9]);
        let retriever = HybridRetriever::new(&g, &d);

        let params = HybridParams {
            strategy: FusionStrategy::Rrf { k: -1.0 },
            ..HybridParams::default()
        };
        assert!(retriever.hybrid_search("q", &params).is_err());

        let params = HybridParams {
            topn: 0,
            ..HybridParams::default()
        };
        assert!(retriever.hybrid_search("q", &params).is_err());

        assert!(matches!(
            retriever.hybrid_search("   ", &HybridParams::default()),
            Err(RetrievalError::EmptyQuery)
        ));

        assert_eq!(g.requested_k.get(), None);
        assert!(d.queries.borrow().is_empty());
    }

    #[test]
    fn providers_receive_trimmed_query() {
        let g = FixedGuidelines::new(&[0.9]);
        let d = FixedDrugs::new(&[0.9]);
        HybridRetriever::new(&g, &d)
            .hybrid_search("  华法林  ", &HybridParams::default())
            .expect("search");
        assert_eq!(d.queries.borrow().as_slice(), ["华法林".to_string()]);
    }

    #[test]
    fn provider_errors_propagate() {
        let g = FixedGuidelines::new(&[0.9]);
        let retriever = HybridRetriever::new(&g, &Unavailable);

        let err = retriever
            .hybrid_search("q", &HybridParams::default())
            .expect_err("unavailable store");
        assert!(matches!(err, RetrievalError::ProviderUnavailable { provider: "drug", .. }));
    }
}
