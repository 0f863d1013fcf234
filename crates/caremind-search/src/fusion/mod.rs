//! Fusion of guideline and drug hit lists into one ranking.
//!
//! Two strategies:
//!
//! | Strategy | Fused score | Sensitive to score scale |
//! |----------|-------------|--------------------------|
//! | Linear   | `alpha * score` (guideline), `(1 - alpha) * score` (drug) | yes |
//! | RRF      | `sum 1 / (k + rank)` over the lists an identity appears in | no |
//!
//! Both are deterministic, never call a provider, accept empty inputs, and
//! emit at most one entry per `(source, id)`.

pub mod hybrid;
mod linear;
mod rrf;

pub use hybrid::{HybridParams, HybridRetriever, HybridSearchResult};

use caremind_core::config::{RetrievalSettings, StrategyKind};
use caremind_core::{FusedHit, Hit, RetrievalError};
use serde::Serialize;
use std::fmt;

/// Default weight of the guideline list in linear fusion.
pub const DEFAULT_ALPHA: f32 = 0.6;

/// Default RRF damping constant.
pub const DEFAULT_K_RRF: f32 = 60.0;

/// How two ranked lists are merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum FusionStrategy {
    /// Weighted sum; `alpha` weights guideline scores, `1 - alpha` drug scores.
    Linear { alpha: f32 },
    /// Reciprocal rank fusion with damping constant `k`.
    Rrf { k: f32 },
}

impl Default for FusionStrategy {
    fn default() -> Self {
        Self::Linear {
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl fmt::Display for FusionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear { alpha } => write!(f, "linear(alpha={alpha})"),
            Self::Rrf { k } => write!(f, "rrf(k={k})"),
        }
    }
}

impl FusionStrategy {
    /// Build from a strategy name plus both parameters; the unused one is
    /// ignored.
    #[must_use]
    pub const fn from_parts(kind: StrategyKind, alpha: f32, k_rrf: f32) -> Self {
        match kind {
            StrategyKind::Linear => Self::Linear { alpha },
            StrategyKind::Rrf => Self::Rrf { k: k_rrf },
        }
    }

    #[must_use]
    pub const fn from_settings(settings: &RetrievalSettings) -> Self {
        Self::from_parts(settings.strategy, settings.alpha, settings.k_rrf)
    }

    #[must_use]
    pub const fn kind(self) -> StrategyKind {
        match self {
            Self::Linear { .. } => StrategyKind::Linear,
            Self::Rrf { .. } => StrategyKind::Rrf,
        }
    }

    /// Check the strategy parameter.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidParameter`] when `alpha` is outside `[0, 1]`
    /// or `k` is not a finite positive number.
    pub fn validate(self) -> Result<Self, RetrievalError> {
        match self {
            Self::Linear { alpha } if !(0.0..=1.0).contains(&alpha) => Err(
                RetrievalError::invalid("alpha", alpha, "must be within [0, 1]"),
            ),
            Self::Rrf { k } if !k.is_finite() || k <= 0.0 => Err(RetrievalError::invalid(
                "k_rrf",
                k,
                "must be a finite number > 0",
            )),
            _ => Ok(self),
        }
    }

    /// Merge the two lists and keep the best `topn`.
    ///
    /// Parameters are validated before any work is done.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidParameter`] for an invalid strategy
    /// parameter or `topn == 0`.
    pub fn fuse(
        self,
        guideline: &[Hit],
        drug: &[Hit],
        topn: usize,
    ) -> Result<Vec<FusedHit>, RetrievalError> {
        validate_topn(topn)?;
        match self.validate()? {
            Self::Linear { alpha } => Ok(linear::fuse_linear(guideline, drug, alpha, topn)),
            Self::Rrf { k } => Ok(rrf::fuse_rrf(guideline, drug, k, topn)),
        }
    }
}

/// # Errors
///
/// [`RetrievalError::InvalidParameter`] when `topn` is zero.
pub fn validate_topn(topn: usize) -> Result<(), RetrievalError> {
    if topn == 0 {
        Err(RetrievalError::invalid("topn", topn, "must be >= 1"))
    } else {
        Ok(())
    }
}

/// Stable descending sort by fused score.
fn sort_by_fused_desc(hits: &mut [FusedHit]) {
    hits.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score));
}
