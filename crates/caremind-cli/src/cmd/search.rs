//! `caremind search`: one hybrid query, all four views.
//!
//! Guideline hits come from vector KNN over the chunk index, drug hits from
//! the drug store (FTS when built, substring scan otherwise), and the fused
//! list from the configured strategy unless overridden by flags.

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use caremind_core::config::StrategyKind;
use caremind_core::{FusedHit, Hit, Settings};
use caremind_search::{Backends, FusionStrategy, HybridParams, HybridSearchResult};
use clap::Args;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query.
    pub query: String,

    /// Guideline hits to retrieve.
    #[arg(long)]
    pub k_guideline: Option<usize>,

    /// Drug hits to retrieve.
    #[arg(long)]
    pub k_drug: Option<usize>,

    /// Fusion strategy.
    #[arg(long, value_name = "linear|rrf")]
    pub strategy: Option<StrategyKind>,

    /// Guideline weight for linear fusion, within [0, 1].
    #[arg(long)]
    pub alpha: Option<f32>,

    /// Damping constant for reciprocal rank fusion.
    #[arg(long)]
    pub k_rrf: Option<f32>,

    /// Length of the fused list.
    #[arg(long)]
    pub topn: Option<usize>,
}

impl SearchArgs {
    /// Configured retrieval parameters with flag overrides applied.
    fn params(&self, settings: &Settings) -> HybridParams {
        let defaults = &settings.retrieval;
        HybridParams {
            k_guideline: self.k_guideline.unwrap_or(defaults.k_guideline),
            k_drug: self.k_drug.unwrap_or(defaults.k_drug),
            strategy: FusionStrategy::from_parts(
                self.strategy.unwrap_or(defaults.strategy),
                self.alpha.unwrap_or(defaults.alpha),
                self.k_rrf.unwrap_or(defaults.k_rrf),
            ),
            topn: self.topn.unwrap_or(defaults.topn),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchOutput {
    fusion: FusionStrategy,
    #[serde(flatten)]
    result: HybridSearchResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stand_ins: Vec<&'static str>,
}

/// Execute `caremind search <query>`.
///
/// # Errors
///
/// Returns an error if the stores cannot be opened (outside demo mode), the
/// query is blank, a parameter is out of range, or a provider fails.
pub fn run_search(args: &SearchArgs, output: OutputMode, settings: &Settings) -> Result<()> {
    let params = args.params(settings);
    let backends = Backends::from_settings(settings)?;
    let result = backends
        .retriever()
        .hybrid_search(&args.query, &params)
        .context("hybrid search")?;

    let report = SearchOutput {
        fusion: params.strategy,
        result,
        stand_ins: backends.stand_ins().to_vec(),
    };
    render_mode(output, &report, render_text, render_pretty)
}

fn title(hit: &Hit) -> &str {
    hit.meta.title.as_deref().unwrap_or("-")
}

fn render_text(report: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "rank\tsource\tid\tfused\tscore\ttitle")?;
    for (idx, fused) in report.result.fused_hits.iter().enumerate() {
        let FusedHit { hit, fused_score } = fused;
        writeln!(
            w,
            "{}\t{}\t{}\t{fused_score:.4}\t{:.4}\t{}",
            idx + 1,
            hit.source,
            hit.id,
            hit.score,
            title(hit)
        )?;
    }
    Ok(())
}

fn render_hits(w: &mut dyn Write, heading: &str, hits: &[Hit]) -> std::io::Result<()> {
    pretty_section(w, &format!("{heading} ({})", hits.len()))?;
    if hits.is_empty() {
        writeln!(w, "(none)")?;
    }
    for (idx, hit) in hits.iter().enumerate() {
        writeln!(w, "{:>2}. [{:.3}] {}  {}", idx + 1, hit.score, hit.id, title(hit))?;
    }
    writeln!(w)
}

fn render_pretty(report: &SearchOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let result = &report.result;
    pretty_section(w, "Search")?;
    pretty_kv(w, "query", &result.query)?;
    pretty_kv(w, "strategy", report.fusion.to_string())?;
    if !report.stand_ins.is_empty() {
        pretty_kv(w, "stand-ins", report.stand_ins.join(", "))?;
    }
    writeln!(w)?;

    render_hits(w, "Guideline hits", &result.guideline_hits)?;
    render_hits(w, "Drug hits", &result.drug_hits)?;

    pretty_section(w, &format!("Fused ({})", result.fused_hits.len()))?;
    if result.fused_hits.is_empty() {
        writeln!(w, "(none)")?;
    }
    for (idx, fused) in result.fused_hits.iter().enumerate() {
        writeln!(
            w,
            "{:>2}. [{:.4}] {:<9} {}  {}",
            idx + 1,
            fused.fused_score,
            fused.hit.source,
            fused.hit.id,
            title(&fused.hit)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(query: &str) -> SearchArgs {
        SearchArgs {
            query: query.to_string(),
            k_guideline: None,
            k_drug: None,
            strategy: None,
            alpha: None,
            k_rrf: None,
            topn: None,
        }
    }

    #[test]
    fn params_default_to_settings() {
        let params = args("q").params(&Settings::default());
        assert_eq!(params, HybridParams::default());
    }

    #[test]
    fn flags_override_settings() {
        let mut search = args("q");
        search.strategy = Some(StrategyKind::Rrf);
        search.k_rrf = Some(20.0);
        search.alpha = Some(0.1);
        search.topn = Some(3);

        let params = search.params(&Settings::default());
        assert_eq!(params.strategy, FusionStrategy::Rrf { k: 20.0 });
        assert_eq!(params.topn, 3);
        assert_eq!(params.k_guideline, 6);
    }

    #[test]
    fn alpha_flag_applies_to_linear_strategy() {
        let mut search = args("q");
        search.alpha = Some(0.25);
        let params = search.params(&Settings::default());
        assert_eq!(params.strategy, FusionStrategy::Linear { alpha: 0.25 });
    }
}
