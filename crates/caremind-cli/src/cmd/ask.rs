//! `caremind ask`: templated, citation-annotated answer.

use crate::output::{OutputMode, pretty_kv, pretty_section, render, render_mode};
use anyhow::{Context as _, Result};
use caremind_core::{Hit, Settings};
use caremind_search::answer::{
    AnswerBundle, EvidenceFilter, SourceCount, draft, evidence_markdown, link_citations,
    render_prompt, source_counts,
};
use caremind_search::{Backends, Lang};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use tracing::warn;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// The clinical question.
    pub question: String,

    /// Drug to look up alongside the guideline evidence.
    #[arg(long, value_name = "NAME")]
    pub drug: Option<String>,

    /// Number of guideline snippets (clamped to 1..=max_k).
    #[arg(short = 'k', long)]
    pub k: Option<usize>,

    /// Answer language.
    #[arg(long, default_value = "zh", value_name = "zh|en")]
    pub lang: Lang,

    /// Propagate retrieval failures instead of answering in demo mode.
    #[arg(long)]
    pub strict: bool,

    /// Print the model prompt built from the evidence instead of the draft.
    #[arg(long)]
    pub print_prompt: bool,

    /// Keep only evidence whose source contains this text.
    #[arg(long, value_name = "TEXT")]
    pub source: Option<String>,

    /// Keep only evidence published in or after this year.
    #[arg(long, value_name = "YEAR")]
    pub year_min: Option<i32>,

    /// Keep only evidence published in or before this year.
    #[arg(long, value_name = "YEAR")]
    pub year_max: Option<i32>,

    /// Append the evidence as markdown and link the citations to it.
    #[arg(long)]
    pub evidence: bool,
}

impl AskArgs {
    fn filter(&self) -> EvidenceFilter {
        EvidenceFilter {
            source_contains: self.source.clone(),
            year_min: self.year_min,
            year_max: self.year_max,
        }
    }
}

#[derive(Debug, Serialize)]
struct AskOutput {
    #[serde(flatten)]
    bundle: AnswerBundle,
    sources: Vec<SourceCount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stand_ins: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    evidence_markdown: Option<String>,
}

/// Execute `caremind ask`.
///
/// # Errors
///
/// Returns an error if the stores cannot be opened (outside demo mode), the
/// question is blank, or retrieval fails under `--strict`.
pub fn run_ask(args: &AskArgs, output: OutputMode, settings: &Settings) -> Result<()> {
    let backends = Backends::from_settings(settings)?;
    for provider in backends.stand_ins() {
        warn!(provider, "store unavailable, using the demo stand-in");
    }

    let k = args.k.unwrap_or(settings.retrieval.k_guideline);
    let mut bundle = backends
        .pipeline(args.strict)
        .answer(&args.question, args.drug.as_deref(), k, args.lang)
        .context("answer question")?;

    let filter = args.filter();
    if !filter.is_empty() && !bundle.demo {
        bundle.guideline_hits = filter.apply(&bundle.guideline_hits);
        bundle.output = draft(
            &args.question,
            args.drug.as_deref(),
            &bundle.guideline_hits,
            args.lang,
        );
    }

    if args.print_prompt {
        let prompt = render_prompt(
            &args.question,
            bundle.k,
            &bundle.guideline_hits,
            bundle.drug.as_ref(),
        );
        return render(output, &prompt, |p, w| {
            writeln!(w, "{}", p.system)?;
            writeln!(w)?;
            writeln!(w, "{}", p.user)
        });
    }

    let markdown = args
        .evidence
        .then(|| evidence_markdown(&bundle.guideline_hits, args.lang));
    if markdown.is_some() {
        bundle.output = link_citations(&bundle.output);
    }

    let report = AskOutput {
        sources: source_counts(&bundle.guideline_hits, args.lang),
        stand_ins: backends.stand_ins().to_vec(),
        evidence_markdown: markdown,
        bundle,
    };

    render_mode(output, &report, render_text, render_pretty)
}

fn render_text(report: &AskOutput, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{}", report.bundle.output)?;
    if let Some(markdown) = &report.evidence_markdown {
        writeln!(w)?;
        write!(w, "{markdown}")?;
    }
    Ok(())
}

fn render_pretty(report: &AskOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let bundle = &report.bundle;
    let heading = match bundle.lang {
        Lang::Zh => "回答",
        Lang::En => "Answer",
    };
    pretty_section(w, heading)?;
    writeln!(w, "{}", bundle.output)?;
    writeln!(w)?;

    pretty_section(w, "Retrieval")?;
    pretty_kv(w, "k", bundle.k.to_string())?;
    pretty_kv(w, "demo", bundle.demo.to_string())?;
    pretty_kv(w, "drug", bundle.drug.as_ref().map_or("-", drug_title))?;
    if !report.stand_ins.is_empty() {
        pretty_kv(w, "stand-ins", report.stand_ins.join(", "))?;
    }
    for count in &report.sources {
        pretty_kv(w, "source", format!("{} ({})", count.source, count.hits))?;
    }

    if let Some(markdown) = &report.evidence_markdown {
        writeln!(w)?;
        pretty_section(w, "Evidence")?;
        write!(w, "{markdown}")?;
    }
    Ok(())
}

fn drug_title(hit: &Hit) -> &str {
    hit.meta.title.as_deref().unwrap_or(&hit.id)
}
