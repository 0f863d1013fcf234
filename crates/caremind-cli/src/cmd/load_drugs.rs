//! `caremind load-drugs`: upsert drug records from JSON lines.

use super::open_jsonl;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use caremind_core::Settings;
use caremind_core::db::{drugs, open_store};
use caremind_core::ingest::{DrugIngestReport, load_drugs_jsonl};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct LoadDrugsArgs {
    /// JSON-lines file with one drug object per line (`-` for stdin).
    #[arg(value_name = "JSONL")]
    pub input: PathBuf,

    /// Build (or rebuild) the full-text index after loading.
    #[arg(long)]
    pub with_fts: bool,

    /// Abort on the first malformed or nameless record.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Serialize)]
struct LoadDrugsOutput {
    store: PathBuf,
    #[serde(flatten)]
    report: DrugIngestReport,
    total: u64,
    fts: bool,
}

/// Execute `caremind load-drugs <jsonl>`.
///
/// # Errors
///
/// Returns an error if the input cannot be read, the store cannot be opened,
/// or a record is invalid under `--strict`.
pub fn run_load_drugs(args: &LoadDrugsArgs, output: OutputMode, settings: &Settings) -> Result<()> {
    let reader = open_jsonl(&args.input)?;
    let store = settings.drug_db.clone();
    let mut conn =
        open_store(&store).with_context(|| format!("drug store {}", store.display()))?;

    let report = load_drugs_jsonl(&mut conn, reader, args.strict)
        .with_context(|| format!("load {}", args.input.display()))?;

    if args.with_fts {
        drugs::enable_fts(&conn).context("build drug FTS index")?;
        info!("drug FTS index ready");
    }

    let result = LoadDrugsOutput {
        total: drugs::drug_count(&conn)?,
        fts: drugs::has_fts(&conn)?,
        store,
        report,
    };
    render_mode(output, &result, render_text, render_pretty)
}

fn render_text(result: &LoadDrugsOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let report = &result.report;
    writeln!(
        w,
        "lines={} inserted={} updated={} skipped={} total={} fts={}",
        report.lines, report.inserted, report.updated, report.skipped, result.total, result.fts
    )
}

fn render_pretty(result: &LoadDrugsOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let report = &result.report;
    pretty_section(w, "Drug ingest")?;
    pretty_kv(w, "store", result.store.display().to_string())?;
    pretty_kv(w, "lines", report.lines.to_string())?;
    pretty_kv(w, "inserted", report.inserted.to_string())?;
    pretty_kv(w, "updated", report.updated.to_string())?;
    pretty_kv(w, "skipped", report.skipped.to_string())?;
    pretty_kv(w, "total", result.total.to_string())?;
    pretty_kv(w, "fts", if result.fts { "yes" } else { "no" })
}
