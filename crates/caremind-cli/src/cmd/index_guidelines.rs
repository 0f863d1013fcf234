//! `caremind index-guidelines`: embed and store guideline chunks.

use super::open_jsonl;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use caremind_core::Settings;
use caremind_core::db::open_store;
use caremind_search::semantic::{
    CollectionCount, HashEmbedder, IndexReport, collection_counts, index_guidelines_jsonl,
};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct IndexGuidelinesArgs {
    /// JSON-lines file with one `{content, meta}` chunk per line (`-` for stdin).
    #[arg(value_name = "JSONL")]
    pub input: PathBuf,

    /// Target collection (defaults to the configured collection).
    #[arg(long)]
    pub collection: Option<String>,
}

#[derive(Debug, Serialize)]
struct IndexOutput {
    store: PathBuf,
    collection: String,
    dimension: usize,
    #[serde(flatten)]
    report: IndexReport,
    collections: Vec<CollectionCount>,
}

/// Execute `caremind index-guidelines <jsonl>`.
///
/// # Errors
///
/// Returns an error if the input cannot be read, the store cannot be opened,
/// or embedding and storage fail.
pub fn run_index_guidelines(
    args: &IndexGuidelinesArgs,
    output: OutputMode,
    settings: &Settings,
) -> Result<()> {
    let collection = args
        .collection
        .clone()
        .unwrap_or_else(|| settings.collection.clone());
    let reader = open_jsonl(&args.input)?;
    let store = settings.guideline_db.clone();
    let mut conn =
        open_store(&store).with_context(|| format!("guideline store {}", store.display()))?;

    let embedder = HashEmbedder::new(settings.embedding_dim);
    let report = index_guidelines_jsonl(&mut conn, &embedder, &collection, reader)
        .with_context(|| format!("index {}", args.input.display()))?;

    let result = IndexOutput {
        collections: collection_counts(&conn)?,
        dimension: settings.embedding_dim,
        store,
        collection,
        report,
    };
    render_mode(output, &result, render_text, render_pretty)
}

fn render_text(result: &IndexOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let report = &result.report;
    writeln!(
        w,
        "collection={} lines={} inserted={} updated={} unchanged={} skipped={}",
        result.collection,
        report.lines,
        report.inserted,
        report.updated,
        report.unchanged,
        report.skipped
    )
}

fn render_pretty(result: &IndexOutput, w: &mut dyn Write) -> std::io::Result<()> {
    let report = &result.report;
    pretty_section(w, "Guideline index")?;
    pretty_kv(w, "store", result.store.display().to_string())?;
    pretty_kv(w, "collection", &result.collection)?;
    pretty_kv(w, "dimension", result.dimension.to_string())?;
    pretty_kv(w, "lines", report.lines.to_string())?;
    pretty_kv(w, "inserted", report.inserted.to_string())?;
    pretty_kv(w, "updated", report.updated.to_string())?;
    pretty_kv(w, "unchanged", report.unchanged.to_string())?;
    pretty_kv(w, "skipped", report.skipped.to_string())?;

    writeln!(w)?;
    pretty_section(w, "Collections")?;
    for count in &result.collections {
        writeln!(w, "{:<24} {}", count.collection, count.chunks)?;
    }
    Ok(())
}
