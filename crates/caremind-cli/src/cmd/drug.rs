//! `caremind drug`: structured lookup of one drug record.

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use caremind_core::db::drugs::{DrugRecord, NameMatch};
use caremind_core::{ErrorCode, Settings};
use caremind_search::SqliteDrugProvider;
use caremind_search::relational::heuristic_score;
use clap::Args;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct DrugArgs {
    /// Drug name (Chinese or generic name).
    pub name: String,
}

/// Labels for the optional columns, in display order.
const FIELDS: [(&str, &str); 8] = [
    ("generic_name", "generic"),
    ("indications", "indications"),
    ("contraindications", "contra"),
    ("interactions", "interactions"),
    ("dosage", "dosage"),
    ("pregnancy_category", "pregnancy"),
    ("source", "source"),
    ("updated_at", "updated"),
];

#[derive(Debug, Serialize)]
struct DrugLookup {
    #[serde(rename = "match")]
    matched: &'static str,
    score: f32,
    record: DrugRecord,
}

/// Execute `caremind drug <name>`.
///
/// # Errors
///
/// Returns an error if the drug store is missing or no record matches.
pub fn run_drug(args: &DrugArgs, output: OutputMode, settings: &Settings) -> Result<()> {
    let provider = SqliteDrugProvider::open(&settings.drug_db)
        .with_context(|| format!("drug store {}", settings.drug_db.display()))?;

    let Some((record, matched)) = provider.find_record(&args.name)? else {
        return Err(CliError::coded(
            ErrorCode::DrugNotFound,
            format!("no drug matches '{}'", args.name.trim()),
        )
        .into());
    };

    let lookup = match matched {
        NameMatch::Exact => DrugLookup {
            matched: "exact",
            score: 1.0,
            record,
        },
        NameMatch::Substring => DrugLookup {
            matched: "substring",
            score: heuristic_score(&record, args.name.trim()),
            record,
        },
    };

    render_mode(output, &lookup, render_text, render_pretty)
}

fn render_text(lookup: &DrugLookup, w: &mut dyn Write) -> std::io::Result<()> {
    let record = &lookup.record;
    writeln!(w, "name\t{}", record.name)?;
    for (column, label) in FIELDS {
        if let Some(value) = record.field(column) {
            writeln!(w, "{label}\t{}", value.replace('\n', " "))?;
        }
    }
    writeln!(w, "match\t{}\t{:.2}", lookup.matched, lookup.score)
}

fn render_pretty(lookup: &DrugLookup, w: &mut dyn Write) -> std::io::Result<()> {
    let record = &lookup.record;
    pretty_section(w, &format!("{} (#{})", record.name, record.id))?;
    for (column, label) in FIELDS {
        if let Some(value) = record.field(column) {
            pretty_kv(w, label, value)?;
        }
    }
    if lookup.matched != "exact" {
        writeln!(w)?;
        writeln!(w, "(closest substring match, score {:.2})", lookup.score)?;
    }
    Ok(())
}
