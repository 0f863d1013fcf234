//! JSON-lines drug ingestion.
//!
//! Each line is one object. Keys are normalized (trimmed, lowercased,
//! separators folded to `_`) and mapped onto canonical `drugs` columns
//! through a bilingual alias table. Unknown keys are ignored.

use crate::db::drugs::{DrugUpsert, UpsertOutcome, upsert_drug};
use crate::error::StoreError;
use crate::hit::MetaValue;
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::io::BufRead;
use tracing::{info, warn};

/// Alias → canonical column. Keys are already normalized by [`normalize_key`].
const COLUMN_ALIASES: &[(&str, &str)] = &[
    // name
    ("name", "name"),
    ("drug", "name"),
    ("drug_name", "name"),
    ("drugname", "name"),
    ("药品名称", "name"),
    ("药物名称", "name"),
    ("通用名", "name"),
    ("通用名称", "name"),
    ("商品名", "name"),
    ("品名", "name"),
    // generic_name
    ("generic_name", "generic_name"),
    ("generic", "generic_name"),
    ("英文名", "generic_name"),
    // indications
    ("indications", "indications"),
    ("indication", "indications"),
    ("适应症", "indications"),
    // contraindications
    ("contraindications", "contraindications"),
    ("contraindication", "contraindications"),
    ("禁忌症", "contraindications"),
    ("禁忌", "contraindications"),
    // interactions
    ("interactions", "interactions"),
    ("drug_interactions", "interactions"),
    ("药物相互作用", "interactions"),
    ("相互作用", "interactions"),
    // dosage
    ("dosage", "dosage"),
    ("dose", "dosage"),
    ("用法用量", "dosage"),
    ("用量", "dosage"),
    // pregnancy_category
    ("pregnancy_category", "pregnancy_category"),
    ("pregnancy", "pregnancy_category"),
    ("妊娠分级", "pregnancy_category"),
    ("妊娠分类", "pregnancy_category"),
    ("妊娠用药分级", "pregnancy_category"),
    // source
    ("source", "source"),
    ("ref", "source"),
    ("reference", "source"),
    ("来源", "source"),
    ("信息来源", "source"),
    ("引用", "source"),
    ("参考文献", "source"),
];

const SEPARATORS: &[char] = &[
    ' ', '-', '（', '）', '(', ')', '：', ':', '/', '\\', '。', '，', ',',
];

/// Fold a raw column header into its lookup form.
#[must_use]
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .split(SEPARATORS)
        .flat_map(|part| part.split('_'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Canonical `drugs` column for a raw header, if known.
#[must_use]
pub fn canonical_column(raw: &str) -> Option<&'static str> {
    let key = normalize_key(raw);
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, column)| *column)
}

/// Map one JSON object onto a [`DrugUpsert`].
///
/// Keys that are already canonical win over aliases; among aliases the first
/// non-empty value wins. Returns `None` when no name is present.
#[must_use]
pub fn drug_from_json(object: &serde_json::Map<String, serde_json::Value>) -> Option<DrugUpsert> {
    let mut drug = DrugUpsert::default();

    let mut entries: Vec<(&'static str, bool, String)> = object
        .iter()
        .filter_map(|(key, value)| {
            let column = canonical_column(key)?;
            let text = MetaValue::from_json(value).as_nonempty_text()?;
            Some((column, normalize_key(key) == column, text))
        })
        .collect();
    // Exact canonical keys first; stable sort keeps alias order otherwise.
    entries.sort_by_key(|(_, exact, _)| !*exact);

    for (column, _, text) in entries {
        if !drug.is_set(column) {
            drug.set(column, text);
        }
    }

    if drug.name.is_empty() {
        None
    } else {
        Some(drug)
    }
}

/// Counters for one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrugIngestReport {
    pub lines: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Stream JSON-lines drug records into the store inside one transaction.
///
/// Blank lines are ignored. Malformed lines and records without a name are
/// skipped with a warning, or abort the run when `strict` is set.
///
/// # Errors
///
/// Returns an error on I/O or SQLite failure, or on the first bad record in
/// strict mode.
pub fn load_drugs_jsonl<R: BufRead>(
    conn: &mut Connection,
    reader: R,
    strict: bool,
) -> Result<DrugIngestReport> {
    let tx = conn.transaction().context("begin drug ingest transaction")?;
    let mut report = DrugIngestReport::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        report.lines += 1;

        let parsed = serde_json::from_str::<serde_json::Value>(trimmed)
            .map_err(|err| format!("invalid JSON: {err}"))
            .and_then(|value| match value {
                serde_json::Value::Object(object) => Ok(object),
                _ => Err("expected a JSON object".to_string()),
            })
            .and_then(|object| drug_from_json(&object).ok_or_else(|| "missing drug name".to_string()));

        let drug = match parsed {
            Ok(drug) => drug,
            Err(reason) => {
                if strict {
                    return Err(StoreError::InvalidRecord {
                        line: line_no,
                        reason,
                    }
                    .into());
                }
                warn!(line = line_no, "skipping drug record: {reason}");
                report.skipped += 1;
                continue;
            }
        };

        match upsert_drug(&tx, &drug)? {
            UpsertOutcome::Inserted => report.inserted += 1,
            UpsertOutcome::Updated => report.updated += 1,
        }
    }

    tx.commit().context("commit drug ingest")?;
    info!(
        lines = report.lines,
        inserted = report.inserted,
        updated = report.updated,
        skipped = report.skipped,
        "drug ingest finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::drugs::{drug_count, find_by_name};
    use crate::db::migrations;
    use serde_json::json;

    fn test_db() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut conn).expect("migrate");
        conn
    }

    fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn normalize_key_folds_separators_and_case() {
        assert_eq!(normalize_key(" Drug Name "), "drug_name");
        assert_eq!(normalize_key("Pregnancy-Category"), "pregnancy_category");
        assert_eq!(normalize_key("适应症（成人）"), "适应症_成人");
        assert_eq!(normalize_key("__a__b__"), "a_b");
    }

    #[test]
    fn chinese_headers_map_to_canonical_columns() {
        assert_eq!(canonical_column("药品名称"), Some("name"));
        assert_eq!(canonical_column("禁忌"), Some("contraindications"));
        assert_eq!(canonical_column("相互作用"), Some("interactions"));
        assert_eq!(canonical_column("妊娠分级"), Some("pregnancy_category"));
        assert_eq!(canonical_column("来源"), Some("source"));
        assert_eq!(canonical_column("Reference"), Some("source"));
        assert_eq!(canonical_column("备注"), None);
    }

    #[test]
    fn drug_from_json_prefers_canonical_keys() {
        let drug = drug_from_json(&object(json!({
            "药品名称": "阿司匹林肠溶片",
            "name": "阿司匹林",
            "适应症": "抗血小板",
            "备注": "ignored",
        })))
        .expect("has name");

        assert_eq!(drug.name, "阿司匹林");
        assert_eq!(drug.indications.as_deref(), Some("抗血小板"));
    }

    #[test]
    fn drug_from_json_requires_a_name() {
        assert!(drug_from_json(&object(json!({"适应症": "发热"}))).is_none());
        assert!(drug_from_json(&object(json!({"name": "  "}))).is_none());
    }

    #[test]
    fn load_skips_bad_lines_when_lenient() {
        let mut conn = test_db();
        let input = concat!(
            "{\"药品名称\": \"阿司匹林\", \"禁忌症\": \"活动性溃疡\"}\n",
            "\n",
            "not json\n",
            "{\"适应症\": \"no name\"}\n",
            "{\"name\": \"阿司匹林\", \"妊娠分级\": \"D\"}\n",
        );

        let report = load_drugs_jsonl(&mut conn, input.as_bytes(), false).expect("ingest");
        assert_eq!(
            report,
            DrugIngestReport {
                lines: 4,
                inserted: 1,
                updated: 1,
                skipped: 2,
            }
        );

        let (record, _) = find_by_name(&conn, "阿司匹林").expect("lookup").expect("hit");
        assert_eq!(record.contraindications.as_deref(), Some("活动性溃疡"));
        assert_eq!(record.pregnancy_category.as_deref(), Some("D"));
    }

    #[test]
    fn strict_load_aborts_without_partial_writes() {
        let mut conn = test_db();
        let input = "{\"name\": \"布洛芬\"}\n[1, 2]\n";

        let err = load_drugs_jsonl(&mut conn, input.as_bytes(), true).expect_err("strict fails");
        assert!(err.to_string().contains("line 2"));
        assert_eq!(drug_count(&conn).expect("count"), 0);
    }
}
