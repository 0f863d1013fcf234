//! SQLite-backed drug provider.
//!
//! Search goes through the trigram FTS index when it exists and the query is
//! long enough to form a trigram; otherwise it falls back to a substring
//! scan. Either way, hits keep the store's order and are scored with
//! [`heuristic_score`].

use crate::provider::{RelationalSearchProvider, validate_query};
use anyhow::{Context, Result};
use caremind_core::db::drugs::{self, DrugRecord, NameMatch, SEARCH_FIELDS};
use caremind_core::db::open_existing;
use caremind_core::{Hit, HitMeta, HitSource, MetaValue, RetrievalError};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

const PROVIDER: &str = "drug";

/// Shortest query the trigram tokenizer can match.
const MIN_FTS_CHARS: usize = 3;

/// Indication excerpt length in hit content.
const EXCERPT_CHARS: usize = 120;

/// Score floor for any keyword match.
const MIN_SCORE: f32 = 0.3;

/// Keyword search and name lookup over the `drugs` table.
pub struct SqliteDrugProvider {
    conn: Connection,
}

impl SqliteDrugProvider {
    #[must_use]
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open an existing drug store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file is missing or cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_existing(path).context("open drug store")?;
        Ok(Self::new(conn))
    }

    /// Full record lookup for callers that need every column.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup queries fail.
    pub fn find_record(&self, name: &str) -> Result<Option<(DrugRecord, NameMatch)>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        drugs::find_by_name(&self.conn, name)
    }

    fn records(&self, query: &str, k: usize) -> Result<Vec<DrugRecord>> {
        if query.chars().count() >= MIN_FTS_CHARS && drugs::has_fts(&self.conn)? {
            match drugs::search_fts(&self.conn, query, k) {
                Ok(records) => return Ok(records),
                Err(err) => warn!("drug FTS search failed, using substring scan: {err:#}"),
            }
        } else {
            debug!("drug search using substring scan");
        }
        drugs::search_substring(&self.conn, query, k)
    }
}

impl RelationalSearchProvider for SqliteDrugProvider {
    fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>, RetrievalError> {
        let query = validate_query(query)?;
        let records = self
            .records(query, k)
            .map_err(|err| RetrievalError::unavailable(PROVIDER, format!("{err:#}")))?;

        Ok(records
            .iter()
            .map(|record| drug_hit(record, heuristic_score(record, query)))
            .collect())
    }

    fn get_by_name(&self, name: &str) -> Result<Option<Hit>, RetrievalError> {
        let found = self
            .find_record(name)
            .map_err(|err| RetrievalError::unavailable(PROVIDER, format!("{err:#}")))?;

        Ok(found.map(|(record, how)| {
            let score = match how {
                NameMatch::Exact => 1.0,
                NameMatch::Substring => heuristic_score(&record, name.trim()),
            };
            drug_hit(&record, score)
        }))
    }
}

/// Keyword relevance of `record` for `query`.
///
/// Counts the search fields that contain `query` (case-sensitive), adds one
/// when the space-joined fields contain it, and divides by the field count
/// plus one. The result is floored at 0.3 and capped at 1.0.
#[must_use]
pub fn heuristic_score(record: &DrugRecord, query: &str) -> f32 {
    let values: Vec<&str> = SEARCH_FIELDS
        .iter()
        .map(|field| record.field(field).unwrap_or_default())
        .collect();

    let field_hits = values.iter().filter(|v| v.contains(query)).count();
    let in_haystack = usize::from(values.join(" ").contains(query));

    #[allow(clippy::cast_precision_loss)]
    let raw = (field_hits + in_haystack) as f32 / (SEARCH_FIELDS.len() + 1) as f32;
    raw.clamp(MIN_SCORE, 1.0)
}

/// Turn a record into a drug hit with id `drug:<row id>`.
#[must_use]
pub fn drug_hit(record: &DrugRecord, score: f32) -> Hit {
    let generic = record
        .generic_name
        .as_deref()
        .filter(|g| !g.trim().is_empty())
        .unwrap_or("-");
    let content = format!(
        "{}（{generic}）\n适应症: {}",
        record.name,
        excerpt(record.indications.as_deref(), EXCERPT_CHARS)
    );

    Hit::new(
        format!("drug:{}", record.id),
        content,
        drug_meta(record),
        score,
        HitSource::Drug,
    )
}

fn drug_meta(record: &DrugRecord) -> HitMeta {
    let mut extra = BTreeMap::new();
    extra.insert("id".to_string(), MetaValue::Int(record.id));
    for column in [
        "generic_name",
        "indications",
        "contraindications",
        "interactions",
        "dosage",
        "pregnancy_category",
        "updated_at",
    ] {
        if let Some(value) = record.field(column) {
            extra.insert(column.to_string(), MetaValue::from(value));
        }
    }

    HitMeta {
        title: Some(record.name.clone()),
        source_name: record.source.clone().filter(|s| !s.trim().is_empty()),
        year: None,
        extra,
    }
}

/// Single-line excerpt of at most `max_chars` characters plus an ellipsis,
/// or `-` when empty.
fn excerpt(text: Option<&str>, max_chars: usize) -> String {
    let flat = text.unwrap_or_default().replace('\n', " ");
    let flat = flat.trim();
    if flat.is_empty() {
        return "-".to_string();
    }
    if flat.chars().count() > max_chars {
        let mut cut: String = flat.chars().take(max_chars).collect();
        cut.push('…');
        cut
    } else {
        flat.to_string()
    }
}
