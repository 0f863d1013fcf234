//! Structured drug records.
//!
//! Lookups come in three shapes:
//! - [`search_fts`]: trigram FTS5 match ordered by BM25 (requires
//!   [`enable_fts`] to have run)
//! - [`search_substring`]: `LIKE` scan over [`SEARCH_FIELDS`]
//! - [`find_by_name`]: exact `name`/`generic_name` match, else the shortest
//!   name containing the query

use super::schema;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

/// Fields scanned by substring search and scored by the relevance heuristic.
pub const SEARCH_FIELDS: [&str; 5] = [
    "name",
    "generic_name",
    "indications",
    "contraindications",
    "interactions",
];

const SELECT_COLUMNS: &str = "d.id, d.name, d.generic_name, d.indications, d.contraindications, \
                              d.interactions, d.dosage, d.pregnancy_category, d.source, d.updated_at";

/// A row of the `drugs` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugRecord {
    pub id: i64,
    pub name: String,
    pub generic_name: Option<String>,
    pub indications: Option<String>,
    pub contraindications: Option<String>,
    pub interactions: Option<String>,
    pub dosage: Option<String>,
    pub pregnancy_category: Option<String>,
    pub source: Option<String>,
    pub updated_at: Option<String>,
}

impl DrugRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            generic_name: row.get(2)?,
            indications: row.get(3)?,
            contraindications: row.get(4)?,
            interactions: row.get(5)?,
            dosage: row.get(6)?,
            pregnancy_category: row.get(7)?,
            source: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// Value of a named column, `None` when unset or unknown.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "name" => Some(self.name.as_str()),
            "generic_name" => self.generic_name.as_deref(),
            "indications" => self.indications.as_deref(),
            "contraindications" => self.contraindications.as_deref(),
            "interactions" => self.interactions.as_deref(),
            "dosage" => self.dosage.as_deref(),
            "pregnancy_category" => self.pregnancy_category.as_deref(),
            "source" => self.source.as_deref(),
            "updated_at" => self.updated_at.as_deref(),
            _ => None,
        }
    }
}

/// Incoming values for an upsert. Only `Some` non-empty values overwrite
/// what is already stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrugUpsert {
    pub name: String,
    pub generic_name: Option<String>,
    pub indications: Option<String>,
    pub contraindications: Option<String>,
    pub interactions: Option<String>,
    pub dosage: Option<String>,
    pub pregnancy_category: Option<String>,
    pub source: Option<String>,
}

impl DrugUpsert {
    /// Set a canonical column. Returns `false` for unknown columns.
    pub fn set(&mut self, column: &str, value: String) -> bool {
        let slot = match column {
            "name" => {
                self.name = value;
                return true;
            }
            "generic_name" => &mut self.generic_name,
            "indications" => &mut self.indications,
            "contraindications" => &mut self.contraindications,
            "interactions" => &mut self.interactions,
            "dosage" => &mut self.dosage,
            "pregnancy_category" => &mut self.pregnancy_category,
            "source" => &mut self.source,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Whether a canonical column already holds a value.
    #[must_use]
    pub fn is_set(&self, column: &str) -> bool {
        match column {
            "name" => !self.name.is_empty(),
            "generic_name" => self.generic_name.is_some(),
            "indications" => self.indications.is_some(),
            "contraindications" => self.contraindications.is_some(),
            "interactions" => self.interactions.is_some(),
            "dosage" => self.dosage.is_some(),
            "pregnancy_category" => self.pregnancy_category.is_some(),
            "source" => self.source.is_some(),
            _ => false,
        }
    }
}

/// Whether an upsert created or changed a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Insert a drug or merge non-empty values into the existing row with the
/// same name.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub fn upsert_drug(conn: &Connection, drug: &DrugUpsert) -> Result<UpsertOutcome> {
    let existed = conn
        .query_row(
            "SELECT 1 FROM drugs WHERE name = ?1",
            params![drug.name],
            |_| Ok(()),
        )
        .optional()
        .with_context(|| format!("look up drug '{}'", drug.name))?
        .is_some();

    conn.execute(
        "INSERT INTO drugs (
            name, generic_name, indications, contraindications, interactions,
            dosage, pregnancy_category, source, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)
         ON CONFLICT(name) DO UPDATE SET
            generic_name = COALESCE(NULLIF(excluded.generic_name, ''), drugs.generic_name),
            indications = COALESCE(NULLIF(excluded.indications, ''), drugs.indications),
            contraindications = COALESCE(NULLIF(excluded.contraindications, ''), drugs.contraindications),
            interactions = COALESCE(NULLIF(excluded.interactions, ''), drugs.interactions),
            dosage = COALESCE(NULLIF(excluded.dosage, ''), drugs.dosage),
            pregnancy_category = COALESCE(NULLIF(excluded.pregnancy_category, ''), drugs.pregnancy_category),
            source = COALESCE(NULLIF(excluded.source, ''), drugs.source),
            updated_at = CURRENT_TIMESTAMP",
        params![
            drug.name,
            drug.generic_name,
            drug.indications,
            drug.contraindications,
            drug.interactions,
            drug.dosage,
            drug.pregnancy_category,
            drug.source,
        ],
    )
    .with_context(|| format!("upsert drug '{}'", drug.name))?;

    Ok(if existed {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

/// Whether the `drugs_fts` index exists.
///
/// # Errors
///
/// Returns an error if `sqlite_master` cannot be queried.
pub fn has_fts(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'drugs_fts')",
        [],
        |row| row.get(0),
    )
    .context("check for drugs_fts table")
}

/// Create the trigram FTS5 index and its sync triggers, then rebuild it from
/// the current rows.
///
/// # Errors
///
/// Returns an error if FTS5 or the trigram tokenizer is unavailable.
pub fn enable_fts(conn: &Connection) -> Result<()> {
    conn.execute_batch(schema::FTS_SQL)
        .context("create drugs_fts index and triggers")
}

/// Full-text search ordered by BM25 (best first).
///
/// The query is matched as a single phrase, so it needs at least three
/// characters to produce trigram matches.
///
/// # Errors
///
/// Returns an error if the FTS index is missing or the query fails.
pub fn search_fts(conn: &Connection, query: &str, limit: usize) -> Result<Vec<DrugRecord>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS}
         FROM drugs_fts f
         INNER JOIN drugs d ON d.id = f.rowid
         WHERE drugs_fts MATCH ?1
         ORDER BY bm25(drugs_fts) ASC, d.id ASC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql).context("prepare drug FTS query")?;
    let rows = stmt
        .query_map(params![fts_phrase(query), sql_limit(limit)], DrugRecord::from_row)
        .with_context(|| format!("execute drug FTS search for '{query}'"))?;

    collect_rows(rows)
}

/// Substring scan over [`SEARCH_FIELDS`], in row order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn search_substring(conn: &Connection, query: &str, limit: usize) -> Result<Vec<DrugRecord>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS}
         FROM drugs d
         WHERE d.name LIKE ?1 ESCAPE '\\'
            OR d.generic_name LIKE ?1 ESCAPE '\\'
            OR d.indications LIKE ?1 ESCAPE '\\'
            OR d.contraindications LIKE ?1 ESCAPE '\\'
            OR d.interactions LIKE ?1 ESCAPE '\\'
         ORDER BY d.id ASC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql).context("prepare drug substring query")?;
    let rows = stmt
        .query_map(params![like_pattern(query), sql_limit(limit)], DrugRecord::from_row)
        .with_context(|| format!("execute drug substring search for '{query}'"))?;

    collect_rows(rows)
}

/// How a [`find_by_name`] result was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    Exact,
    Substring,
}

/// Look up one drug by name: exact `name`/`generic_name` first, else the
/// shortest `name` among substring matches.
///
/// # Errors
///
/// Returns an error if either query fails.
pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<(DrugRecord, NameMatch)>> {
    let exact_sql = format!(
        "SELECT {SELECT_COLUMNS} FROM drugs d
         WHERE d.name = ?1 OR d.generic_name = ?1
         ORDER BY (d.name = ?1) DESC, d.id ASC
         LIMIT 1"
    );
    let exact = conn
        .query_row(&exact_sql, params![name], DrugRecord::from_row)
        .optional()
        .with_context(|| format!("exact drug lookup for '{name}'"))?;
    if let Some(record) = exact {
        return Ok(Some((record, NameMatch::Exact)));
    }

    let fuzzy_sql = format!(
        "SELECT {SELECT_COLUMNS} FROM drugs d
         WHERE d.name LIKE ?1 ESCAPE '\\' OR d.generic_name LIKE ?1 ESCAPE '\\'
         ORDER BY LENGTH(d.name) ASC, d.id ASC
         LIMIT 1"
    );
    let fuzzy = conn
        .query_row(&fuzzy_sql, params![like_pattern(name)], DrugRecord::from_row)
        .optional()
        .with_context(|| format!("substring drug lookup for '{name}'"))?;

    Ok(fuzzy.map(|record| (record, NameMatch::Substring)))
}

/// Number of stored drugs.
///
/// # Errors
///
/// Returns an error if the count query fails.
pub fn drug_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM drugs", [], |row| row.get(0))
        .context("count drugs")?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Quote `query` as one FTS5 phrase so operators in user text are inert.
#[must_use]
pub fn fts_phrase(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

/// `%query%` with `LIKE` wildcards escaped.
#[must_use]
pub fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<DrugRecord>>,
) -> Result<Vec<DrugRecord>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("read drug row")?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
