//! SQLite schema for the drug and guideline stores.
//!
//! - `drugs` holds one structured record per drug, unique by `name`
//! - `drugs_fts` is an optional external-content FTS5 index over the
//!   searchable drug fields, created on demand by [`FTS_SQL`]
//! - `guideline_chunks` holds embedded guideline text per collection

/// Migration v1: drug table.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS drugs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
    generic_name TEXT,
    indications TEXT,
    contraindications TEXT,
    interactions TEXT,
    dosage TEXT,
    pregnancy_category TEXT,
    source TEXT,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_drugs_generic_name
    ON drugs(generic_name);
";

/// Migration v2: embedded guideline chunks.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS guideline_chunks (
    collection TEXT NOT NULL CHECK (length(trim(collection)) > 0),
    chunk_id TEXT NOT NULL,
    content TEXT NOT NULL,
    meta_json TEXT NOT NULL DEFAULT '{}',
    content_hash TEXT NOT NULL,
    embedding_json TEXT NOT NULL,
    dimension INTEGER NOT NULL CHECK (dimension > 0),
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (collection, chunk_id)
);

CREATE INDEX IF NOT EXISTS idx_guideline_chunks_collection
    ON guideline_chunks(collection);
";

/// Optional trigram FTS5 index over the searchable drug fields.
///
/// Trigram tokenization matches arbitrary substrings of three or more
/// characters, which covers CJK text without a word segmenter.
pub const FTS_SQL: &str = r"
CREATE VIRTUAL TABLE IF NOT EXISTS drugs_fts USING fts5(
    name,
    generic_name,
    indications,
    contraindications,
    interactions,
    content='drugs',
    content_rowid='id',
    tokenize='trigram'
);

CREATE TRIGGER IF NOT EXISTS drugs_fts_ai
AFTER INSERT ON drugs
BEGIN
    INSERT INTO drugs_fts(rowid, name, generic_name, indications, contraindications, interactions)
    VALUES (new.id, new.name, new.generic_name, new.indications, new.contraindications, new.interactions);
END;

CREATE TRIGGER IF NOT EXISTS drugs_fts_ad
AFTER DELETE ON drugs
BEGIN
    INSERT INTO drugs_fts(drugs_fts, rowid, name, generic_name, indications, contraindications, interactions)
    VALUES ('delete', old.id, old.name, old.generic_name, old.indications, old.contraindications, old.interactions);
END;

CREATE TRIGGER IF NOT EXISTS drugs_fts_au
AFTER UPDATE ON drugs
BEGIN
    INSERT INTO drugs_fts(drugs_fts, rowid, name, generic_name, indications, contraindications, interactions)
    VALUES ('delete', old.id, old.name, old.generic_name, old.indications, old.contraindications, old.interactions);
    INSERT INTO drugs_fts(rowid, name, generic_name, indications, contraindications, interactions)
    VALUES (new.id, new.name, new.generic_name, new.indications, new.contraindications, new.interactions);
END;

INSERT INTO drugs_fts(drugs_fts) VALUES ('rebuild');
";

/// Indexes every migrated database must have.
pub const REQUIRED_INDEXES: &[&str] = &["idx_drugs_generic_name", "idx_guideline_chunks_collection"];
