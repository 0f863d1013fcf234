//! Guideline chunk indexing.
//!
//! Chunks arrive as JSON lines `{"content": "...", "meta": {...}}`. Each gets
//! a stable id, sanitized metadata and an embedding. Chunks whose content
//! hash is unchanged since the last run are not re-embedded.

use super::embed::Embedder;
use super::search::encode_embedding_json;
use anyhow::{Context, Result, bail};
use caremind_core::{HitMeta, MetaValue};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::BufRead;
use tracing::{info, warn};

/// Chunks embedded per batch.
const EMBED_BATCH_SIZE: usize = 32;

/// Row count of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionCount {
    pub collection: String,
    pub chunks: u64,
}

/// Counters for one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub lines: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkWrite {
    Inserted,
    Updated,
}

struct PendingChunk {
    chunk_id: String,
    content: String,
    meta_json: String,
    content_hash: String,
    write: ChunkWrite,
}

/// SHA-256 of `content`, lowercase hex.
#[must_use]
pub fn content_hash_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stable chunk id.
///
/// `source|chunk_id|<12 hex of content hash>` when the raw metadata carries
/// both a non-empty `source` and a non-null `chunk_id`; otherwise
/// `g_<8 hex of source hash>_<16 hex of content hash>`, so identical text
/// from different files stays distinct.
#[must_use]
pub fn stable_chunk_id(meta: &serde_json::Map<String, serde_json::Value>, content: &str) -> String {
    let source = meta
        .get("source")
        .map(|v| MetaValue::from_json(v).to_string().trim().to_string())
        .unwrap_or_default();
    let content_hash = content_hash_hex(content);

    match meta.get("chunk_id").filter(|v| !v.is_null()) {
        Some(chunk_id) if !source.is_empty() => {
            let chunk_id = MetaValue::from_json(chunk_id);
            format!("{source}|{chunk_id}|{}", &content_hash[..12])
        }
        _ => {
            let source_hash = content_hash_hex(&source);
            format!("g_{}_{}", &source_hash[..8], &content_hash[..16])
        }
    }
}

/// Chunk counts per collection, ordered by collection name.
///
/// # Errors
///
/// Returns an error if the chunk table cannot be read.
pub fn collection_counts(db: &Connection) -> Result<Vec<CollectionCount>> {
    let mut stmt = db
        .prepare(
            "SELECT collection, COUNT(*) FROM guideline_chunks
             GROUP BY collection ORDER BY collection ASC",
        )
        .context("prepare collection count query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CollectionCount {
                collection: row.get(0)?,
                chunks: u64::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
            })
        })
        .context("execute collection count query")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("read collection count row")?);
    }
    Ok(out)
}

/// Pick the collection to search: `preferred` when it has chunks, else the
/// first non-empty collection by name, else `None`.
///
/// # Errors
///
/// Returns an error if the chunk table cannot be read.
pub fn pick_collection(db: &Connection, preferred: &str) -> Result<Option<String>> {
    let counts = collection_counts(db)?;
    if counts
        .iter()
        .any(|c| c.collection == preferred && c.chunks > 0)
    {
        return Ok(Some(preferred.to_string()));
    }
    Ok(counts
        .into_iter()
        .find(|c| c.chunks > 0)
        .map(|c| c.collection))
}

fn stored_hash(db: &Connection, collection: &str, chunk_id: &str) -> Result<Option<String>> {
    db.query_row(
        "SELECT content_hash FROM guideline_chunks WHERE collection = ?1 AND chunk_id = ?2",
        params![collection, chunk_id],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .with_context(|| format!("failed to query content hash for chunk {chunk_id}"))
}

fn upsert_chunk(
    db: &Connection,
    collection: &str,
    chunk: &PendingChunk,
    embedding: &[f32],
) -> Result<()> {
    db.execute(
        "INSERT INTO guideline_chunks
            (collection, chunk_id, content, meta_json, content_hash, embedding_json, dimension, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, CURRENT_TIMESTAMP)
         ON CONFLICT(collection, chunk_id) DO UPDATE SET
            content = excluded.content,
            meta_json = excluded.meta_json,
            content_hash = excluded.content_hash,
            embedding_json = excluded.embedding_json,
            dimension = excluded.dimension,
            updated_at = CURRENT_TIMESTAMP",
        params![
            collection,
            chunk.chunk_id,
            chunk.content,
            chunk.meta_json,
            chunk.content_hash,
            encode_embedding_json(embedding),
            i64::try_from(embedding.len()).unwrap_or(i64::MAX),
        ],
    )
    .with_context(|| format!("failed to upsert chunk {}", chunk.chunk_id))?;
    Ok(())
}

fn flush(
    db: &Connection,
    embedder: &dyn Embedder,
    collection: &str,
    pending: &mut Vec<PendingChunk>,
    report: &mut IndexReport,
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }

    let texts: Vec<&str> = pending.iter().map(|c| c.content.as_str()).collect();
    let embeddings = embedder
        .embed_batch(&texts)
        .context("batch embedding failed")?;
    if embeddings.len() != pending.len() {
        bail!(
            "embedding batch length mismatch: expected {}, got {}",
            pending.len(),
            embeddings.len()
        );
    }

    for (chunk, embedding) in pending.iter().zip(embeddings) {
        upsert_chunk(db, collection, chunk, &embedding)?;
        match chunk.write {
            ChunkWrite::Inserted => report.inserted += 1,
            ChunkWrite::Updated => report.updated += 1,
        }
    }
    pending.clear();
    Ok(())
}

/// Parse one JSONL record into `(content, raw meta)`.
fn parse_record(line: &str) -> Result<(String, serde_json::Map<String, serde_json::Value>), String> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|err| format!("invalid JSON: {err}"))?;
    let serde_json::Value::Object(mut object) = value else {
        return Err("expected a JSON object".to_string());
    };

    let content = match object.remove("content") {
        Some(serde_json::Value::String(text)) if !text.trim().is_empty() => text,
        _ => return Err("missing or empty \"content\"".to_string()),
    };
    let meta = match object.remove("meta") {
        Some(serde_json::Value::Object(meta)) => meta,
        None | Some(serde_json::Value::Null) => serde_json::Map::new(),
        Some(_) => return Err("\"meta\" must be an object".to_string()),
    };
    Ok((content, meta))
}

/// Stream guideline chunks into `collection`.
///
/// Malformed lines are skipped with a warning. Everything is written in one
/// transaction.
///
/// # Errors
///
/// Returns an error on I/O, embedding or SQLite failure.
pub fn index_guidelines_jsonl<R: BufRead>(
    conn: &mut Connection,
    embedder: &dyn Embedder,
    collection: &str,
    reader: R,
) -> Result<IndexReport> {
    if collection.trim().is_empty() {
        bail!("collection name must not be empty");
    }

    let tx = conn.transaction().context("begin guideline index transaction")?;
    let mut report = IndexReport::default();
    let mut pending: Vec<PendingChunk> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("read line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        report.lines += 1;

        let (content, raw_meta) = match parse_record(trimmed) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!(line = line_no, "skipping guideline chunk: {reason}");
                report.skipped += 1;
                continue;
            }
        };

        let chunk_id = stable_chunk_id(&raw_meta, &content);
        if !seen.insert(chunk_id.clone()) {
            report.unchanged += 1;
            continue;
        }

        let content_hash = content_hash_hex(&content);
        let write = match stored_hash(&tx, collection, &chunk_id)? {
            Some(existing) if existing == content_hash => {
                report.unchanged += 1;
                continue;
            }
            Some(_) => ChunkWrite::Updated,
            None => ChunkWrite::Inserted,
        };

        let meta = HitMeta::from_json(&serde_json::Value::Object(raw_meta));
        let meta_json = serde_json::to_string(&meta).context("serialize chunk metadata")?;

        pending.push(PendingChunk {
            chunk_id,
            content,
            meta_json,
            content_hash,
            write,
        });
        if pending.len() >= EMBED_BATCH_SIZE {
            flush(&tx, embedder, collection, &mut pending, &mut report)?;
        }
    }
    flush(&tx, embedder, collection, &mut pending, &mut report)?;

    tx.commit().context("commit guideline index")?;
    info!(
        collection,
        lines = report.lines,
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        skipped = report.skipped,
        "guideline indexing finished"
    );
    Ok(report)
}
