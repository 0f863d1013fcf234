//! KNN search over stored guideline chunk embeddings.
//!
//! The query vector is compared against `guideline_chunks.embedding_json`
//! within one collection. When sqlite-vec is registered the distance is
//! computed in SQL with `vec_distance_cosine`; otherwise every row of the
//! collection is scored in Rust.

use crate::similarity::cosine_distance;
use caremind_core::db::vector_extension_version;
use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use tracing::debug;

/// One nearest-neighbour row, with its raw cosine distance in `[0, 2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMatch {
    pub chunk_id: String,
    pub content: String,
    pub meta_json: String,
    pub distance: f32,
}

/// Return up to `limit` chunks of `collection` closest to `query_embedding`,
/// nearest first. Rows stored with a different dimension are ignored.
///
/// # Errors
///
/// Returns an error if the chunk table cannot be read.
pub fn knn_search(
    db: &Connection,
    collection: &str,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<ChunkMatch>> {
    if limit == 0 || query_embedding.is_empty() {
        return Ok(Vec::new());
    }

    if let Some(results) = try_knn_search_sqlite_vec(db, collection, query_embedding, limit)? {
        return Ok(results);
    }

    let mut stmt = db
        .prepare(
            "SELECT chunk_id, content, meta_json, embedding_json
             FROM guideline_chunks
             WHERE collection = ?1 AND dimension = ?2",
        )
        .context("failed to prepare guideline KNN query (guideline index missing?)")?;

    let rows = stmt
        .query_map(params![collection, sql_int(query_embedding.len())], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .context("failed to execute guideline KNN query")?;

    let mut scored = Vec::new();
    for row in rows {
        let (chunk_id, content, meta_json, embedding_json) =
            row.context("failed to read guideline KNN row")?;
        let embedding: Vec<f32> = match serde_json::from_str(&embedding_json) {
            Ok(value) => value,
            Err(err) => {
                debug!("skipping malformed embedding for chunk {chunk_id}: {err}");
                continue;
            }
        };

        let Some(distance) = cosine_distance(query_embedding, &embedding) else {
            continue;
        };
        scored.push(ChunkMatch {
            chunk_id,
            content,
            meta_json,
            distance,
        });
    }

    sort_nearest_first(&mut scored);
    scored.truncate(limit);

    Ok(scored)
}

fn try_knn_search_sqlite_vec(
    db: &Connection,
    collection: &str,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Option<Vec<ChunkMatch>>> {
    if !vec_available(db) {
        return Ok(None);
    }

    let query_json = encode_embedding_json(query_embedding);
    let mut stmt = match db.prepare(
        "SELECT chunk_id, content, meta_json,
                vec_distance_cosine(vec_f32(embedding_json), vec_f32(?1)) AS distance
         FROM guideline_chunks
         WHERE collection = ?2 AND dimension = ?3
         ORDER BY distance ASC, chunk_id ASC
         LIMIT ?4",
    ) {
        Ok(stmt) => stmt,
        Err(err) => {
            debug!("sqlite-vec KNN unavailable, falling back to Rust KNN: {err}");
            return Ok(None);
        }
    };

    let rows = match stmt.query_map(
        params![
            query_json,
            collection,
            sql_int(query_embedding.len()),
            sql_int(limit)
        ],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ))
        },
    ) {
        Ok(rows) => rows,
        Err(err) => {
            debug!("sqlite-vec KNN query failed, falling back to Rust KNN: {err}");
            return Ok(None);
        }
    };

    let mut out = Vec::new();
    for row in rows {
        let (chunk_id, content, meta_json, distance) = match row {
            Ok(values) => values,
            Err(err) => {
                debug!("sqlite-vec KNN row failed, falling back to Rust KNN: {err}");
                return Ok(None);
            }
        };
        #[allow(clippy::cast_possible_truncation)]
        let distance = distance as f32;
        out.push(ChunkMatch {
            chunk_id,
            content,
            meta_json,
            distance,
        });
    }

    Ok(Some(out))
}

fn vec_available(db: &Connection) -> bool {
    vector_extension_version(db).is_some()
}

fn sort_nearest_first(matches: &mut [ChunkMatch]) {
    matches.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

pub(crate) fn encode_embedding_json(embedding: &[f32]) -> String {
    let mut encoded = String::from("[");
    for (idx, value) in embedding.iter().enumerate() {
        if idx != 0 {
            encoded.push(',');
        }
        encoded.push_str(&value.to_string());
    }
    encoded.push(']');
    encoded
}

fn sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caremind_core::db::migrations;

    fn setup_db() -> Connection {
        let mut db = Connection::open_in_memory().expect("open in-memory db");
        migrations::migrate(&mut db).expect("migrate");
        db
    }

    fn insert(db: &Connection, collection: &str, chunk_id: &str, embedding: &[f32]) {
        db.execute(
            "INSERT INTO guideline_chunks
                (collection, chunk_id, content, meta_json, content_hash, embedding_json, dimension)
             VALUES (?1, ?2, ?3, '{}', 'h', ?4, ?5)",
            params![
                collection,
                chunk_id,
                format!("content of {chunk_id}"),
                encode_embedding_json(embedding),
                sql_int(embedding.len()),
            ],
        )
        .expect("insert chunk");
    }

    #[test]
    fn nearest_chunks_come_first() {
        let db = setup_db();
        insert(&db, "c", "far", &[0.0, 1.0, 0.0]);
        insert(&db, "c", "near", &[1.0, 0.1, 0.0]);
        insert(&db, "c", "exact", &[1.0, 0.0, 0.0]);

        let matches = knn_search(&db, "c", &[1.0, 0.0, 0.0], 2).expect("knn");
        let ids: Vec<&str> = matches.iter().map(|m| m.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!(matches[0].distance.abs() < 1e-5);
    }

    #[test]
    fn search_is_scoped_to_collection_and_dimension() {
        let db = setup_db();
        insert(&db, "a", "in-a", &[1.0, 0.0]);
        insert(&db, "b", "in-b", &[1.0, 0.0]);
        insert(&db, "a", "wrong-dim", &[1.0, 0.0, 0.0]);

        let matches = knn_search(&db, "a", &[1.0, 0.0], 10).expect("knn");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].chunk_id, "in-a");
    }

    #[test]
    fn zero_limit_or_empty_query_returns_nothing() {
        let db = setup_db();
        insert(&db, "c", "x", &[1.0]);
        assert!(knn_search(&db, "c", &[1.0], 0).expect("knn").is_empty());
        assert!(knn_search(&db, "c", &[], 5).expect("knn").is_empty());
    }

    #[test]
    fn missing_table_is_an_error_not_a_panic() {
        let db = Connection::open_in_memory().expect("open db");
        assert!(knn_search(&db, "c", &[1.0, 0.0], 3).is_err());
    }

    #[test]
    fn embedding_json_round_trips_through_serde() {
        let encoded = encode_embedding_json(&[0.5, -1.0, 0.25]);
        let decoded: Vec<f32> = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, vec![0.5, -1.0, 0.25]);
    }
}
