//! SQLite-backed guideline provider.

use super::embed::{Embedder, HashEmbedder};
use super::index::pick_collection;
use super::search::knn_search;
use crate::provider::{VectorSearchProvider, validate_query};
use crate::similarity::distance_to_similarity;
use anyhow::{Context, Result};
use caremind_core::db::open_existing;
use caremind_core::{Hit, HitMeta, HitSource, RetrievalError};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

const PROVIDER: &str = "guideline";

/// Vector search over the guideline chunk table.
pub struct SqliteGuidelineProvider {
    conn: Connection,
    embedder: Box<dyn Embedder>,
    collection: String,
}

impl SqliteGuidelineProvider {
    #[must_use]
    pub fn new(conn: Connection, embedder: Box<dyn Embedder>, collection: impl Into<String>) -> Self {
        Self {
            conn,
            embedder,
            collection: collection.into(),
        }
    }

    /// Open an existing guideline store with a [`HashEmbedder`] of
    /// `dimension` buckets.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file is missing or cannot be opened.
    pub fn open(path: &Path, dimension: usize, collection: impl Into<String>) -> Result<Self> {
        let conn = open_existing(path).context("open guideline store")?;
        Ok(Self::new(conn, Box::new(HashEmbedder::new(dimension)), collection))
    }

    /// Preferred collection name.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Collection a search would use right now, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk table cannot be read.
    pub fn active_collection(&self) -> Result<Option<String>> {
        pick_collection(&self.conn, &self.collection)
    }
}

impl VectorSearchProvider for SqliteGuidelineProvider {
    fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>, RetrievalError> {
        let query = validate_query(query)?;

        let collection = self
            .active_collection()
            .map_err(|err| RetrievalError::unavailable(PROVIDER, format!("{err:#}")))?
            .ok_or_else(|| RetrievalError::unavailable(PROVIDER, "no non-empty guideline collection"))?;
        if collection != self.collection {
            debug!(preferred = %self.collection, using = %collection, "preferred collection empty");
        }

        let embedding = self
            .embedder
            .embed(query)
            .context("embed guideline query")?;

        let matches = knn_search(&self.conn, &collection, &embedding, k)
            .map_err(|err| RetrievalError::unavailable(PROVIDER, format!("{err:#}")))?;

        Ok(matches
            .into_iter()
            .map(|m| {
                let meta = serde_json::from_str::<HitMeta>(&m.meta_json).unwrap_or_else(|err| {
                    debug!("unreadable metadata for chunk {}: {err}", m.chunk_id);
                    HitMeta::default()
                });
                Hit::new(
                    m.chunk_id,
                    m.content,
                    meta,
                    distance_to_similarity(m.distance),
                    HitSource::Guideline,
                )
            })
            .collect())
    }
}
