//! SQLite store utilities.
//!
//! Every connection gets the same runtime pragmas: WAL journaling,
//! a 5s busy timeout, foreign keys on. Opening a store also registers the
//! sqlite-vec extension when available.

pub mod drugs;
pub mod migrations;
pub mod schema;

use crate::error::StoreError;
use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::{path::Path, time::Duration};
use tracing::debug;

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) a store database, apply runtime pragmas, and migrate the
/// schema to the latest version. Used by the ingest commands.
///
/// # Errors
///
/// Returns an error if opening, configuring or migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    register_vector_extension();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;

    Ok(conn)
}

/// Open an existing store for querying. Never creates a file and never
/// migrates: the schema must already be at [`migrations::LATEST_SCHEMA_VERSION`].
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] if the file does not exist,
/// [`StoreError::SchemaMismatch`] if it was written by another schema
/// version, or an error if it cannot be opened.
pub fn open_existing(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(StoreError::NotFound(path.to_path_buf()).into());
    }
    register_vector_extension();

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open store {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    let found = migrations::current_schema_version(&conn).context("read schema version")?;
    if found != migrations::LATEST_SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            path: path.to_path_buf(),
            found,
            expected: migrations::LATEST_SCHEMA_VERSION,
        }
        .into());
    }

    Ok(conn)
}

/// Open a migrated in-memory store. Handy for tests and demo data.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn open_in_memory() -> Result<Connection> {
    register_vector_extension();

    let mut conn = Connection::open_in_memory().context("open in-memory store")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;
    Ok(conn)
}

/// sqlite-vec version visible on `conn`, `None` when vector SQL functions
/// are unavailable.
#[must_use]
pub fn vector_extension_version(conn: &Connection) -> Option<String> {
    caremind_sqlite_vec::vec_version(conn)
}

fn register_vector_extension() {
    if let Err(reason) = caremind_sqlite_vec::register_auto_extension() {
        debug!("sqlite-vec not registered, vector search uses in-process cosine: {reason}");
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
