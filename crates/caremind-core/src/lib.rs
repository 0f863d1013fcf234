//! caremind-core library.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` for store plumbing; [`error::RetrievalError`]
//!   at the retrieval contract boundary.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod config;
pub mod db;
pub mod error;
pub mod hit;
pub mod ingest;

pub use config::Settings;
pub use error::{ErrorCode, RetrievalError, StoreError};
pub use hit::{FusedHit, Hit, HitMeta, HitSource, MetaValue};
