#![forbid(unsafe_code)]
//! caremind-search library.
//!
//! Hybrid retrieval over guideline chunks (vector KNN) and drug records
//! (full-text or substring match), fused by weighted-linear combination or
//! reciprocal rank fusion, plus the templated answer pipeline built on top.
//!
//! # Conventions
//!
//! - **Errors**: providers and the retriever return
//!   [`caremind_core::RetrievalError`]; indexing and store helpers use
//!   `anyhow::Result`.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod answer;
pub mod backend;
pub mod fusion;
pub mod provider;
pub mod relational;
pub mod semantic;
pub mod similarity;

pub use answer::{AnswerBundle, AnswerPipeline, DegradePolicy, Lang};
pub use backend::Backends;
pub use fusion::{FusionStrategy, HybridParams, HybridRetriever, HybridSearchResult};
pub use provider::{RelationalSearchProvider, VectorSearchProvider};
pub use relational::SqliteDrugProvider;
pub use semantic::{Embedder, HashEmbedder, SqliteGuidelineProvider};
pub use similarity::distance_to_similarity;
