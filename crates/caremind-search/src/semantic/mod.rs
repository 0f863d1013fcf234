//! Guideline side of retrieval: embedding, chunk indexing and KNN search.

pub mod embed;
pub mod index;
pub mod provider;
pub mod search;

pub use embed::{Embedder, EmbedderInfo, HashEmbedder};
pub use index::{CollectionCount, IndexReport, collection_counts, index_guidelines_jsonl, pick_collection};
pub use provider::SqliteGuidelineProvider;
pub use search::{ChunkMatch, knn_search};
