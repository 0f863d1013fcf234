//! Provider contracts for the two evidence stores.
//!
//! Full providers are backed by SQLite (see [`crate::semantic`] and
//! [`crate::relational`]); the demo variants here stand in when a store is
//! not available and always answer "no evidence".

use caremind_core::{Hit, RetrievalError};

/// Semantic search over guideline chunks.
pub trait VectorSearchProvider {
    /// Up to `k` guideline hits, best first. An empty vector means "no
    /// evidence", not failure.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::EmptyQuery`] for a blank query,
    /// [`RetrievalError::ProviderUnavailable`] when the index cannot be read.
    fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>, RetrievalError>;
}

/// Keyword search and name lookup over structured drug records.
pub trait RelationalSearchProvider {
    /// Up to `k` drug hits, best first.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::EmptyQuery`] for a blank query,
    /// [`RetrievalError::ProviderUnavailable`] when the store cannot be read.
    fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>, RetrievalError>;

    /// Best single record for a drug name, `None` when nothing matches or
    /// the name is blank.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::ProviderUnavailable`] when the store cannot be read.
    fn get_by_name(&self, name: &str) -> Result<Option<Hit>, RetrievalError>;
}

/// Trim a query and reject it when nothing is left.
///
/// # Errors
///
/// Returns [`RetrievalError::EmptyQuery`] for blank input.
pub fn validate_query(query: &str) -> Result<&str, RetrievalError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(RetrievalError::EmptyQuery)
    } else {
        Ok(trimmed)
    }
}

/// Guideline provider used when no vector index is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoGuidelineProvider;

impl VectorSearchProvider for DemoGuidelineProvider {
    fn search(&self, query: &str, _k: usize) -> Result<Vec<Hit>, RetrievalError> {
        validate_query(query)?;
        Ok(Vec::new())
    }
}

/// Drug provider used when no drug store is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoDrugProvider;

impl RelationalSearchProvider for DemoDrugProvider {
    fn search(&self, query: &str, _k: usize) -> Result<Vec<Hit>, RetrievalError> {
        validate_query(query)?;
        Ok(Vec::new())
    }

    fn get_by_name(&self, _name: &str) -> Result<Option<Hit>, RetrievalError> {
        Ok(None)
    }
}
