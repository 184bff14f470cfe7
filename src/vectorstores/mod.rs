//! Document ingestion and text similarity search backends.
//!
//! Ingestion is hard-fail: a batch rejected by the backend aborts the call.
//! Batches submitted before the rejected one are not rolled back.
//!
//! Search is soft-fail: backend errors are reported as
//! [`SearchOutcome::Failed`] instead of an `Err`, and callers that only want
//! documents can degrade that to an empty list with
//! [`SearchOutcome::into_documents`].

pub mod marqo;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Document, ScoredDocument};

pub use marqo::MarqoVectorStore;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Matches(Vec<ScoredDocument>),
    NoMatches,
    Failed(String),
}

impl SearchOutcome {
    pub fn from_hits(hits: Vec<ScoredDocument>) -> Self {
        if hits.is_empty() {
            SearchOutcome::NoMatches
        } else {
            SearchOutcome::Matches(hits)
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SearchOutcome::Failed(_))
    }

    pub fn into_documents(self) -> Vec<ScoredDocument> {
        match self {
            SearchOutcome::Matches(hits) => hits,
            SearchOutcome::NoMatches | SearchOutcome::Failed(_) => Vec::new(),
        }
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ingest into the configured collection, recreating it first when
    /// `fresh_collection` is set. Returns backend ids in submission order.
    async fn add_documents(&self, documents: &[Document], fresh_collection: bool) -> Result<Vec<String>>;

    async fn similarity_search_with_score(
        &self,
        query: &str,
        collection_name: &str,
        k: usize,
    ) -> SearchOutcome;

    /// Ingest into an arbitrary collection in one unbatched request, creating
    /// the collection if it does not exist yet.
    async fn cache_documents(&self, documents: &[Document], collection_name: &str) -> Result<Vec<String>>;

    fn collection_name(&self) -> &str;

    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_distinguishes_empty_from_failed() {
        assert_eq!(SearchOutcome::from_hits(Vec::new()), SearchOutcome::NoMatches);
        let failed = SearchOutcome::Failed("connection refused".to_string());
        assert!(failed.is_failure());
        assert!(failed.into_documents().is_empty());
        assert!(!SearchOutcome::NoMatches.is_failure());
    }

    #[test]
    fn test_matches_keep_backend_order() {
        let hits = vec![
            ScoredDocument::new(Document::new("b"), 0.2),
            ScoredDocument::new(Document::new("a"), 0.9),
        ];
        let outcome = SearchOutcome::from_hits(hits.clone());
        assert_eq!(outcome.into_documents(), hits);
    }
}
