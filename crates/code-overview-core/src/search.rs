//! Filtered similarity retrieval over stored overviews.
//!
//! [`search_overviews`] hands the query, limit, and filter straight to the
//! store and returns its ranking untouched: no re-ranking, dedup, or
//! truncation happens here. [`format_search_results`] renders hits as plain
//! text for prompts and terminals.

use anyhow::Context as _;

use crate::error::{OverviewError, Result};
use crate::filter::Filter;
use crate::store::{StoredDocument, VectorStore};

/// Separator placed between documents by [`format_search_results`].
pub const RESULT_SEPARATOR: &str = "\n\n";

/// Run a filtered similarity search against one collection.
///
/// # Errors
///
/// Returns [`OverviewError::ExternalService`] when the store fails.
pub async fn search_overviews(
    store: &dyn VectorStore,
    collection: &str,
    query: &str,
    limit: usize,
    filter: Option<&Filter>,
) -> Result<Vec<StoredDocument>> {
    tracing::debug!(
        collection,
        limit,
        filter = %crate::filter::filter_to_json(filter),
        "similarity search"
    );

    store
        .similarity_search(collection, query, limit, filter)
        .await
        .with_context(|| format!("searching '{}'", collection))
        .map_err(|e| OverviewError::external("vector store", e))
}

/// Join the raw contents of the hits, in order, with a blank line.
///
/// An empty slice gives the empty string.
pub fn format_search_results(results: &[StoredDocument]) -> String {
    results
        .iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}
