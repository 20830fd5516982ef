//! Vector store abstraction for overview documents.
//!
//! The [`VectorStore`] trait is the only storage seam the pipeline uses:
//! ingestion upserts [`DocumentRecord`]s by explicit id, retrieval runs a
//! filtered similarity search. Stores own their embedder, so callers pass
//! text, never vectors.
//!
//! Records are grouped into named collections (one per project).
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::filter::Filter;
use crate::overview::DocumentRecord;

/// A record returned by [`VectorStore::similarity_search`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    /// Cosine similarity against the query; results are sorted descending.
    pub score: f32,
}

/// Abstract semantic store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or overwrite records by id |
/// | [`similarity_search`](VectorStore::similarity_search) | Top-k by similarity, filtered on metadata |
/// | [`delete_collection`](VectorStore::delete_collection) | Drop every record in a collection |
/// | [`count`](VectorStore::count) | Number of records in a collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite `records[i]` under `ids[i]`.
    ///
    /// A record whose id already exists replaces the old one; nothing is
    /// duplicated. Returns the ids written, in input order.
    async fn upsert(
        &self,
        collection: &str,
        records: &[DocumentRecord],
        ids: &[String],
    ) -> Result<Vec<String>>;

    /// Return at most `limit` records most similar to `query`, considering
    /// only records whose metadata satisfies `filter` (all when `None`).
    async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<StoredDocument>>;

    /// Remove a collection and all its records. Missing collections are fine.
    async fn delete_collection(&self, collection: &str) -> Result<()>;

    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Reject mismatched record/id slices before touching storage.
pub(crate) fn check_upsert_lengths(records: &[DocumentRecord], ids: &[String]) -> Result<()> {
    if records.len() != ids.len() {
        anyhow::bail!(
            "upsert needs one id per record (got {} records, {} ids)",
            records.len(),
            ids.len()
        );
    }
    Ok(())
}
