//! In-memory [`VectorStore`] implementation for testing and small projects.
//!
//! Uses `HashMap` behind `std::sync::RwLock` for thread safety. Search is
//! brute-force cosine similarity over every record in the collection that
//! passes the metadata filter.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::filter::Filter;
use crate::overview::DocumentRecord;

use super::{check_upsert_lengths, StoredDocument, VectorStore};

struct StoredRecord {
    record: DocumentRecord,
    vector: Vec<f32>,
    /// Insertion sequence, used to break score ties deterministically.
    seq: u64,
}

#[derive(Default)]
struct Collections {
    records: HashMap<String, HashMap<String, StoredRecord>>,
    next_seq: u64,
}

/// In-memory store; contents are lost when it is dropped.
pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    inner: RwLock<Collections>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            inner: RwLock::new(Collections::default()),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(
        &self,
        collection: &str,
        records: &[DocumentRecord],
        ids: &[String],
    ) -> Result<Vec<String>> {
        check_upsert_lengths(records, ids)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} records",
                vectors.len(),
                records.len()
            );
        }

        let mut inner = self.inner.write().map_err(poisoned)?;
        let Collections { records: all, next_seq } = &mut *inner;
        let entries = all.entry(collection.to_string()).or_default();
        for ((record, id), vector) in records.iter().zip(ids).zip(vectors) {
            *next_seq += 1;
            entries.insert(
                id.clone(),
                StoredRecord {
                    record: record.clone(),
                    vector,
                    seq: *next_seq,
                },
            );
        }

        Ok(ids.to_vec())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<StoredDocument>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;

        let inner = self.inner.read().map_err(poisoned)?;
        let Some(entries) = inner.records.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, u64, StoredDocument)> = entries
            .iter()
            .filter(|(_, stored)| filter.map_or(true, |f| f.matches(&stored.record.metadata)))
            .map(|(id, stored)| {
                let score = cosine_similarity(&query_vec, &stored.vector);
                (
                    score,
                    stored.seq,
                    StoredDocument {
                        id: id.clone(),
                        content: stored.record.content.clone(),
                        metadata: stored.record.metadata.clone(),
                        score,
                    },
                )
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, _, doc)| doc).collect())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.records.remove(collection);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.records.get(collection).map_or(0, HashMap::len))
    }
}
