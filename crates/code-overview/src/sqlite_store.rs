//! SQLite-backed [`VectorStore`] implementation.
//!
//! Rows live in `overview_documents`, keyed by `(collection, id)`. Each row
//! keeps its content, the flat metadata map as JSON, the embedding as a
//! little-endian `f32` BLOB, and the SHA-256 of the content. On upsert only
//! rows whose content hash changed (or that are new) are sent to the
//! embedder; metadata is always rewritten.
//!
//! Search loads the collection's rows, applies the metadata filter in
//! process, and ranks by cosine similarity.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use code_overview_core::chunk::content_hash;
use code_overview_core::embedding::{
    blob_to_vec, cosine_similarity, embed_query, vec_to_blob, Embedder,
};
use code_overview_core::filter::Filter;
use code_overview_core::overview::DocumentRecord;
use code_overview_core::store::{StoredDocument, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            pool,
            embedder,
            batch_size: 64,
        }
    }

    /// Number of texts sent to the embedder per call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Content hashes of rows whose stored vector came from the current
    /// embedder: same model name and same dimensionality.
    async fn fresh_hashes(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<HashMap<String, String>> {
        let model = self.embedder.model_name();
        let blob_len = (self.embedder.dims() * 4) as i64;
        let mut hashes = HashMap::new();
        for id in ids {
            let hash: Option<String> = sqlx::query_scalar(
                r#"
                SELECT content_hash FROM overview_documents
                WHERE collection = ? AND id = ?
                  AND embedding IS NOT NULL
                  AND embedding_model = ?
                  AND length(embedding) = ?
                "#,
            )
            .bind(collection)
            .bind(id)
            .bind(model)
            .bind(blob_len)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(hash) = hash {
                hashes.insert(id.clone(), hash);
            }
        }
        Ok(hashes)
    }

    async fn embed_batched(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.embedder.embed(batch).await?;
            if embedded.len() != batch.len() {
                anyhow::bail!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch.len()
                );
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(
        &self,
        collection: &str,
        records: &[DocumentRecord],
        ids: &[String],
    ) -> Result<Vec<String>> {
        if records.len() != ids.len() {
            anyhow::bail!(
                "upsert needs one id per record (got {} records, {} ids)",
                records.len(),
                ids.len()
            );
        }

        let hashes: Vec<String> = records.iter().map(|r| content_hash(&r.content)).collect();
        let existing = self.fresh_hashes(collection, ids).await?;

        // Positions whose content is new or changed, or was embedded by
        // another model.
        let stale: Vec<usize> = (0..records.len())
            .filter(|&i| existing.get(&ids[i]) != Some(&hashes[i]))
            .collect();
        tracing::debug!(
            collection,
            total = records.len(),
            to_embed = stale.len(),
            "upserting overview documents"
        );

        let texts = stale.iter().map(|&i| records[i].content.clone()).collect();
        let vectors = self
            .embed_batched(texts)
            .await
            .context("embedding overview documents")?;
        let mut fresh: HashMap<usize, Vec<f32>> = stale.into_iter().zip(vectors).collect();

        let now = chrono::Utc::now().timestamp();
        let model = self.embedder.model_name().to_string();
        let mut tx = self.pool.begin().await?;

        for (i, (record, id)) in records.iter().zip(ids).enumerate() {
            let metadata_json = serde_json::to_string(&record.metadata)?;
            match fresh.remove(&i) {
                Some(vector) => {
                    sqlx::query(
                        r#"
                        INSERT INTO overview_documents
                            (collection, id, content, metadata_json, embedding,
                             embedding_model, content_hash, updated_at)
                        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                        ON CONFLICT(collection, id) DO UPDATE SET
                            content = excluded.content,
                            metadata_json = excluded.metadata_json,
                            embedding = excluded.embedding,
                            embedding_model = excluded.embedding_model,
                            content_hash = excluded.content_hash,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(collection)
                    .bind(id)
                    .bind(&record.content)
                    .bind(&metadata_json)
                    .bind(vec_to_blob(&vector))
                    .bind(&model)
                    .bind(&hashes[i])
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query(
                        "UPDATE overview_documents SET metadata_json = ?, updated_at = ? \
                         WHERE collection = ? AND id = ?",
                    )
                    .bind(&metadata_json)
                    .bind(now)
                    .bind(collection)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
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

        let rows = sqlx::query(
            r#"
            SELECT id, content, metadata_json, embedding
            FROM overview_documents
            WHERE collection = ? AND embedding IS NOT NULL
            ORDER BY rowid ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::new();
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
                .with_context(|| format!("corrupt metadata for '{}'", row.get::<String, _>("id")))?;
            if let Some(f) = filter {
                if !f.matches(&metadata) {
                    continue;
                }
            }
            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(&query_vec, &blob_to_vec(&blob));
            candidates.push(StoredDocument {
                id: row.get("id"),
                content: row.get("content"),
                metadata,
                score,
            });
        }

        // Upserts update rows in place, so rowid order is first-insertion
        // order; the stable sort keeps it among equal scores.
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM overview_documents WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        tracing::info!(collection, rows = result.rows_affected(), "collection deleted");
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM overview_documents WHERE collection = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use code_overview_core::embedding::HashEmbedder;
    use code_overview_core::overview::{to_document_record, ContentType, Overview};

    use crate::db;
    use crate::migrate::migrate_pool;

    /// Counts how many texts reach the embedder.
    struct Counting {
        inner: HashEmbedder,
        texts: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for Counting {
        fn model_name(&self) -> &str {
            "counting"
        }

        fn dims(&self) -> usize {
            self.inner.dims()
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    async fn open(dir: &tempfile::TempDir) -> (SqliteStore, Arc<Counting>) {
        let pool = db::connect_path(&dir.path().join("overview.sqlite"))
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        let embedder = Arc::new(Counting {
            inner: HashEmbedder::new(64),
            texts: AtomicUsize::new(0),
        });
        (SqliteStore::new(pool, embedder.clone()).with_batch_size(2), embedder)
    }

    fn record(name: &str, content: &str, summary: &str) -> (DocumentRecord, String) {
        let overview = Overview::new(
            name,
            content,
            "demo",
            vec![],
            ContentType::Function,
            "a.ts",
            summary,
        );
        (to_document_record(&overview), overview.id().to_string())
    }

    #[tokio::test]
    async fn test_upsert_search_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir).await;

        let (r1, id1) = record("parse", "parse the config file", "");
        let (r2, id2) = record("draw", "draw the widget", "");
        store
            .upsert("demo", &[r1, r2], &[id1.clone(), id2])
            .await
            .unwrap();
        assert_eq!(store.count("demo").await.unwrap(), 2);

        let hits = store
            .similarity_search("demo", "config file", 1, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id1);
        assert_eq!(hits[0].metadata["name"], "parse");

        let filter = Filter::eq("name", "draw");
        let hits = store
            .similarity_search("demo", "config file", 5, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["name"], "draw");

        store.delete_collection("demo").await.unwrap();
        assert_eq!(store.count("demo").await.unwrap(), 0);
        assert!(store
            .similarity_search("demo", "config", 5, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_content_is_not_reembedded() {
        let dir = tempfile::tempdir().unwrap();
        let (store, embedder) = open(&dir).await;

        let (r, id) = record("parse", "parse the config file", "old summary");
        store.upsert("demo", &[r], &[id.clone()]).await.unwrap();
        assert_eq!(embedder.texts.load(Ordering::SeqCst), 1);

        // Same content, new summary: metadata updates, no embedding call.
        let (r, _) = record("parse", "parse the config file", "new summary");
        store.upsert("demo", &[r], &[id.clone()]).await.unwrap();
        assert_eq!(embedder.texts.load(Ordering::SeqCst), 1);

        let hits = store.similarity_search("demo", "parse", 5, None).await.unwrap();
        assert_eq!(hits[0].metadata["summary"], "new summary");

        // Changed content is re-embedded and overwrites.
        let before = embedder.texts.load(Ordering::SeqCst);
        let (r, _) = record("parse", "parse the config file twice", "new summary");
        store.upsert("demo", &[r], &[id]).await.unwrap();
        assert_eq!(embedder.texts.load(Ordering::SeqCst) - before, 1);
        assert_eq!(store.count("demo").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_switching_embedder_reembeds_unchanged_content() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir).await;
        let (r, id) = record("parse", "parse the config file", "");
        store.upsert("demo", &[r.clone()], &[id.clone()]).await.unwrap();

        // Same pool, smaller vectors: the 64-dim row must not be reused.
        let smaller = Arc::new(Counting {
            inner: HashEmbedder::new(32),
            texts: AtomicUsize::new(0),
        });
        let store = SqliteStore::new(store.pool().clone(), smaller.clone());
        store.upsert("demo", &[r], &[id.clone()]).await.unwrap();
        assert_eq!(smaller.texts.load(Ordering::SeqCst), 1);

        let hits = store
            .similarity_search("demo", "parse the config file", 1, None)
            .await
            .unwrap();
        assert_eq!(hits[0].id, id);
        assert!(hits[0].score > 0.99, "score was {}", hits[0].score);

        let stored: i64 = sqlx::query_scalar(
            "SELECT length(embedding) FROM overview_documents WHERE collection = 'demo' AND id = ?",
        )
        .bind(&id)
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(stored, 32 * 4);
    }

    #[tokio::test]
    async fn test_ties_keep_first_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir).await;

        let (first, first_id) = record("alpha", "same text", "");
        let (second, second_id) = record("beta", "same text", "");
        store
            .upsert("demo", &[first, second], &[first_id.clone(), second_id.clone()])
            .await
            .unwrap();

        // A metadata-only update of the first row must not move it back.
        let (first, _) = record("alpha", "same text", "changed summary");
        store.upsert("demo", &[first], &[first_id.clone()]).await.unwrap();

        let hits = store.similarity_search("demo", "same text", 2, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec![first_id.as_str(), second_id.as_str()]);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir).await;

        let (r, id) = record("parse", "parse", "");
        store.upsert("one", &[r.clone()], &[id.clone()]).await.unwrap();
        store.upsert("two", &[r], &[id]).await.unwrap();
        store.delete_collection("one").await.unwrap();
        assert_eq!(store.count("one").await.unwrap(), 0);
        assert_eq!(store.count("two").await.unwrap(), 1);
    }
}
