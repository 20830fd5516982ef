//! Ingestion of overview batches into a vector store.
//!
//! [`ingest_overviews`] is the I/O half: it projects the batch with
//! [`to_document_records`] and performs a single upsert keyed by each
//! overview's id. [`UpsertOverviews`] wraps it as a procedure [`Step`] so it
//! can run inside a [`Procedure`](crate::procedure::Procedure) over an
//! [`IngestContext`].

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{OverviewError, Result};
use crate::overview::{to_document_records, Overview};
use crate::procedure::{ProcedureContext, Step};
use crate::store::VectorStore;

/// Upsert a batch of overviews into `collection`.
///
/// Returns the number of records written. An empty batch returns `Ok(0)`
/// without touching the store.
///
/// # Errors
///
/// - [`OverviewError::Configuration`] when no store is available.
/// - [`OverviewError::ExternalService`] when the store rejects the write.
///   Nothing is retried and a partial write is not rolled back.
pub async fn ingest_overviews(
    store: Option<&dyn VectorStore>,
    collection: &str,
    batch: &[Overview],
) -> Result<usize> {
    let store =
        store.ok_or_else(|| OverviewError::configuration("vector store is not initialized"))?;

    if batch.is_empty() {
        tracing::debug!(collection, "no overviews to ingest");
        return Ok(0);
    }

    let records = to_document_records(batch);
    let ids: Vec<String> = batch.iter().map(|o| o.id().to_string()).collect();

    let written = store
        .upsert(collection, &records, &ids)
        .await
        .with_context(|| format!("upserting {} overviews into '{}'", ids.len(), collection))
        .map_err(|e| OverviewError::external("vector store", e))?;

    tracing::info!(collection, count = written.len(), "overviews ingested");
    Ok(written.len())
}

/// Per-run context for the ingestion procedure.
pub struct IngestContext {
    /// Project name; also the store collection.
    pub project: String,
    pub store: Option<Arc<dyn VectorStore>>,
    /// Unique id of this run, for log correlation.
    pub run_id: Uuid,
    /// Records written by [`UpsertOverviews`].
    pub persisted: usize,
}

impl IngestContext {
    pub fn new(project: impl Into<String>, store: Option<Arc<dyn VectorStore>>) -> Self {
        Self {
            project: project.into(),
            store,
            run_id: Uuid::new_v4(),
            persisted: 0,
        }
    }
}

impl ProcedureContext for IngestContext {
    fn context_id(&self) -> String {
        self.run_id.to_string()
    }

    fn context_string(&self) -> String {
        serde_json::json!({
            "runId": self.run_id.to_string(),
            "project": self.project,
            "hasStore": self.store.is_some(),
            "persisted": self.persisted,
        })
        .to_string()
    }
}

/// Procedure step that upserts a fixed batch of overviews.
pub struct UpsertOverviews {
    batch: Vec<Overview>,
}

impl UpsertOverviews {
    pub const ID: &'static str = "UpsertOverviews";

    pub fn new(batch: Vec<Overview>) -> Self {
        Self { batch }
    }

    pub fn batch(&self) -> &[Overview] {
        &self.batch
    }
}

#[async_trait]
impl Step<IngestContext> for UpsertOverviews {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn run(&self, ctx: &mut IngestContext) -> anyhow::Result<()> {
        let written = ingest_overviews(ctx.store.as_deref(), &ctx.project, &self.batch).await?;
        ctx.persisted += written;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::filter::Filter;
    use crate::overview::{ContentType, DocumentRecord};
    use crate::procedure::Procedure;
    use crate::store::memory::InMemoryStore;
    use crate::store::StoredDocument;

    fn foo(content: &str) -> Overview {
        Overview::new(
            "Foo",
            content,
            "demo",
            vec!["bar.ts".to_string()],
            ContentType::Class,
            "f.ts",
            "Foo summary",
        )
    }

    fn memory_store() -> Arc<dyn VectorStore> {
        Arc::new(InMemoryStore::new(Arc::new(HashEmbedder::new(64))))
    }

    /// Store that fails every call.
    struct Broken;

    #[async_trait]
    impl VectorStore for Broken {
        async fn upsert(
            &self,
            _collection: &str,
            _records: &[DocumentRecord],
            _ids: &[String],
        ) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("connection refused")
        }

        async fn similarity_search(
            &self,
            _collection: &str,
            _query: &str,
            _limit: usize,
            _filter: Option<&Filter>,
        ) -> anyhow::Result<Vec<StoredDocument>> {
            anyhow::bail!("connection refused")
        }

        async fn delete_collection(&self, _collection: &str) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }

        async fn count(&self, _collection: &str) -> anyhow::Result<usize> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_missing_store_is_configuration_error() {
        let err = ingest_overviews(None, "demo", &[foo("x")]).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store: &dyn VectorStore = &Broken;
        // Would fail if the store were touched
        assert_eq!(ingest_overviews(Some(store), "demo", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_external_error() {
        let store: &dyn VectorStore = &Broken;
        let err = ingest_overviews(Some(store), "demo", &[foo("x")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OverviewError::ExternalService {
                service: "vector store",
                ..
            }
        ));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_reingest_overwrites() {
        let store = memory_store();
        ingest_overviews(Some(store.as_ref()), "demo", &[foo("old text")])
            .await
            .unwrap();
        ingest_overviews(Some(store.as_ref()), "demo", &[foo("new text")])
            .await
            .unwrap();
        assert_eq!(store.count("demo").await.unwrap(), 1);
        let hits = store.similarity_search("demo", "text", 5, None).await.unwrap();
        assert_eq!(hits[0].content, "new text");
        assert_eq!(hits[0].metadata["references"], "bar.ts");
    }

    #[tokio::test]
    async fn test_step_updates_context() {
        let store = memory_store();
        let mut procedure = Procedure::new(IngestContext::new("demo", Some(store.clone())));
        procedure
            .execute(&UpsertOverviews::new(vec![foo("a")]))
            .await;
        assert!(!procedure.is_err());
        let ctx = procedure.into_result().unwrap();
        assert_eq!(ctx.persisted, 1);
        assert_eq!(store.count("demo").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_step_failure_halts_procedure() {
        let mut procedure = Procedure::new(IngestContext::new("demo", None));
        procedure
            .execute(&UpsertOverviews::new(vec![foo("a")]))
            .await
            .execute(&UpsertOverviews::new(vec![foo("b")]))
            .await;
        assert!(procedure.is_err());
        assert_eq!(procedure.stack(), ["UpsertOverviews"]);
        let msg = procedure.err().unwrap().to_string();
        assert!(msg.starts_with("process failed in 'UpsertOverviews'"), "{}", msg);
        assert!(msg.contains("\"hasStore\":false"), "{}", msg);
        assert!(msg.contains("vector store is not initialized"), "{}", msg);
    }
}
