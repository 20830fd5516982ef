//! Store selection.
//!
//! `[store] backend` picks the [`VectorStore`] behind every command:
//! `sqlite` persists to `[db] path`, `memory` lives for one process and is
//! mostly useful for dry runs.

use anyhow::{bail, Result};
use std::sync::Arc;

use code_overview_core::embedding::Embedder;
use code_overview_core::store::memory::InMemoryStore;
use code_overview_core::store::VectorStore;

use crate::config::Config;
use crate::db;
use crate::migrate::migrate_pool;
use crate::sqlite_store::SqliteStore;

/// Open the configured store, creating the SQLite schema if needed.
pub async fn open_store(
    config: &Config,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "sqlite" => {
            let pool = db::connect(config).await?;
            migrate_pool(&pool).await?;
            Ok(Arc::new(
                SqliteStore::new(pool, embedder).with_batch_size(config.embedding.batch_size),
            ))
        }
        "memory" => {
            tracing::warn!("memory store selected; nothing will be persisted");
            Ok(Arc::new(InMemoryStore::new(embedder)))
        }
        other => bail!("Unknown store backend: {}", other),
    }
}
