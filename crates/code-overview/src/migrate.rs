//! Idempotent schema setup for the overview store.
//!
//! Every statement is `IF NOT EXISTS`, so `ovw init` can run any number of
//! times and every command that opens the store runs it first.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database and schema named by the config.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema on an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per overview; `id` is the overview identity, unique within a
    // collection (project).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS overview_documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB,
            embedding_model TEXT,
            content_hash TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_overview_documents_updated_at \
         ON overview_documents(collection, updated_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
