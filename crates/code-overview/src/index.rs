//! Overview indexing and collection removal.
//!
//! `ovw index <dir> --project <name>` discovers source files, asks the
//! language model for the overviews in each one, and upserts the accepted
//! records into the project's collection through the ingestion procedure:
//!
//! ```text
//! discover ──▶ extract (all files, concurrently) ──▶ Procedure[UpsertOverviews]
//!                   │
//!                   └──rejected──▶ logged and skipped
//! ```
//!
//! Re-indexing a directory overwrites records with the same identity
//! (`{file}-{type}-{name}`) instead of duplicating them.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use code_overview_core::extract::{extract_all, FileExtraction};
use code_overview_core::ingest::{IngestContext, UpsertOverviews};
use code_overview_core::llm::LanguageModel;
use code_overview_core::procedure::Procedure;
use code_overview_core::store::VectorStore;

use crate::config::{Config, FilesConfig};
use crate::embedding::create_embedder;
use crate::files::{discover_files, read_sources};
use crate::llm::create_model;
use crate::store::open_store;

/// Counts from one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Files sent to the model.
    pub files: usize,
    /// Files whose reply failed validation.
    pub rejected: Vec<String>,
    /// Overviews accepted across all files.
    pub overviews: usize,
    /// Records written to the store.
    pub persisted: usize,
}

/// Extract overviews from every matching file under `dir` and upsert them
/// into the `project` collection.
///
/// A model transport failure aborts the run before anything is written. A
/// store failure surfaces as the procedure's error, naming the step.
pub async fn index_directory(
    model: &dyn LanguageModel,
    store: Arc<dyn VectorStore>,
    files: &FilesConfig,
    dir: &Path,
    project: &str,
) -> Result<IndexReport> {
    let found = discover_files(dir, files)?;
    let sources = read_sources(&found)?;
    tracing::info!(project, files = sources.len(), "extracting overviews");

    let extractions = extract_all(model, project, &sources).await?;

    let mut report = IndexReport {
        files: sources.len(),
        ..Default::default()
    };
    let mut batch = Vec::new();
    for extraction in extractions {
        match extraction {
            FileExtraction::Extracted(overviews) => batch.extend(overviews),
            FileExtraction::Rejected { file_path, reason } => {
                tracing::warn!(file = %file_path, %reason, "skipping file with invalid overviews");
                report.rejected.push(file_path);
            }
        }
    }
    report.overviews = batch.len();

    let mut procedure = Procedure::new(IngestContext::new(project, Some(store)));
    procedure.execute(&UpsertOverviews::new(batch)).await;
    let ctx = procedure.into_result()?;
    report.persisted = ctx.persisted;

    tracing::info!(
        project,
        run_id = %ctx.run_id,
        persisted = report.persisted,
        rejected = report.rejected.len(),
        "index complete"
    );
    Ok(report)
}

/// CLI entry point for `ovw index`.
pub async fn run_index(config: &Config, dir: &Path, project: &str) -> Result<()> {
    let model = create_model(&config.llm)?;
    let embedder = create_embedder(&config.embedding)?;
    let store = open_store(config, embedder).await?;

    let report = index_directory(model.as_ref(), store, &config.files, dir, project).await?;

    println!("Index {}:", project);
    println!("  files scanned: {}", report.files);
    println!("  overviews extracted: {}", report.overviews);
    println!("  records persisted: {}", report.persisted);
    if !report.rejected.is_empty() {
        println!("  files skipped: {}", report.rejected.len());
        for file in &report.rejected {
            println!("    {}", file);
        }
    }
    Ok(())
}

/// CLI entry point for `ovw clear`: drop every overview of `project`.
pub async fn run_clear(config: &Config, project: &str) -> Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let store = open_store(config, embedder).await?;
    let before = store.count(project).await?;
    store.delete_collection(project).await?;
    println!("Cleared {} overview(s) from '{}'", before, project);
    Ok(())
}
