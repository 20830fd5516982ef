//! `ovw summarize`: chunk/map/reduce summary of a single file.

use anyhow::Result;
use std::path::Path;

use code_overview_core::summarize::{summarize, SummarizeOptions, SummaryKind};

use crate::config::{Config, SummarizeConfig};
use crate::files::read_file;
use crate::llm::create_model;

/// Prompt preset for `kind` with the configured window.
pub fn options_for(kind: SummaryKind, window: &SummarizeConfig) -> SummarizeOptions {
    SummarizeOptions::for_kind(kind).with_window(window.chunk_size, window.chunk_overlap)
}

/// CLI entry point for `ovw summarize`.
pub async fn run_summarize(config: &Config, file: &Path, kind: SummaryKind) -> Result<()> {
    let model = create_model(&config.llm)?;
    let text = read_file(file)?;

    let summary = summarize(model.as_ref(), &text, &options_for(kind, &config.summarize)).await?;
    if summary.is_empty() {
        println!("(empty file, nothing to summarize)");
    } else {
        println!("{}", summary);
    }
    Ok(())
}
