//! Project document generation.
//!
//! `ovw overview <dir>` keeps a markdown document (an overview, a coding
//! rules digest, or a developer guide) in sync with a source tree:
//!
//! 1. Discover the files under `<dir>`.
//! 2. Summarize every file concurrently with the prompt preset for the
//!    document kind.
//! 3. Read the current document, or start from nothing.
//! 4. Ask the model once to merge the file list, the current document and
//!    the fresh summaries into an updated document. The model also drops
//!    sections for files that no longer exist. Guidelines instead merge
//!    per-file JSON category entries into a fixed developer guide outline.
//! 5. Write the reply back to the document and return it.

use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::path::{Path, PathBuf};

use code_overview_core::error::OverviewError;
use code_overview_core::llm::LanguageModel;
use code_overview_core::summarize::{summarize, SummarizeOptions, SummaryKind};

use crate::config::{Config, FilesConfig};
use crate::files::{discover_files, read_file, read_sources, FoundFile};
use crate::llm::create_model;
use crate::summarize::options_for;

/// Summary of one file, as fed to the merge prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub relative: String,
    pub absolute: PathBuf,
    pub summary: String,
}

/// Build the single merge prompt for the document update.
///
/// Overviews and coding rules merge per-file sections against the file
/// list. Guidelines merge the per-file JSON category entries into a fixed
/// developer guide outline and take no file list.
pub fn merge_prompt(
    kind: SummaryKind,
    file_list: &[String],
    existing: &str,
    summaries: &[FileSummary],
) -> String {
    match kind {
        SummaryKind::Guidelines => guidelines_merge_prompt(existing, summaries),
        SummaryKind::Overview | SummaryKind::CodeRules => {
            sectioned_merge_prompt(kind, file_list, existing, summaries)
        }
    }
}

const GUIDE_OUTLINE: &str = "# Developer Guide

## 1. Interface categories
A short index of every category (Repository, Domain Model, Procedure, Context, Server, ...).

## 2. Category details
For each category:
- **Responsibility**: the role of this layer or interface in the architecture.
- **Setup and configuration**: dependency wiring, environment variables, client or server startup.
- **Core methods and examples**: key signatures, parameters and example calls in code blocks.
- **Errors and logging**: how errors are raised and logged.
- **Performance and monitoring**: indexing, caching and metrics advice.

## 3. Code style and naming

## 4. Comments and documentation

## 5. Testing
- Unit tests: examples and coverage goals
- Integration tests: environment setup and cleanup

## 6. Operations and monitoring

## 7. Appendix
- Common errors and troubleshooting
- Collected code snippets";

fn guidelines_merge_prompt(existing: &str, summaries: &[FileSummary]) -> String {
    let entries = summaries
        .iter()
        .map(|s| s.summary.as_str())
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "You are a senior architect writing a developer guide for the team. Merge the JSON \
         summaries below into the following structure, adding explanations and examples where \
         needed. Output only the complete Markdown document.\n\n\
         {outline}\n\n\
         Below is the current guidelines.md:\n\
         {existing}\n\n\
         Below are the per-file JSON summaries; place them in the matching sections:\n\
         ```json\n{entries}\n```\n\n\
         Output the Markdown document in the structure above.\n",
        outline = GUIDE_OUTLINE,
        existing = existing,
        entries = entries,
    )
}

fn sectioned_merge_prompt(
    kind: SummaryKind,
    file_list: &[String],
    existing: &str,
    summaries: &[FileSummary],
) -> String {
    let document = kind.document_file_name();
    let sections = summaries
        .iter()
        .map(|s| {
            format!(
                "### {}\nFull path: {}\n{}",
                s.relative,
                s.absolute.display(),
                s.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Below is the complete list of files in the target directory. Organize it into the file index section:\n\
         {files}\n\n\
         Below is the current {document} (use it as the base):\n\
         {existing}\n\n\
         Below are the latest summaries of each file:\n\
         {sections}\n\n\
         Output the complete updated {document}. Merge the information above, adding or replacing \
         sections and preferring the new summaries. Remove entries for files that are no longer \
         in the list. Put the full path under each file heading.\n",
        files = file_list.join("\n\n"),
        document = document,
        existing = existing,
        sections = sections,
    )
}

/// Read the current document; a missing file is an empty document.
fn read_existing(path: &Path) -> Result<String> {
    if path.exists() {
        read_file(path)
    } else {
        Ok(String::new())
    }
}

async fn summarize_files(
    model: &dyn LanguageModel,
    found: &[FoundFile],
    options: &SummarizeOptions,
) -> Result<Vec<FileSummary>> {
    let sources = read_sources(found)?;
    let summaries = try_join_all(sources.iter().map(|source| async move {
        let summary = summarize(model, &source.text, options).await?;
        tracing::info!(
            file = %source.path,
            preview = %summary.chars().take(60).collect::<String>().replace('\n', " "),
            "file summarized"
        );
        Ok::<_, OverviewError>(summary)
    }))
    .await?;

    // Non-UTF-8 files were dropped by `read_sources`; match by relative path.
    Ok(sources
        .iter()
        .zip(summaries)
        .filter_map(|(source, summary)| {
            found
                .iter()
                .find(|f| f.relative == source.path)
                .map(|f| FileSummary {
                    relative: f.relative.clone(),
                    absolute: f.absolute.clone(),
                    summary,
                })
        })
        .collect())
}

/// Regenerate the project document at `output` from the files under `dir`.
///
/// Returns the new document text, which is also written to `output`.
pub async fn generate_project_document(
    model: &dyn LanguageModel,
    files: &FilesConfig,
    dir: &Path,
    output: &Path,
    kind: SummaryKind,
    options: &SummarizeOptions,
) -> Result<String> {
    let found = discover_files(dir, files)?;
    tracing::info!(files = found.len(), kind = kind.as_str(), "summarizing files");

    let summaries = summarize_files(model, &found, options).await?;
    let existing = read_existing(output)?;
    let file_list: Vec<String> = found
        .iter()
        .map(|f| f.absolute.display().to_string())
        .collect();

    let prompt = merge_prompt(kind, &file_list, &existing, &summaries);
    let document = model
        .invoke(&prompt)
        .await
        .map_err(|e| OverviewError::external("language model", e.context("merge step failed")))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(output, &document)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(
        output = %output.display(),
        summaries = summaries.len(),
        "project document updated"
    );

    Ok(document)
}

/// CLI entry point for `ovw overview`.
pub async fn run_overview(
    config: &Config,
    dir: &Path,
    output: Option<PathBuf>,
    kind: SummaryKind,
) -> Result<()> {
    let model = create_model(&config.llm)?;
    let output = output.unwrap_or_else(|| PathBuf::from(kind.document_file_name()));
    let options = options_for(kind, &config.summarize);

    generate_project_document(model.as_ref(), &config.files, dir, &output, kind, &options).await?;
    println!("Wrote {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prompt_sections() {
        let summaries = vec![FileSummary {
            relative: "src/a.ts".to_string(),
            absolute: PathBuf::from("/repo/src/a.ts"),
            summary: "Exports a.".to_string(),
        }];
        let prompt = merge_prompt(
            SummaryKind::CodeRules,
            &["/repo/src/a.ts".to_string(), "/repo/src/b.ts".to_string()],
            "# Old rules",
            &summaries,
        );
        assert!(prompt.contains("/repo/src/a.ts\n\n/repo/src/b.ts"));
        assert!(prompt.contains("current code_rules.md"));
        assert!(prompt.contains("# Old rules"));
        assert!(prompt.contains("### src/a.ts\nFull path: /repo/src/a.ts\nExports a."));
    }

    #[test]
    fn test_guidelines_merge_uses_outline_and_json_entries() {
        let summaries = vec![
            FileSummary {
                relative: "src/repo.ts".to_string(),
                absolute: PathBuf::from("/repo/src/repo.ts"),
                summary: r#"[{"category": "Repository"}]"#.to_string(),
            },
            FileSummary {
                relative: "src/model.ts".to_string(),
                absolute: PathBuf::from("/repo/src/model.ts"),
                summary: r#"[{"category": "Domain Model"}]"#.to_string(),
            },
        ];
        let prompt = merge_prompt(
            SummaryKind::Guidelines,
            &["/repo/src/unlisted.ts".to_string()],
            "# Old guide",
            &summaries,
        );
        assert!(prompt.contains("# Developer Guide\n\n## 1. Interface categories"));
        assert!(prompt.contains("# Old guide"));
        assert!(prompt.contains(
            "```json\n[{\"category\": \"Repository\"}],\n[{\"category\": \"Domain Model\"}]\n```"
        ));
        assert!(!prompt.contains("unlisted.ts"));
        assert!(!prompt.contains("Full path:"));
    }

    #[test]
    fn test_missing_document_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_existing(&dir.path().join("overview.md")).unwrap(), "");
    }
}
