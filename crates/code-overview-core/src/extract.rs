//! Structured overview extraction.
//!
//! Asks the language model to describe every class, interface, and function
//! in a file as JSON, validates each record, and turns the valid ones into
//! [`Overview`]s.
//!
//! Two failure classes are kept apart on purpose:
//!
//! - A **transport** failure (the model call itself) is an
//!   [`OverviewError::ExternalService`] and fails the caller.
//! - A **validation** failure (reply is not JSON, or a record doesn't match
//!   the schema) only concerns this file. [`extract_overviews`] reports it
//!   as [`FileExtraction::Rejected`] so a batch over many files carries on.

use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{OverviewError, Result};
use crate::llm::{LanguageModel, MalformedReply};
use crate::overview::{ContentType, Overview};

/// One record as the model returns it, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewDraft {
    /// Description of the entity; becomes [`Overview::content`].
    pub text: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub references: Vec<String>,
}

impl OverviewDraft {
    /// Check the draft and build an overview for `file_path` in `project`.
    ///
    /// The caller's `file_path` always wins over the one the model echoed,
    /// so the id stays tied to the file that was actually analysed.
    pub fn into_overview(self, project: &str, file_path: &str) -> Result<Overview> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(OverviewError::validation("overview name is empty"));
        }
        if self.text.trim().is_empty() {
            return Err(OverviewError::validation(format!(
                "overview '{}' has no text",
                name
            )));
        }
        let content_type: ContentType = self.content_type.parse()?;

        if let Some(echoed) = self.file_path.as_deref() {
            if !echoed.is_empty() && echoed != file_path {
                tracing::debug!(echoed, file_path, "model echoed a different file path");
            }
        }

        let references = self
            .references
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        let overview = Overview::new(
            name,
            self.text.trim(),
            project,
            references,
            content_type,
            file_path,
            self.summary.trim(),
        );
        Ok(match self.namespace {
            Some(ns) => overview.with_namespace(ns),
            None => overview,
        })
    }
}

/// JSON schema of one overview record.
pub fn overview_record_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": { "type": "string", "description": "What the entity does and how it is used" },
            "type": { "type": "string", "enum": ["class", "interface", "function"] },
            "name": { "type": "string" },
            "namespace": { "type": "string", "description": "Enclosing module, package, or namespace" },
            "filePath": { "type": "string" },
            "summary": { "type": "string", "description": "One sentence" },
            "references": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Files or symbols this entity depends on"
            }
        },
        "required": ["text", "type", "name", "filePath", "summary", "references"]
    })
}

/// JSON schema of a reply carrying zero or more records.
pub fn overview_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "overviews": { "type": "array", "items": overview_record_schema() }
        },
        "required": ["overviews"]
    })
}

const EXTRACT_PROMPT: &str = "You document source code. List every class, interface, and \
top-level function defined in the file below. For each one give its name, its type, the \
namespace or module it lives in, a description of what it does and how to use it, a one \
sentence summary, and the files or symbols it references.";

const EXTRACT_ONE_PROMPT: &str = "You document source code. Describe the most important \
class, interface, or function defined in the file below: its name, its type, the namespace \
or module it lives in, what it does and how to use it, a one sentence summary, and the files \
or symbols it references.";

fn build_prompt(instructions: &str, file_path: &str, text: &str) -> String {
    format!(
        "{}\n\nFile: {}\n\n```\n{}\n```",
        instructions, file_path, text
    )
}

/// Outcome of extracting one file.
#[derive(Debug, Clone)]
pub enum FileExtraction {
    /// Every record validated. May be empty.
    Extracted(Vec<Overview>),
    /// The reply didn't match the schema; the file contributes nothing.
    Rejected { file_path: String, reason: String },
}

impl FileExtraction {
    /// Overviews produced; empty for a rejected file.
    pub fn into_overviews(self) -> Vec<Overview> {
        match self {
            FileExtraction::Extracted(overviews) => overviews,
            FileExtraction::Rejected { .. } => Vec::new(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, FileExtraction::Rejected { .. })
    }
}

fn parse_overview_reply(value: Value, project: &str, file_path: &str) -> Result<Vec<Overview>> {
    // Accept the wrapped object or a bare array.
    let records = match value {
        Value::Object(mut map) => match map.remove("overviews") {
            Some(records) => records,
            None => return Err(OverviewError::validation("reply has no 'overviews' field")),
        },
        array @ Value::Array(_) => array,
        other => {
            return Err(OverviewError::validation(format!(
                "expected an object or array, got {}",
                other
            )))
        }
    };

    let drafts: Vec<OverviewDraft> = serde_json::from_value(records)
        .map_err(|e| OverviewError::validation(format!("malformed overview record: {}", e)))?;

    drafts
        .into_iter()
        .map(|d| d.into_overview(project, file_path))
        .collect()
}

/// Split a structured-call failure into "bad reply" and "call failed".
fn classify(err: anyhow::Error, file_path: &str) -> OverviewError {
    if err.downcast_ref::<MalformedReply>().is_some() {
        OverviewError::validation(format!("{:#}", err))
    } else {
        OverviewError::external("language model", err.context(format!("extracting {}", file_path)))
    }
}

/// Ask the model for the overviews defined in one file.
///
/// # Errors
///
/// Returns [`OverviewError::ExternalService`] only when the model call
/// itself fails. Invalid replies become [`FileExtraction::Rejected`].
pub async fn extract_overviews(
    model: &dyn LanguageModel,
    project: &str,
    file_path: &str,
    text: &str,
) -> Result<FileExtraction> {
    let prompt = build_prompt(EXTRACT_PROMPT, file_path, text);
    let parsed = match model.invoke_structured(&prompt, &overview_schema()).await {
        Ok(value) => parse_overview_reply(value, project, file_path),
        Err(e) => match classify(e, file_path) {
            err @ OverviewError::Validation { .. } => Err(err),
            err => return Err(err),
        },
    };

    match parsed {
        Ok(overviews) => {
            tracing::debug!(file_path, count = overviews.len(), "extracted overviews");
            Ok(FileExtraction::Extracted(overviews))
        }
        Err(e) => {
            tracing::warn!(file_path, error = %e, "rejected extraction");
            Ok(FileExtraction::Rejected {
                file_path: file_path.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Ask the model for exactly one overview of a file.
///
/// # Errors
///
/// - [`OverviewError::ExternalService`] when the model call fails.
/// - [`OverviewError::Validation`] when the reply is not JSON or doesn't
///   match [`overview_record_schema`].
pub async fn extract_overview(
    model: &dyn LanguageModel,
    project: &str,
    file_path: &str,
    text: &str,
) -> Result<Overview> {
    let prompt = build_prompt(EXTRACT_ONE_PROMPT, file_path, text);
    let value = model
        .invoke_structured(&prompt, &overview_record_schema())
        .await
        .map_err(|e| classify(e, file_path))?;

    let draft: OverviewDraft = serde_json::from_value(value)
        .map_err(|e| OverviewError::validation(format!("malformed overview record: {}", e)))?;
    draft.into_overview(project, file_path)
}

/// A file handed to [`extract_all`].
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path recorded on the overviews (usually relative to the project root).
    pub path: String,
    pub text: String,
}

/// Extract every file concurrently and wait for all of them.
///
/// Results keep the input order. A transport failure on any file fails the
/// whole batch, but only after every call has finished.
pub async fn extract_all(
    model: &dyn LanguageModel,
    project: &str,
    files: &[SourceFile],
) -> Result<Vec<FileExtraction>> {
    let results = join_all(
        files
            .iter()
            .map(|f| extract_overviews(model, project, &f.path, &f.text)),
    )
    .await;
    results.into_iter().collect()
}
