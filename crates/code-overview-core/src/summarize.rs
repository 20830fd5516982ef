//! Chunk/map/reduce summarization.
//!
//! 1. **Chunk**: split the text into overlapping windows ([`split_text`]).
//! 2. **Map**: send every window to the model with the map prompt. The
//!    calls run concurrently; partial summaries keep chunk order.
//! 3. **Reduce**: join the partials with a blank line and send them once
//!    with the combine prompt. The reply is trimmed.
//!
//! A text of `n` windows costs exactly `n + 1` model calls. Empty text costs
//! none and summarizes to the empty string. Any model failure fails the
//! whole summary; nothing is retried here.

use futures::future::try_join_all;

use crate::chunk::{split_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::{OverviewError, Result};
use crate::llm::{fill_prompt, LanguageModel};

pub const DEFAULT_MAP_PROMPT: &str = "Extract the key points of the following content:\n\n{text}";
pub const DEFAULT_COMBINE_PROMPT: &str =
    "Merge the key points above into a concise summary of the file:\n\n{text}";

const CODE_RULES_MAP_PROMPT: &str = "Analyze the following code and extract the coding rules, \
patterns and best practices it follows:\n\n{text}";
const CODE_RULES_COMBINE_PROMPT: &str = "Merge all of the following coding rules and best \
practices into one complete code style document:\n\n{text}";

const GUIDELINES_MAP_PROMPT: &str = r#"Analyze the following code file and extract the key information and usage examples for each interface category. Output a JSON array in this format:
[
  {
    "category": "Repository",
    "purpose": "what this interface or class is responsible for",
    "usage": "example calling code",
    "notes": "caveats such as error handling or transactions"
  }
]

Code:
{text}"#;
const GUIDELINES_COMBINE_PROMPT: &str = "Merge the following JSON arrays into a single JSON \
array, keeping one entry per category and combining their usage and notes. Output only the \
JSON array:\n\n{text}";

/// Which kind of document a summary feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryKind {
    /// General file overview.
    #[default]
    Overview,
    /// Coding rules and conventions.
    CodeRules,
    /// Developer usage guidelines.
    Guidelines,
}

impl SummaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::Overview => "overview",
            SummaryKind::CodeRules => "code_rules",
            SummaryKind::Guidelines => "guidelines",
        }
    }

    /// Default output file name for the project document of this kind.
    pub fn document_file_name(&self) -> &'static str {
        match self {
            SummaryKind::Overview => "overview.md",
            SummaryKind::CodeRules => "code_rules.md",
            SummaryKind::Guidelines => "guidelines.md",
        }
    }
}

impl std::str::FromStr for SummaryKind {
    type Err = OverviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "overview" => Ok(SummaryKind::Overview),
            "code_rules" => Ok(SummaryKind::CodeRules),
            "guidelines" => Ok(SummaryKind::Guidelines),
            other => Err(OverviewError::validation(format!(
                "unknown summary kind '{}': must be overview, code_rules, or guidelines",
                other
            ))),
        }
    }
}

/// Window sizes and prompt templates for [`summarize`].
///
/// Prompts use `{text}` as the placeholder for the chunk or the joined
/// partial summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub map_prompt: String,
    pub combine_prompt: String,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self::for_kind(SummaryKind::Overview)
    }
}

impl SummarizeOptions {
    /// Default windows with the prompt pair for `kind`.
    pub fn for_kind(kind: SummaryKind) -> Self {
        let (map_prompt, combine_prompt) = match kind {
            SummaryKind::Overview => (DEFAULT_MAP_PROMPT, DEFAULT_COMBINE_PROMPT),
            SummaryKind::CodeRules => (CODE_RULES_MAP_PROMPT, CODE_RULES_COMBINE_PROMPT),
            SummaryKind::Guidelines => (GUIDELINES_MAP_PROMPT, GUIDELINES_COMBINE_PROMPT),
        };
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            map_prompt: map_prompt.to_string(),
            combine_prompt: combine_prompt.to_string(),
        }
    }

    pub fn with_window(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }
}

/// Summarize `text` with one map call per window and one reduce call.
///
/// # Errors
///
/// - [`OverviewError::Configuration`] for an invalid window.
/// - [`OverviewError::ExternalService`] when any model call fails.
pub async fn summarize(
    model: &dyn LanguageModel,
    text: &str,
    options: &SummarizeOptions,
) -> Result<String> {
    let chunks = split_text(text, options.chunk_size, options.chunk_overlap)?;
    if chunks.is_empty() {
        return Ok(String::new());
    }

    tracing::debug!(
        model = model.model_name(),
        chunks = chunks.len(),
        "summarizing"
    );

    let map_prompts: Vec<String> = chunks
        .iter()
        .map(|chunk| fill_prompt(&options.map_prompt, &chunk.text))
        .collect();
    let partials = try_join_all(map_prompts.iter().map(|prompt| model.invoke(prompt)))
        .await
        .map_err(|e| OverviewError::external("language model", e.context("map step failed")))?;

    let joined = partials.join("\n\n");
    let reduced = model
        .invoke(&fill_prompt(&options.combine_prompt, &joined))
        .await
        .map_err(|e| OverviewError::external("language model", e.context("reduce step failed")))?;

    Ok(reduced.trim().to_string())
}
