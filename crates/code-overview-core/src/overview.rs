//! The overview entity and its storage projection.
//!
//! An [`Overview`] documents one code entity (a class, interface, or
//! function). Its `id` is derived from `file_path`, `content_type`, and
//! `name` only, so re-analysing the same entity produces the same key and
//! the store overwrites the previous record instead of adding a duplicate.
//!
//! [`to_document_record`] is the pure projection into the shape the vector
//! store persists. The metadata key names are a persisted contract: records
//! written by older versions must stay queryable, so never rename them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OverviewError;

pub const META_ID: &str = "id";
pub const META_NAME: &str = "name";
pub const META_PROJECT_NAME: &str = "projectName";
pub const META_FILE_PATH: &str = "filePath";
pub const META_TYPE: &str = "type";
pub const META_REFERENCES: &str = "references";
pub const META_SUMMARY: &str = "summary";
pub const META_NAMESPACE: &str = "namespace";

/// Separator used to flatten `references` into a single metadata string.
pub const REFERENCE_SEPARATOR: &str = ",";

/// Kind of code entity an overview describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Class,
    Interface,
    Function,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Class => "class",
            ContentType::Interface => "interface",
            ContentType::Function => "function",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = OverviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "class" => Ok(ContentType::Class),
            "interface" => Ok(ContentType::Interface),
            "function" => Ok(ContentType::Function),
            other => Err(OverviewError::validation(format!(
                "unknown content type '{}': must be class, interface, or function",
                other
            ))),
        }
    }
}

/// Compose the identity of an overview.
///
/// Pure function of the three identity fields; nothing else about an
/// overview influences its key.
pub fn overview_id(file_path: &str, content_type: ContentType, name: &str) -> String {
    format!("{}-{}-{}", file_path, content_type, name)
}

/// A documentation record for one code entity.
///
/// Fields are private so the identity can't drift from the fields it is
/// derived from; use the setters for the non-identity parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    id: String,
    name: String,
    content: String,
    project_name: String,
    references: Vec<String>,
    content_type: ContentType,
    file_path: String,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

impl Overview {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        project_name: impl Into<String>,
        references: Vec<String>,
        content_type: ContentType,
        file_path: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let file_path = file_path.into();
        Self {
            id: overview_id(&file_path, content_type, &name),
            name,
            content: content.into(),
            project_name: project_name.into(),
            references,
            content_type,
            file_path,
            summary: summary.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = if namespace.trim().is_empty() {
            None
        } else {
            Some(namespace)
        };
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) {
        self.summary = summary.into();
    }

    pub fn set_references(&mut self, references: Vec<String>) {
        self.references = references;
    }
}

/// Storage-facing projection of an [`Overview`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Text that gets embedded and returned by searches.
    pub content: String,
    /// Flat string metadata; see the `META_*` constants for the keys.
    pub metadata: BTreeMap<String, String>,
}

impl DocumentRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Map one overview to its document record. No I/O.
pub fn to_document_record(overview: &Overview) -> DocumentRecord {
    let mut metadata = BTreeMap::new();
    metadata.insert(META_ID.to_string(), overview.id.clone());
    metadata.insert(META_NAME.to_string(), overview.name.clone());
    metadata.insert(
        META_PROJECT_NAME.to_string(),
        overview.project_name.clone(),
    );
    metadata.insert(META_FILE_PATH.to_string(), overview.file_path.clone());
    metadata.insert(
        META_TYPE.to_string(),
        overview.content_type.as_str().to_string(),
    );
    metadata.insert(
        META_REFERENCES.to_string(),
        overview.references.join(REFERENCE_SEPARATOR),
    );
    metadata.insert(META_SUMMARY.to_string(), overview.summary.clone());
    if let Some(ns) = &overview.namespace {
        metadata.insert(META_NAMESPACE.to_string(), ns.clone());
    }

    DocumentRecord {
        content: overview.content.clone(),
        metadata,
    }
}

/// Map a batch of overviews, preserving order.
pub fn to_document_records(overviews: &[Overview]) -> Vec<DocumentRecord> {
    overviews.iter().map(to_document_record).collect()
}
