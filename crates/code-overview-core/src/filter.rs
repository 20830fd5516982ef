//! Metadata filter predicates for similarity search.
//!
//! [`build_filter`] turns optional query constraints into a [`Filter`] tree
//! that stores evaluate against each record's metadata. The builder is
//! deterministic and performs no I/O.
//!
//! # Composition rules
//!
//! | Constraint | Leaf |
//! |------------|------|
//! | `project_name` | `projectName` equals |
//! | `content_type` | `type` equals |
//! | `name` | `name` contains |
//! | `namespace` | `namespace` contains |
//! | each of `references` | `references` contains |
//!
//! Reference leaves are OR-ed together; field groups are AND-ed. No
//! constraints gives `None` (match everything) and a single leaf is
//! returned unwrapped.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::overview::{
    ContentType, META_NAME, META_NAMESPACE, META_PROJECT_NAME, META_REFERENCES, META_TYPE,
};

/// Boolean expression over string metadata fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Field value equals the operand exactly.
    Eq { field: String, value: String },
    /// Field value contains the operand as a substring.
    Contains { field: String, value: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate against a metadata map. Missing fields never match a leaf.
    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        match self {
            Filter::Eq { field, value } => metadata.get(field).is_some_and(|v| v == value),
            Filter::Contains { field, value } => {
                metadata.get(field).is_some_and(|v| v.contains(value.as_str()))
            }
            Filter::And(parts) => parts.iter().all(|f| f.matches(metadata)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(metadata)),
        }
    }

    /// Render as a Chroma-style `where` expression.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::Eq { field, value } => json!({ field: { "$eq": value } }),
            Filter::Contains { field, value } => json!({ field: { "$contains": value } }),
            Filter::And(parts) => {
                json!({ "$and": parts.iter().map(Filter::to_json).collect::<Vec<_>>() })
            }
            Filter::Or(parts) => {
                json!({ "$or": parts.iter().map(Filter::to_json).collect::<Vec<_>>() })
            }
        }
    }
}

/// Render an optional filter; `None` becomes the empty object.
pub fn filter_to_json(filter: Option<&Filter>) -> Value {
    filter.map(Filter::to_json).unwrap_or_else(|| json!({}))
}

/// Optional query constraints accepted by [`build_filter`].
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub content_type: Option<ContentType>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub references: Vec<String>,
    pub project_name: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Build a filter from the given constraints.
pub fn build_filter(options: &FilterOptions) -> Option<Filter> {
    let mut filters = Vec::new();

    if let Some(project) = non_empty(&options.project_name) {
        filters.push(Filter::eq(META_PROJECT_NAME, project));
    }

    if let Some(content_type) = options.content_type {
        filters.push(Filter::eq(META_TYPE, content_type.as_str()));
    }

    if let Some(name) = non_empty(&options.name) {
        filters.push(Filter::contains(META_NAME, name));
    }

    if let Some(namespace) = non_empty(&options.namespace) {
        filters.push(Filter::contains(META_NAMESPACE, namespace));
    }

    let mut reference_leaves: Vec<Filter> = options
        .references
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| Filter::contains(META_REFERENCES, r.as_str()))
        .collect();
    match reference_leaves.len() {
        0 => {}
        1 => filters.push(reference_leaves.remove(0)),
        _ => filters.push(Filter::Or(reference_leaves)),
    }

    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(Filter::And(filters)),
    }
}
