//! Exact-match metadata filters applied during retrieval.

use crate::processing::Chunk;
use serde::{Deserialize, Serialize};

/// Value compared by a filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// String equality.
    Text(String),
    /// Integer equality.
    Integer(i64),
}

/// Conjunction of exact-equality constraints over chunk metadata.
///
/// Every populated field must match; unset fields are unconstrained. There is no fuzzy,
/// case-insensitive, or range matching. The heuristic title guess cannot be filtered on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataFilter {
    /// Filename of the source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Identifier of the parent document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_document_id: Option<String>,
    /// One-based page number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Position of the chunk inside its document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    /// Caller-supplied author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Caller-supplied publication year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Caller-supplied title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl MetadataFilter {
    /// Filter constraining only the author.
    pub fn by_author(author: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            ..Self::default()
        }
    }

    /// True when no field is constrained.
    pub fn is_empty(&self) -> bool {
        self.conditions().is_empty()
    }

    /// Populated constraints as `(payload key, value)` pairs.
    pub fn conditions(&self) -> Vec<(&'static str, FilterValue)> {
        let mut conditions = Vec::new();
        if let Some(value) = &self.source_file {
            conditions.push(("source_file", FilterValue::Text(value.clone())));
        }
        if let Some(value) = &self.parent_document_id {
            conditions.push(("parent_document_id", FilterValue::Text(value.clone())));
        }
        if let Some(value) = self.page_number {
            conditions.push(("page_number", FilterValue::Integer(i64::from(value))));
        }
        if let Some(value) = self.chunk_index {
            conditions.push(("chunk_index", FilterValue::Integer(i64::from(value))));
        }
        if let Some(value) = &self.author {
            conditions.push(("author", FilterValue::Text(value.clone())));
        }
        if let Some(value) = self.year {
            conditions.push(("year", FilterValue::Integer(i64::from(value))));
        }
        if let Some(value) = &self.title {
            conditions.push(("title", FilterValue::Text(value.clone())));
        }
        conditions
    }

    /// Whether `chunk` satisfies every populated constraint.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        let metadata = &chunk.metadata;
        eq(&self.source_file, Some(&metadata.source_file))
            && eq(&self.parent_document_id, Some(&chunk.parent_document_id))
            && self.page_number.is_none_or(|page| page == metadata.page_number)
            && self.chunk_index.is_none_or(|index| index == metadata.chunk_index)
            && eq(&self.author, metadata.author.as_ref())
            && self.year.is_none_or(|year| Some(year) == metadata.year)
            && eq(&self.title, metadata.title.as_ref())
    }
}

fn eq(expected: &Option<String>, actual: Option<&String>) -> bool {
    match expected {
        Some(expected) => actual == Some(expected),
        None => true,
    }
}
