//! Filter translation for Qdrant queries and payload accumulation.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use super::payload::optional_str;
use crate::index::DocumentSummary;
use crate::retrieval::{FilterValue, MetadataFilter};

/// Payload fields indexed for filtering, with their Qdrant schema.
pub(crate) const INDEXED_FIELDS: [(&str, &str); 7] = [
    ("source_file", "keyword"),
    ("parent_document_id", "keyword"),
    ("author", "keyword"),
    ("title", "keyword"),
    ("year", "integer"),
    ("page_number", "integer"),
    ("chunk_index", "integer"),
];

/// Compose a Qdrant `must` filter from a metadata filter.
pub fn build_filter(filter: &MetadataFilter) -> Option<Value> {
    let must: Vec<Value> = filter
        .conditions()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                FilterValue::Text(text) => Value::String(text),
                FilterValue::Integer(number) => Value::from(number),
            };
            json!({
                "key": key,
                "match": { "value": value }
            })
        })
        .collect();

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

/// Fold one payload into per-document summaries keyed by document id.
pub fn accumulate_document(
    payload: &Map<String, Value>,
    documents: &mut BTreeMap<String, DocumentSummary>,
) {
    let Some(document_id) = optional_str(payload, "parent_document_id") else {
        return;
    };
    let entry = documents
        .entry(document_id.clone())
        .or_insert_with(|| DocumentSummary {
            parent_document_id: document_id,
            source_file: optional_str(payload, "source_file").unwrap_or_default(),
            author: optional_str(payload, "author"),
            year: payload
                .get("year")
                .and_then(Value::as_i64)
                .and_then(|year| i32::try_from(year).ok()),
            title: optional_str(payload, "title"),
            chunk_count: 0,
        });
    entry.chunk_count += 1;
}
