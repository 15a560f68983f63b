//! Conversion between indexed chunks and Qdrant point payloads.

use crate::index::IndexedPoint;
use crate::processing::{Chunk, ChunkMetadata};
use crate::qdrant::types::QdrantError;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(
    point: &IndexedPoint,
    embedding_model: &str,
    indexed_at: &str,
) -> Value {
    let chunk = &point.chunk;
    let metadata = &chunk.metadata;

    let mut payload = Map::new();
    payload.insert("chunk_id".into(), Value::String(chunk.chunk_id.clone()));
    payload.insert(
        "parent_document_id".into(),
        Value::String(chunk.parent_document_id.clone()),
    );
    payload.insert("text".into(), Value::String(chunk.text.clone()));
    payload.insert(
        "source_file".into(),
        Value::String(metadata.source_file.clone()),
    );
    payload.insert("page_number".into(), Value::from(metadata.page_number));
    payload.insert("chunk_index".into(), Value::from(metadata.chunk_index));
    payload.insert("seq".into(), Value::from(point.seq));
    payload.insert(
        "chunk_hash".into(),
        Value::String(point.content_hash.clone()),
    );
    payload.insert(
        "embedding_model".into(),
        Value::String(embedding_model.to_string()),
    );
    payload.insert("indexed_at".into(), Value::String(indexed_at.to_string()));

    if let Some(author) = metadata.author.as_ref().filter(|value| !value.is_empty()) {
        payload.insert("author".into(), Value::String(author.clone()));
    }
    if let Some(year) = metadata.year {
        payload.insert("year".into(), Value::from(year));
    }
    if let Some(title) = metadata.title.as_ref().filter(|value| !value.is_empty()) {
        payload.insert("title".into(), Value::String(title.clone()));
    }
    if let Some(guess) = metadata.title_guess.as_ref() {
        payload.insert("title_guess".into(), Value::String(guess.clone()));
    }

    Value::Object(payload)
}

/// Rebuild the sequence number and chunk stored in a payload.
pub(crate) fn chunk_from_payload(
    payload: &Map<String, Value>,
) -> Result<(u64, Chunk), QdrantError> {
    let seq = required_u64(payload, "seq")?;
    let chunk = Chunk {
        chunk_id: required_str(payload, "chunk_id")?,
        parent_document_id: required_str(payload, "parent_document_id")?,
        text: required_str(payload, "text")?,
        metadata: ChunkMetadata {
            source_file: required_str(payload, "source_file")?,
            page_number: to_u32(required_u64(payload, "page_number")?, "page_number")?,
            chunk_index: to_u32(required_u64(payload, "chunk_index")?, "chunk_index")?,
            author: optional_str(payload, "author"),
            year: payload
                .get("year")
                .and_then(Value::as_i64)
                .and_then(|year| i32::try_from(year).ok()),
            title: optional_str(payload, "title"),
            title_guess: optional_str(payload, "title_guess"),
        },
    };
    Ok((seq, chunk))
}

/// Deterministic point identifier derived from the chunk identifier.
pub(crate) fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

pub(crate) fn optional_str(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required_str(payload: &Map<String, Value>, key: &str) -> Result<String, QdrantError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| QdrantError::InvalidPayload(format!("missing string field '{key}'")))
}

fn required_u64(payload: &Map<String, Value>, key: &str) -> Result<u64, QdrantError> {
    payload
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| QdrantError::InvalidPayload(format!("missing integer field '{key}'")))
}

fn to_u32(value: u64, key: &str) -> Result<u32, QdrantError> {
    u32::try_from(value)
        .map_err(|_| QdrantError::InvalidPayload(format!("field '{key}' out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> IndexedPoint {
        IndexedPoint::new(
            7,
            Chunk {
                chunk_id: "abc-0003".into(),
                parent_document_id: "abc".into(),
                text: "sample".into(),
                metadata: ChunkMetadata {
                    source_file: "paper.pdf".into(),
                    page_number: 2,
                    chunk_index: 3,
                    author: Some("Silva".into()),
                    year: Some(2020),
                    title: None,
                    title_guess: Some("Guessed".into()),
                },
            },
            vec![1.0, 0.0],
        )
    }

    #[test]
    fn payload_carries_chunk_and_provenance() {
        let payload = build_payload(&point(), "all-minilm", "2025-01-01T00:00:00Z");
        assert_eq!(payload["chunk_id"], "abc-0003");
        assert_eq!(payload["page_number"], 2);
        assert_eq!(payload["seq"], 7);
        assert_eq!(payload["author"], "Silva");
        assert_eq!(payload["year"], 2020);
        assert_eq!(payload["embedding_model"], "all-minilm");
        assert!(payload.get("title").is_none());
        assert_eq!(payload["chunk_hash"].as_str().map(str::len), Some(64));
    }

    #[test]
    fn chunk_survives_payload_conversion() {
        let original = point();
        let payload = build_payload(&original, "all-minilm", "2025-01-01T00:00:00Z");
        let map = payload.as_object().expect("object");
        let (seq, chunk) = chunk_from_payload(map).expect("chunk");
        assert_eq!(seq, 7);
        assert_eq!(chunk, original.chunk);
    }

    #[test]
    fn missing_fields_are_reported() {
        let mut map = Map::new();
        map.insert("seq".into(), Value::from(1));
        let error = chunk_from_payload(&map).expect_err("invalid");
        assert!(matches!(error, QdrantError::InvalidPayload(message) if message.contains("chunk_id")));
    }

    #[test]
    fn point_ids_are_stable_uuids() {
        assert_eq!(point_id("abc-0001"), point_id("abc-0001"));
        assert_ne!(point_id("abc-0001"), point_id("abc-0002"));
        assert!(Uuid::parse_str(&point_id("abc-0001")).is_ok());
    }
}
