//! Core data types and error definitions for the chunking pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One page of raw extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Zero-based position of the page inside its document.
    pub index: usize,
    /// Text exactly as produced by the extraction layer.
    pub raw_text: String,
}

impl Page {
    /// Construct a page from its zero-based index and raw text.
    pub fn new(index: usize, raw_text: impl Into<String>) -> Self {
        Self {
            index,
            raw_text: raw_text.into(),
        }
    }
}

/// Metadata attached to every chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Filename of the document the chunk came from.
    pub source_file: String,
    /// One-based page number of the originating page.
    pub page_number: u32,
    /// Dense position of the chunk inside its document.
    pub chunk_index: u32,
    /// Author supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publication year supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Title supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Low-confidence title detected from the first page. Never used for filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_guess: Option<String>,
}

/// Retrievable unit of text produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier unique within the parent document.
    pub chunk_id: String,
    /// Identifier of the document this chunk belongs to.
    pub parent_document_id: String,
    /// Normalized chunk text.
    pub text: String,
    /// Provenance and caller-supplied metadata.
    pub metadata: ChunkMetadata,
}

/// Caller-supplied metadata for a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOverrides {
    /// Author name.
    #[serde(default)]
    pub author: Option<String>,
    /// Publication year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Document title.
    #[serde(default)]
    pub title: Option<String>,
}

/// Origin of an extracted metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// Supplied by the caller.
    Manual,
    /// Guessed from the document text; low confidence.
    Heuristic,
}

/// Metadata value tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    /// The value itself.
    pub value: String,
    /// Where the value was obtained.
    pub source: MetadataSource,
}

/// Document-level metadata reported alongside the chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    /// Filename of the processed document.
    pub source_file: String,
    /// Number of pages received.
    pub total_pages: usize,
    /// Document title, when one was supplied or detected.
    pub title: Option<MetadataValue>,
    /// Author supplied by the caller.
    pub author: Option<String>,
    /// Publication year supplied by the caller.
    pub year: Option<i32>,
}

/// Aggregate statistics for a processed document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Number of pages received.
    pub total_pages: usize,
    /// Number of chunks produced.
    pub total_chunks: usize,
    /// Mean chunk length in characters.
    pub average_chunk_chars: f64,
}

/// Successful output of the chunking pipeline for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    /// Deterministic identifier derived from the filename.
    pub document_id: String,
    /// Filename of the processed document.
    pub source_file: String,
    /// Chunks in text order with dense indices.
    pub chunks: Vec<Chunk>,
    /// Document-level metadata.
    pub extracted_metadata: ExtractedMetadata,
    /// Aggregate statistics.
    pub stats: ProcessingStats,
}

/// Tagged outcome of processing one document.
pub type ProcessingResult = Result<ProcessedDocument, ProcessingError>;

/// Failures tied to the content of an ingested document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestionError {
    /// No pages were supplied.
    #[error("document '{0}' contains no pages")]
    EmptyDocument(String),
    /// The raw content could not be decoded.
    #[error("document '{source_file}' is unreadable: {reason}")]
    Unreadable {
        /// Filename of the rejected document.
        source_file: String,
        /// Decoder diagnostic.
        reason: String,
    },
    /// Every page was blank after normalization.
    #[error("document '{0}' has no extractable text")]
    NoExtractableText(String),
}

/// Invalid splitter configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SplitError {
    /// Chunks must be allowed at least one character.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    /// Overlap has to leave room for new content in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Configured chunk size.
        chunk_size: usize,
        /// Configured overlap.
        overlap: usize,
    },
}

/// Errors emitted by the document processing pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessingError {
    /// The document itself could not be turned into chunks.
    #[error("Failed to ingest document: {0}")]
    Ingestion(#[from] IngestionError),
    /// The splitter was configured with impossible bounds.
    #[error("Invalid splitter configuration: {0}")]
    Split(#[from] SplitError),
}
