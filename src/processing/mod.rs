//! Document processing pipeline: normalization, recursive splitting, and chunk metadata.

pub mod metadata;
pub mod normalize;
mod pipeline;
pub mod sanitize;
pub mod splitter;
pub mod types;

pub use normalize::normalize_text;
pub use pipeline::DocumentProcessor;
pub use splitter::RecursiveSplitter;
pub use types::{
    Chunk, ChunkMetadata, ExtractedMetadata, IngestionError, ManualOverrides, MetadataSource,
    MetadataValue, Page, ProcessedDocument, ProcessingError, ProcessingResult, ProcessingStats,
    SplitError,
};
