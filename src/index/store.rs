//! Storage seam between the index manager and concrete vector databases.

use crate::processing::Chunk;
use crate::qdrant::QdrantError;
use crate::retrieval::MetadataFilter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors returned by vector store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Qdrant request failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Local persistence failed.
    #[error("Vector store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Persisted collection could not be encoded or decoded.
    #[error("Vector store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Named collection does not exist.
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),
    /// Collection name contains characters outside `[a-z0-9-]`.
    #[error("Invalid collection name '{0}'")]
    InvalidCollectionName(String),
    /// A vector does not fit the collection.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed at collection creation.
        expected: usize,
        /// Dimension of the rejected vector.
        actual: usize,
    },
}

/// Parameters used when (re)creating a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Embedding model the collection is bound to.
    pub embedding_model: String,
}

/// A chunk and its vector, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPoint {
    /// Insertion sequence number, used to break score ties.
    pub seq: u64,
    /// Chunk payload.
    pub chunk: Chunk,
    /// Unit-length embedding.
    pub vector: Vec<f32>,
    /// SHA-256 of the chunk text.
    pub content_hash: String,
}

impl IndexedPoint {
    /// Pair a chunk with its vector at insertion position `seq`.
    pub fn new(seq: u64, chunk: Chunk, vector: Vec<f32>) -> Self {
        let content_hash = compute_chunk_hash(&chunk.text);
        Self {
            seq,
            chunk,
            vector,
            content_hash,
        }
    }
}

/// Chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
    /// Insertion sequence number of the point.
    pub seq: u64,
    /// Stored chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Snapshot describing a stored collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Embedding model the collection is bound to.
    pub embedding_model: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Number of stored vectors.
    pub vector_count: usize,
}

/// Per-document view of a collection's content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Identifier of the document.
    pub parent_document_id: String,
    /// Filename of the document.
    pub source_file: String,
    /// Caller-supplied author.
    pub author: Option<String>,
    /// Caller-supplied publication year.
    pub year: Option<i32>,
    /// Caller-supplied title.
    pub title: Option<String>,
    /// Number of stored chunks.
    pub chunk_count: usize,
}

/// Operations every vector database backend provides.
///
/// Points are keyed by `chunk_id`; upserting an existing id replaces the stored point.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create `spec.name`, dropping any previous collection with that name.
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError>;

    /// Drop a collection. Missing collections are not an error.
    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Store points, returning how many were written.
    async fn upsert(&self, collection: &str, points: Vec<IndexedPoint>)
    -> Result<usize, StoreError>;

    /// Return up to `limit` hits for `vector`, restricted by `filter`, best first.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoredHit>, StoreError>;

    /// Describe a collection, or `None` when it does not exist.
    async fn describe(&self, collection: &str) -> Result<Option<CollectionInfo>, StoreError>;

    /// Names of every collection.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Documents stored in a collection, ordered by source file.
    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentSummary>, StoreError>;
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cosine similarity of two vectors; zero when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
