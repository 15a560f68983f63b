//! Handles and errors exposed by the index manager.

use super::store::StoreError;
use crate::embedding::EmbeddingClientError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference to a built, queryable collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionHandle {
    /// Collection name.
    pub name: String,
    /// Embedding model the collection is bound to.
    pub embedding_model_id: String,
    /// Number of stored vectors.
    pub vector_count: usize,
    /// Vector dimension.
    pub dimension: usize,
}

/// Errors emitted while building or loading collections.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Build was called without chunks.
    #[error("Cannot build an index from an empty chunk list")]
    EmptyChunks,
    /// Collection name contains characters outside `[a-z0-9-]`.
    #[error("Invalid collection name '{0}'")]
    InvalidCollectionName(String),
    /// Two chunks in one build share a chunk id.
    #[error("Duplicate chunk id '{0}' in build input")]
    DuplicateChunk(String),
    /// No persisted collection exists under the name.
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),
    /// Embedding client for the model reports a different identity.
    #[error("Embedding client mismatch: expected model '{expected}', got '{actual}'")]
    ModelMismatch {
        /// Model the caller asked for.
        expected: String,
        /// Model reported by the client.
        actual: String,
    },
    /// Embedding provider returned the wrong number of vectors.
    #[error("Embedding provider returned {actual} vectors for {expected} chunks")]
    EmbeddingCountMismatch {
        /// Number of chunks submitted.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// Embedding provider returned vectors of differing or zero length.
    #[error("Embedding provider returned inconsistent vector dimensions")]
    InconsistentDimension,
    /// Embedding provider failed.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store failed.
    #[error("Vector store request failed: {0}")]
    Store(#[from] StoreError),
    /// Collection registry could not be persisted.
    #[error("Collection registry update failed: {0}")]
    Registry(#[from] std::io::Error),
}
