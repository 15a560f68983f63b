//! Similarity search over a built collection.

use super::filter::MetadataFilter;
use crate::embedding::{EmbedderPool, EmbeddingClientError};
use crate::index::{CollectionHandle, StoreError, StoredHit, VectorStore};
use crate::processing::Chunk;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

/// A chunk ranked against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity between the query and the chunk.
    pub similarity_score: f32,
}

/// Outcome of a search.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    /// Results in descending score order, at most `k` long.
    Ranked(Vec<RetrievalResult>),
    /// No chunk satisfied the filter.
    NoMatchingDocuments,
}

impl RetrievalOutcome {
    /// Ranked results, empty when nothing matched.
    pub fn into_results(self) -> Vec<RetrievalResult> {
        match self {
            Self::Ranked(results) => results,
            Self::NoMatchingDocuments => Vec::new(),
        }
    }
}

/// Errors emitted while searching.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Collection behind the handle does not exist.
    #[error("Index '{0}' is not built or was removed")]
    IndexNotReady(String),
    /// Embedding client serves a different model than the collection.
    #[error("Query embedded with '{actual}' but collection is bound to '{expected}'")]
    ModelMismatch {
        /// Model the collection is bound to.
        expected: String,
        /// Model reported by the client.
        actual: String,
    },
    /// Query vector does not fit the collection.
    #[error("Query vector has dimension {actual}, collection expects {expected}")]
    DimensionMismatch {
        /// Collection dimension.
        expected: usize,
        /// Query vector dimension.
        actual: usize,
    },
    /// Query text was blank.
    #[error("Query text must not be empty")]
    EmptyQuery,
    /// Embedding provider returned no vector for the query.
    #[error("Embedding provider returned no vector for the query")]
    EmptyEmbedding,
    /// Embedding provider failed.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store failed.
    #[error("Vector store query failed: {0}")]
    Store(StoreError),
}

/// Ranks chunks of a collection by similarity to a query.
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    embedders: Arc<EmbedderPool>,
}

impl RetrievalEngine {
    /// Construct an engine over the store and embedding clients used to build collections.
    pub fn new(store: Arc<dyn VectorStore>, embedders: Arc<EmbedderPool>) -> Self {
        Self { store, embedders }
    }

    /// Return up to `k` chunks of `handle` closest to `query`.
    ///
    /// `k == 0` is treated as 1. An empty filter is the same as no filter. Ties keep insertion
    /// order.
    pub async fn search(
        &self,
        handle: &CollectionHandle,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        let k = k.max(1);

        let client = self.embedders.get(&handle.embedding_model_id).await?;
        if client.model_id() != handle.embedding_model_id {
            return Err(RetrievalError::ModelMismatch {
                expected: handle.embedding_model_id.clone(),
                actual: client.model_id().to_string(),
            });
        }

        let vector = client
            .generate_embeddings(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .filter(|vector| !vector.is_empty())
            .ok_or(RetrievalError::EmptyEmbedding)?;
        if vector.len() != handle.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: handle.dimension,
                actual: vector.len(),
            });
        }

        let filter = filter.filter(|filter| !filter.is_empty());
        let mut hits = self
            .store
            .query(&handle.name, &vector, k, filter)
            .await
            .map_err(|error| match error {
                StoreError::CollectionNotFound(name) => RetrievalError::IndexNotReady(name),
                other => RetrievalError::Store(other),
            })?;

        if hits.is_empty() {
            tracing::debug!(
                collection = %handle.name,
                filtered = filter.is_some(),
                "No chunks matched query"
            );
            return Ok(RetrievalOutcome::NoMatchingDocuments);
        }

        hits.sort_by(rank_order);
        hits.truncate(k);
        tracing::debug!(
            collection = %handle.name,
            results = hits.len(),
            top_score = hits[0].score,
            "Retrieval completed"
        );

        Ok(RetrievalOutcome::Ranked(
            hits.into_iter()
                .map(|hit| RetrievalResult {
                    chunk: hit.chunk,
                    similarity_score: hit.score,
                })
                .collect(),
        ))
    }
}

fn rank_order(a: &StoredHit, b: &StoredHit) -> Ordering {
    b.score.total_cmp(&a.score).then(a.seq.cmp(&b.seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, HashingEmbeddingClient};
    use crate::index::{CollectionRegistry, IndexManager, LocalVectorStore};
    use crate::processing::{DocumentProcessor, ManualOverrides, Page};
    use async_trait::async_trait;

    fn pool() -> Arc<EmbedderPool> {
        Arc::new(EmbedderPool::with_factory(
            "hash",
            Arc::new(|model: &str| {
                let client: Arc<dyn EmbeddingClient> =
                    Arc::new(HashingEmbeddingClient::new(model, 64)?);
                Ok(client)
            }),
        ))
    }

    async fn fixture() -> (RetrievalEngine, CollectionHandle) {
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
        let embedders = pool();
        let manager = IndexManager::new(
            Arc::clone(&store),
            Arc::clone(&embedders),
            CollectionRegistry::in_memory(),
            "papers",
        );
        let processor = DocumentProcessor::new(60, 0).expect("processor");
        let silva = processor
            .process(
                &[Page::new(
                    0,
                    "Soil moisture sensors measured irrigation demand.\n\nCrop yield rose after drip irrigation.",
                )],
                "silva.pdf",
                Some(&ManualOverrides {
                    author: Some("Silva".into()),
                    year: Some(2020),
                    title: None,
                }),
            )
            .expect("silva");
        let costa = processor
            .process(
                &[Page::new(0, "Transformer models translate legal documents.")],
                "costa.pdf",
                Some(&ManualOverrides {
                    author: Some("Costa".into()),
                    year: Some(2022),
                    title: None,
                }),
            )
            .expect("costa");

        let mut chunks = silva.chunks;
        chunks.extend(costa.chunks);
        let handle = manager.build(&chunks, "hash").await.expect("build");
        (RetrievalEngine::new(store, embedders), handle)
    }

    #[tokio::test]
    async fn ranks_by_descending_similarity() {
        let (engine, handle) = fixture().await;
        let results = engine
            .search(&handle, "drip irrigation crop yield", 3, None)
            .await
            .expect("search")
            .into_results();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.metadata.source_file, "silva.pdf");
        assert!(
            results
                .windows(2)
                .all(|pair| pair[0].similarity_score >= pair[1].similarity_score)
        );
    }

    #[tokio::test]
    async fn k_zero_returns_single_result() {
        let (engine, handle) = fixture().await;
        let results = engine
            .search(&handle, "irrigation", 0, None)
            .await
            .expect("search")
            .into_results();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn filter_restricts_results() {
        let (engine, handle) = fixture().await;
        let filter = MetadataFilter::by_author("Costa");
        let results = engine
            .search(&handle, "irrigation", 5, Some(&filter))
            .await
            .expect("search")
            .into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.metadata.author.as_deref(), Some("Costa"));
    }

    #[tokio::test]
    async fn filter_matching_nothing_is_not_an_error() {
        let (engine, handle) = fixture().await;
        let filter = MetadataFilter::by_author("Nobody");
        let outcome = engine
            .search(&handle, "irrigation", 5, Some(&filter))
            .await
            .expect("search");
        assert_eq!(outcome, RetrievalOutcome::NoMatchingDocuments);
    }

    #[tokio::test]
    async fn missing_collection_is_not_ready() {
        let (engine, mut handle) = fixture().await;
        handle.name = "papers-gone".into();
        assert!(matches!(
            engine.search(&handle, "irrigation", 5, None).await,
            Err(RetrievalError::IndexNotReady(name)) if name == "papers-gone"
        ));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let (engine, handle) = fixture().await;
        assert!(matches!(
            engine.search(&handle, "   ", 5, None).await,
            Err(RetrievalError::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn dimension_drift_is_rejected() {
        let (engine, mut handle) = fixture().await;
        handle.dimension = 128;
        assert!(matches!(
            engine.search(&handle, "irrigation", 5, None).await,
            Err(RetrievalError::DimensionMismatch { expected: 128, actual: 64 })
        ));
    }

    struct Impostor;

    #[async_trait]
    impl EmbeddingClient for Impostor {
        fn model_id(&self) -> &str {
            "other"
        }

        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts.iter().map(|_| vec![1.0; 64]).collect())
        }
    }

    #[tokio::test]
    async fn foreign_model_is_rejected() {
        let (engine, handle) = fixture().await;
        let engine = RetrievalEngine::new(
            Arc::clone(&engine.store),
            Arc::new(EmbedderPool::with_factory(
                "hash",
                Arc::new(|_: &str| {
                    let client: Arc<dyn EmbeddingClient> = Arc::new(Impostor);
                    Ok(client)
                }),
            )),
        );
        assert!(matches!(
            engine.search(&handle, "irrigation", 5, None).await,
            Err(RetrievalError::ModelMismatch { expected, actual })
                if expected == "hash" && actual == "other"
        ));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let hit = |seq: u64, score: f32| StoredHit {
            seq,
            chunk: Chunk {
                chunk_id: format!("c-{seq}"),
                parent_document_id: "c".into(),
                text: String::new(),
                metadata: Default::default(),
            },
            score,
        };
        let mut hits = vec![hit(3, 0.5), hit(1, 0.5), hit(2, 0.9)];
        hits.sort_by(rank_order);
        let order: Vec<u64> = hits.iter().map(|hit| hit.seq).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }
}
