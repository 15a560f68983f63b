//! Collection lifecycle: embedding, storing, registering, and reopening chunk sets.

use super::naming::{collection_name, generation_name, is_valid_collection_name, parse_generation};
use super::registry::{CollectionRegistry, RegistryEntry};
use super::store::{CollectionInfo, CollectionSpec, DocumentSummary, IndexedPoint, VectorStore};
use super::types::{CollectionHandle, IndexError};
use crate::embedding::EmbedderPool;
use crate::processing::Chunk;
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// Number of chunk texts sent to the embedding provider per request.
const EMBED_BATCH_SIZE: usize = 64;

/// Binds chunk sets to embedding identities and manages their collections.
///
/// Every build writes a fresh generation `{base}-{n}` next to the live one. The registry moves
/// to the new generation only after its points are stored, and older generations are dropped
/// afterwards, so a failed rebuild leaves the previous collection queryable.
pub struct IndexManager {
    store: Arc<dyn VectorStore>,
    embedders: Arc<EmbedderPool>,
    registry: Mutex<CollectionRegistry>,
    prefix: String,
}

impl IndexManager {
    /// Construct a manager over `store`, naming collections with `prefix`.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedders: Arc<EmbedderPool>,
        registry: CollectionRegistry,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedders,
            registry: Mutex::new(registry),
            prefix: prefix.into(),
        }
    }

    /// Embedding clients shared with the retrieval engine.
    pub fn embedders(&self) -> &Arc<EmbedderPool> {
        &self.embedders
    }

    /// Vector store backing the collections.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Embed `chunks` with `embedding_model` and store them as that embedding space's collection.
    ///
    /// The model name is resolved to its embedding identity first; the handle, the registry key
    /// and the collection name all use that identity. Chunk ids must be unique within the input.
    /// Concurrent builds are serialized on the registry lock.
    pub async fn build(
        &self,
        chunks: &[Chunk],
        embedding_model: &str,
    ) -> Result<CollectionHandle, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::EmptyChunks);
        }
        let mut seen = HashSet::with_capacity(chunks.len());
        if let Some(duplicate) = chunks.iter().find(|chunk| !seen.insert(chunk.chunk_id.as_str())) {
            return Err(IndexError::DuplicateChunk(duplicate.chunk_id.clone()));
        }

        let identity = self.embedders.identity(embedding_model);
        let mut registry = self.registry.lock().await;
        let client = self.embedders.get(&identity).await?;
        if client.model_id() != identity {
            return Err(IndexError::ModelMismatch {
                expected: identity,
                actual: client.model_id().to_string(),
            });
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts = batch.iter().map(|chunk| chunk.text.clone()).collect();
            vectors.extend(client.generate_embeddings(texts).await?);
        }
        if vectors.len() != chunks.len() {
            return Err(IndexError::EmbeddingCountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }
        let dimension = vectors.first().map(Vec::len).unwrap_or_default();
        if dimension == 0 || vectors.iter().any(|vector| vector.len() != dimension) {
            return Err(IndexError::InconsistentDimension);
        }

        let base = collection_name(&self.prefix, &identity);
        let generations = self.generations(&base).await?;
        let next = generations.iter().map(|(generation, _)| *generation).max().unwrap_or(0) + 1;
        let name = generation_name(&base, next);
        let mut superseded: Vec<String> = generations.into_iter().map(|(_, name)| name).collect();
        if let Some(entry) = registry.get(&identity)
            && !superseded.contains(&entry.collection)
        {
            superseded.push(entry.collection.clone());
        }

        let spec = CollectionSpec {
            name: name.clone(),
            dimension,
            embedding_model: identity.clone(),
        };
        self.store.create_collection(&spec).await?;

        let points: Vec<IndexedPoint> = chunks
            .iter()
            .cloned()
            .zip(vectors)
            .enumerate()
            .map(|(seq, (chunk, vector))| IndexedPoint::new(seq as u64, chunk, vector))
            .collect();

        let staged = match self.write_points(&name, points).await {
            Ok(info) => registry
                .register(
                    &identity,
                    RegistryEntry {
                        collection: name.clone(),
                        dimension,
                        vector_count: info.vector_count,
                        built_at: current_timestamp_rfc3339(),
                    },
                )
                .await
                .map(|()| info)
                .map_err(IndexError::from),
            Err(error) => Err(error),
        };
        let info = match staged {
            Ok(info) => info,
            Err(error) => {
                tracing::error!(collection = %name, error = %error, "Index build failed; keeping previous collection");
                self.drop_collection(&name).await;
                return Err(error);
            }
        };

        for stale in &superseded {
            self.drop_collection(stale).await;
        }

        tracing::info!(
            collection = %name,
            model = %identity,
            vectors = info.vector_count,
            dimension,
            replaced = superseded.len(),
            "Index built"
        );

        Ok(CollectionHandle {
            name,
            embedding_model_id: identity,
            vector_count: info.vector_count,
            dimension,
        })
    }

    async fn write_points(
        &self,
        name: &str,
        points: Vec<IndexedPoint>,
    ) -> Result<CollectionInfo, IndexError> {
        self.store.upsert(name, points).await?;
        self.store
            .describe(name)
            .await?
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))
    }

    async fn drop_collection(&self, name: &str) {
        if let Err(error) = self.store.delete_collection(name).await {
            tracing::warn!(collection = name, error = %error, "Failed to drop collection");
        }
    }

    /// Stored collections belonging to `base`, with their generation numbers.
    ///
    /// `base` itself counts as generation 0.
    async fn generations(&self, base: &str) -> Result<Vec<(u64, String)>, IndexError> {
        Ok(self
            .store
            .list_collections()
            .await?
            .into_iter()
            .filter_map(|name| {
                if name == base {
                    Some((0, name))
                } else {
                    parse_generation(base, &name).map(|generation| (generation, name))
                }
            })
            .collect())
    }

    /// Reopen a persisted collection by name.
    pub async fn load(&self, collection: &str) -> Result<CollectionHandle, IndexError> {
        if !is_valid_collection_name(collection) {
            return Err(IndexError::InvalidCollectionName(collection.to_string()));
        }
        let info = self
            .store
            .describe(collection)
            .await?
            .ok_or_else(|| IndexError::CollectionNotFound(collection.to_string()))?;

        let client = self.embedders.get(&info.embedding_model).await?;
        if client.model_id() != info.embedding_model {
            return Err(IndexError::ModelMismatch {
                expected: info.embedding_model,
                actual: client.model_id().to_string(),
            });
        }

        tracing::debug!(
            collection,
            model = %info.embedding_model,
            vectors = info.vector_count,
            "Index loaded"
        );
        Ok(handle_from(info))
    }

    /// Reopen the collection registered for the embedding identity of `embedding_model`.
    ///
    /// Without a registry entry the newest stored generation for that identity is used.
    pub async fn load_for_model(
        &self,
        embedding_model: &str,
    ) -> Result<CollectionHandle, IndexError> {
        let identity = self.embedders.identity(embedding_model);
        let registered = self
            .registry
            .lock()
            .await
            .get(&identity)
            .map(|entry| entry.collection.clone());
        let name = match registered {
            Some(name) => name,
            None => {
                let base = collection_name(&self.prefix, &identity);
                self.generations(&base)
                    .await?
                    .into_iter()
                    .max_by_key(|(generation, _)| *generation)
                    .map(|(_, name)| name)
                    .unwrap_or(base)
            }
        };
        self.load(&name).await
    }

    /// Describe every collection in the store.
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError> {
        let mut collections = Vec::new();
        for name in self.store.list_collections().await? {
            if let Some(info) = self.store.describe(&name).await? {
                collections.push(info);
            }
        }
        Ok(collections)
    }

    /// Documents stored in the collection behind `handle`.
    pub async fn list_documents(
        &self,
        handle: &CollectionHandle,
    ) -> Result<Vec<DocumentSummary>, IndexError> {
        Ok(self.store.list_documents(&handle.name).await?)
    }
}

fn handle_from(info: CollectionInfo) -> CollectionHandle {
    CollectionHandle {
        name: info.name,
        embedding_model_id: info.embedding_model,
        vector_count: info.vector_count,
        dimension: info.dimension,
    }
}

/// Current timestamp formatted for registry storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProvider;
    use crate::embedding::{
        EmbeddingClient, EmbeddingClientError, EmbeddingSettings, HashingEmbeddingClient,
    };
    use crate::index::memory::LocalVectorStore;
    use crate::index::store::{StoreError, StoredHit};
    use crate::processing::DocumentProcessor;
    use crate::processing::Page;
    use crate::retrieval::{MetadataFilter, RetrievalEngine};
    use async_trait::async_trait;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn hashing_pool() -> Arc<EmbedderPool> {
        Arc::new(EmbedderPool::with_factory(
            "hash-a",
            Arc::new(|model: &str| {
                let client: Arc<dyn EmbeddingClient> =
                    Arc::new(HashingEmbeddingClient::new(model, 32)?);
                Ok(client)
            }),
        ))
    }

    fn chunks() -> Vec<Chunk> {
        let processor = DocumentProcessor::new(200, 20).expect("processor");
        processor
            .process(
                &[Page::new(0, "Sampling methods for coastal surveys. ".repeat(12))],
                "survey.pdf",
                None,
            )
            .expect("document")
            .chunks
    }

    fn manager(store: Arc<dyn VectorStore>) -> IndexManager {
        IndexManager::new(store, hashing_pool(), CollectionRegistry::in_memory(), "papers")
    }

    #[tokio::test]
    async fn build_then_load_round_trips_handle() {
        let manager = manager(Arc::new(LocalVectorStore::in_memory()));
        let chunks = chunks();

        let built = manager.build(&chunks, "hash-a").await.expect("build");
        assert_eq!(built.vector_count, chunks.len());
        assert_eq!(built.dimension, 32);
        assert_eq!(built.embedding_model_id, "hash-a");

        let loaded = manager.load(&built.name).await.expect("load");
        assert_eq!(loaded, built);
        let by_model = manager.load_for_model("hash-a").await.expect("load by model");
        assert_eq!(by_model, built);
    }

    #[tokio::test]
    async fn distinct_models_get_distinct_collections() {
        let manager = manager(Arc::new(LocalVectorStore::in_memory()));
        let chunks = chunks();
        let a = manager.build(&chunks, "hash-a").await.expect("a");
        let b = manager.build(&chunks, "hash-b").await.expect("b");
        assert_ne!(a.name, b.name);
        assert_eq!(manager.list_collections().await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn rebuild_replaces_previous_content() {
        let manager = manager(Arc::new(LocalVectorStore::in_memory()));
        let chunks = chunks();
        let first = manager.build(&chunks, "hash-a").await.expect("first");
        let second = manager.build(&chunks[..1], "hash-a").await.expect("second");
        assert_eq!(second.vector_count, 1);
        assert_ne!(first.name, second.name);

        let collections = manager.list_collections().await.expect("list");
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].name, second.name);
        assert_eq!(manager.load_for_model("hash-a").await.expect("load"), second);
    }

    #[tokio::test]
    async fn duplicate_chunk_ids_are_rejected() {
        let manager = manager(Arc::new(LocalVectorStore::in_memory()));
        let mut chunks = chunks();
        chunks.push(chunks[0].clone());
        let duplicate = chunks[0].chunk_id.clone();
        assert!(matches!(
            manager.build(&chunks, "hash-a").await,
            Err(IndexError::DuplicateChunk(id)) if id == duplicate
        ));
        assert!(manager.list_collections().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn invalid_collection_names_are_rejected() {
        let manager = manager(Arc::new(LocalVectorStore::in_memory()));
        for name in ["../../x", "Papers", ""] {
            assert!(matches!(
                manager.load(name).await,
                Err(IndexError::InvalidCollectionName(rejected)) if rejected == name
            ));
        }
    }

    #[tokio::test]
    async fn empty_build_and_missing_load_fail() {
        let manager = manager(Arc::new(LocalVectorStore::in_memory()));
        assert!(matches!(
            manager.build(&[], "hash-a").await,
            Err(IndexError::EmptyChunks)
        ));
        assert!(matches!(
            manager.load("papers-missing").await,
            Err(IndexError::CollectionNotFound(name)) if name == "papers-missing"
        ));
    }

    #[derive(Default)]
    struct FlakyStore {
        inner: LocalVectorStore,
        fail_upserts: AtomicBool,
    }

    impl FlakyStore {
        fn failing() -> Self {
            let store = Self::default();
            store.fail_upserts.store(true, Ordering::SeqCst);
            store
        }
    }

    #[async_trait]
    impl VectorStore for FlakyStore {
        async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
            self.inner.create_collection(spec).await
        }

        async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
            self.inner.delete_collection(name).await
        }

        async fn upsert(
            &self,
            collection: &str,
            points: Vec<IndexedPoint>,
        ) -> Result<usize, StoreError> {
            if self.fail_upserts.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.upsert(collection, points).await
        }

        async fn query(
            &self,
            collection: &str,
            vector: &[f32],
            limit: usize,
            filter: Option<&MetadataFilter>,
        ) -> Result<Vec<StoredHit>, StoreError> {
            self.inner.query(collection, vector, limit, filter).await
        }

        async fn describe(&self, collection: &str) -> Result<Option<CollectionInfo>, StoreError> {
            self.inner.describe(collection).await
        }

        async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_collections().await
        }

        async fn list_documents(
            &self,
            collection: &str,
        ) -> Result<Vec<DocumentSummary>, StoreError> {
            self.inner.list_documents(collection).await
        }
    }

    #[tokio::test]
    async fn failed_upsert_leaves_no_collection() {
        let manager = manager(Arc::new(FlakyStore::failing()));
        let error = manager.build(&chunks(), "hash-a").await.expect_err("build fails");
        assert!(matches!(error, IndexError::Store(_)));
        assert!(manager.list_collections().await.expect("list").is_empty());
        assert!(matches!(
            manager.load_for_model("hash-a").await,
            Err(IndexError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_collection() {
        let store = Arc::new(FlakyStore::default());
        let manager = manager(store.clone());
        let chunks = chunks();
        let good = manager.build(&chunks, "hash-a").await.expect("first build");

        store.fail_upserts.store(true, Ordering::SeqCst);
        let error = manager.build(&chunks[..1], "hash-a").await.expect_err("rebuild fails");
        assert!(matches!(error, IndexError::Store(_)));

        assert_eq!(manager.load(&good.name).await.expect("by name"), good);
        assert_eq!(manager.load_for_model("hash-a").await.expect("by model"), good);
        let collections = manager.list_collections().await.expect("list");
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].vector_count, chunks.len());

        store.fail_upserts.store(false, Ordering::SeqCst);
        let rebuilt = manager.build(&chunks[..1], "hash-a").await.expect("rebuild");
        assert_eq!(rebuilt.vector_count, 1);
        assert!(matches!(
            manager.load(&good.name).await,
            Err(IndexError::CollectionNotFound(_))
        ));
    }

    fn settings(provider: EmbeddingProvider, ollama_url: String) -> EmbeddingSettings {
        EmbeddingSettings {
            provider,
            default_model: "all-minilm".into(),
            dimension: 384,
            ollama_url,
        }
    }

    #[tokio::test]
    async fn switching_provider_never_reuses_another_embedding_space() {
        let server = MockServer::start_async().await;
        let vector = vec![0.05_f32; 384];
        let embed = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200).json_body(json!({ "embeddings": [vector] }));
            })
            .await;

        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
        let hashing = IndexManager::new(
            Arc::clone(&store),
            Arc::new(EmbedderPool::from_settings(settings(
                EmbeddingProvider::Hashing,
                server.base_url(),
            ))),
            CollectionRegistry::in_memory(),
            "papers",
        );
        let built = hashing.build(&chunks(), "all-minilm").await.expect("build");
        assert_eq!(built.embedding_model_id, "hashing:all-minilm@384");

        let ollama_pool = Arc::new(EmbedderPool::from_settings(settings(
            EmbeddingProvider::Ollama,
            server.base_url(),
        )));
        let ollama = IndexManager::new(
            Arc::clone(&store),
            Arc::clone(&ollama_pool),
            CollectionRegistry::in_memory(),
            "papers",
        );
        assert!(matches!(
            ollama.load_for_model("all-minilm").await,
            Err(IndexError::CollectionNotFound(_))
        ));
        assert!(matches!(
            ollama.load(&built.name).await,
            Err(IndexError::Embedding(_))
        ));

        let engine = RetrievalEngine::new(store, ollama_pool);
        assert!(engine.search(&built, "soil", 3, None).await.is_err());
        embed.assert_hits_async(0).await;
    }

    struct MislabeledClient;

    #[async_trait]
    impl EmbeddingClient for MislabeledClient {
        fn model_id(&self) -> &str {
            "someone-else"
        }

        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test]
    async fn build_rejects_client_for_another_model() {
        let pool = Arc::new(EmbedderPool::with_factory(
            "hash-a",
            Arc::new(|_model: &str| {
                let client: Arc<dyn EmbeddingClient> = Arc::new(MislabeledClient);
                Ok(client)
            }),
        ));
        let manager = IndexManager::new(
            Arc::new(LocalVectorStore::in_memory()),
            pool,
            CollectionRegistry::in_memory(),
            "papers",
        );
        assert!(matches!(
            manager.build(&chunks(), "hash-a").await,
            Err(IndexError::ModelMismatch { .. })
        ));
    }
}
