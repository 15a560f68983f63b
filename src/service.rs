//! Session facade wiring the pipeline components together.

use crate::{
    answer::{AnswerError, AnswerResult, AnswerSynthesizer},
    config::{Config, VectorStoreKind},
    embedding::{EmbedderPool, EmbeddingSettings},
    extraction::{self, SourceDocument},
    generation::{
        GenerationClient, GenerationClientError, SamplingSettings, generation_client_from_config,
    },
    index::{
        CollectionHandle, CollectionInfo, CollectionRegistry, DocumentSummary, IndexError,
        IndexManager, LocalVectorStore, VectorStore,
    },
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{Chunk, DocumentProcessor, ManualOverrides, Page, ProcessingResult, SplitError},
    qdrant::{QdrantError, QdrantStore},
    retrieval::{MetadataFilter, RetrievalEngine, RetrievalError},
    review::{LiteratureReview, ReviewDocument, ReviewFocus, ReviewOrchestrator, ReviewSettings},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised while answering a question end to end.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No index was built or loaded in this session, and none exists for the default model.
    #[error("No index is loaded; build or load one first")]
    NoActiveIndex,
    /// Loading the default index failed.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Retrieval failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    /// Answer generation failed.
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

/// Errors raised while wiring the service from configuration.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// Chunk bounds are invalid.
    #[error("Invalid chunking configuration: {0}")]
    Split(#[from] SplitError),
    /// `VECTOR_STORE=qdrant` without `QDRANT_URL`.
    #[error("QDRANT_URL must be set when VECTOR_STORE=qdrant")]
    MissingQdrantUrl,
    /// Qdrant client could not be built.
    #[error("Failed to initialize Qdrant client: {0}")]
    Qdrant(#[from] QdrantError),
    /// Generation client could not be built.
    #[error("Failed to initialize generation client: {0}")]
    Generation(#[from] GenerationClientError),
    /// Collection registry could not be read.
    #[error("Failed to load collection registry: {0}")]
    Registry(#[from] std::io::Error),
}

/// Tuning shared by the components the service owns.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    /// Prefix of every collection name.
    pub collection_prefix: String,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub chunk_overlap: usize,
    /// Default number of chunks retrieved per question.
    pub retrieval_k: usize,
    /// Per-chunk character cap in the answer context.
    pub context_chunk_chars: usize,
    /// Sampling applied to every generation request.
    pub sampling: SamplingSettings,
    /// Literature review tuning.
    pub review: ReviewSettings,
}

impl ServiceSettings {
    /// Extract service settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection_prefix: config.collection_prefix.clone(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            retrieval_k: config.retrieval_k,
            context_chunk_chars: config.context_chunk_chars,
            sampling: SamplingSettings::from_config(config),
            review: ReviewSettings::from_config(config),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Abstraction over the research pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait ResearchApi: Send + Sync {
    /// Chunk the pages of one document.
    async fn process_document(
        &self,
        source_file: String,
        pages: Vec<Page>,
        overrides: Option<ManualOverrides>,
    ) -> ProcessingResult;

    /// Embed and store chunks, making the collection the session's active index.
    async fn build_index(
        &self,
        chunks: Vec<Chunk>,
        embedding_model: Option<String>,
    ) -> Result<CollectionHandle, IndexError>;

    /// Reopen a collection by name and make it active.
    async fn load_index(&self, collection: String) -> Result<CollectionHandle, IndexError>;

    /// Reopen the collection registered for a model and make it active.
    async fn load_index_for_model(
        &self,
        embedding_model: String,
    ) -> Result<CollectionHandle, IndexError>;

    /// Answer a question from the active index.
    async fn query(
        &self,
        question: String,
        k: Option<usize>,
        filter: Option<MetadataFilter>,
    ) -> Result<AnswerResult, QueryError>;

    /// Run a map-reduce literature review.
    async fn run_literature_review(
        &self,
        documents: Vec<ReviewDocument>,
        focus: ReviewFocus,
        include_individual: bool,
    ) -> LiteratureReview;

    /// Describe every stored collection.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError>;

    /// Documents stored in a collection.
    async fn list_documents(&self, collection: String) -> Result<Vec<DocumentSummary>, IndexError>;

    /// Current counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns one instance of every pipeline component for the lifetime of a session.
///
/// Construct it once near process start and share it through an `Arc`; the embedding and
/// generation clients inside are built once and reused by every request.
pub struct ResearchService {
    processor: DocumentProcessor,
    index: IndexManager,
    retrieval: RetrievalEngine,
    answers: AnswerSynthesizer,
    reviews: ReviewOrchestrator,
    metrics: Arc<PipelineMetrics>,
    retrieval_k: usize,
    active: RwLock<Option<CollectionHandle>>,
}

impl ResearchService {
    /// Assemble a service from explicit components.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedders: Arc<EmbedderPool>,
        registry: CollectionRegistry,
        generator: Arc<dyn GenerationClient>,
        settings: ServiceSettings,
    ) -> Result<Self, SplitError> {
        let processor = DocumentProcessor::new(settings.chunk_size, settings.chunk_overlap)?;
        let index = IndexManager::new(
            Arc::clone(&store),
            Arc::clone(&embedders),
            registry,
            settings.collection_prefix,
        );
        let retrieval = RetrievalEngine::new(store, embedders);
        let answers = AnswerSynthesizer::new(
            Arc::clone(&generator),
            settings.sampling,
            settings.context_chunk_chars,
        );
        let reviews = ReviewOrchestrator::new(generator, settings.sampling, settings.review);

        Ok(Self {
            processor,
            index,
            retrieval,
            answers,
            reviews,
            metrics: Arc::new(PipelineMetrics::new()),
            retrieval_k: settings.retrieval_k,
            active: RwLock::new(None),
        })
    }

    /// Wire every component from configuration.
    pub async fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        let store: Arc<dyn VectorStore> = match config.vector_store {
            VectorStoreKind::Local => {
                tracing::info!(dir = %config.local_store_dir.display(), "Using local vector store");
                Arc::new(LocalVectorStore::persistent(config.local_store_dir.clone()))
            }
            VectorStoreKind::Qdrant => {
                let url = config
                    .qdrant_url
                    .as_deref()
                    .ok_or(ServiceInitError::MissingQdrantUrl)?;
                tracing::info!(url, "Using Qdrant vector store");
                Arc::new(QdrantStore::new(url, config.qdrant_api_key.clone())?)
            }
        };
        let embedders = Arc::new(EmbedderPool::from_settings(EmbeddingSettings::from_config(
            config,
        )));
        let registry = CollectionRegistry::load(config.collection_registry_path.clone()).await?;
        let generator = generation_client_from_config(config)?;

        Ok(Self::new(
            store,
            embedders,
            registry,
            generator,
            ServiceSettings::from_config(config),
        )?)
    }

    /// Chunk the pages of one document. `overrides` apply to this document only.
    pub fn process_document(
        &self,
        source_file: &str,
        pages: &[Page],
        overrides: Option<&ManualOverrides>,
    ) -> ProcessingResult {
        let result = self.processor.process(pages, source_file, overrides);
        match &result {
            Ok(document) => {
                self.metrics.record_document();
                tracing::info!(
                    source = source_file,
                    document_id = %document.document_id,
                    chunks = document.stats.total_chunks,
                    pages = document.stats.total_pages,
                    "Document processed"
                );
            }
            Err(error) => {
                self.metrics.record_failed_document();
                tracing::warn!(source = source_file, error = %error, "Document rejected");
            }
        }
        result
    }

    /// Read a discovered paper from disk and chunk it with its own metadata.
    pub async fn process_source(&self, source: &SourceDocument) -> ProcessingResult {
        match extraction::read_pages(&source.path).await {
            Ok(pages) => {
                self.process_document(&source.source_file, &pages, source.overrides.as_ref())
            }
            Err(error) => {
                self.metrics.record_failed_document();
                tracing::warn!(source = %source.source_file, error = %error, "Document unreadable");
                Err(error.into())
            }
        }
    }

    /// Embed `chunks` with `embedding_model` (or the default model) and make the result active.
    pub async fn build_index(
        &self,
        chunks: &[Chunk],
        embedding_model: Option<&str>,
    ) -> Result<CollectionHandle, IndexError> {
        let model = embedding_model
            .unwrap_or_else(|| self.index.embedders().default_model())
            .to_string();
        let handle = self.index.build(chunks, &model).await?;
        self.metrics.record_index(handle.vector_count as u64);
        self.activate(handle.clone()).await;
        Ok(handle)
    }

    /// Reopen a collection by name and make it active.
    pub async fn load_index(&self, collection: &str) -> Result<CollectionHandle, IndexError> {
        let handle = self.index.load(collection).await?;
        self.activate(handle.clone()).await;
        Ok(handle)
    }

    /// Reopen the collection registered for `embedding_model` and make it active.
    pub async fn load_index_for_model(
        &self,
        embedding_model: &str,
    ) -> Result<CollectionHandle, IndexError> {
        let handle = self.index.load_for_model(embedding_model).await?;
        self.activate(handle.clone()).await;
        Ok(handle)
    }

    /// Handle of the active index, if any.
    pub async fn active_index(&self) -> Option<CollectionHandle> {
        self.active.read().await.clone()
    }

    /// Answer `question` from the active index.
    ///
    /// When nothing is active the collection of the default embedding model is loaded. `k`
    /// falls back to the configured retrieval depth.
    pub async fn query(
        &self,
        question: &str,
        k: Option<usize>,
        filter: Option<&MetadataFilter>,
    ) -> Result<AnswerResult, QueryError> {
        let handle = self.resolve_active().await?;
        let k = k.unwrap_or(self.retrieval_k);
        tracing::info!(collection = %handle.name, k, filtered = filter.is_some(), "Answering question");

        let outcome = self.retrieval.search(&handle, question, k, filter).await?;
        let answer = self
            .answers
            .answer(question, outcome.into_results(), &handle.embedding_model_id)
            .await?;
        self.metrics.record_question();
        Ok(answer)
    }

    /// Run a map-reduce literature review over `documents`.
    pub async fn run_literature_review(
        &self,
        documents: Vec<ReviewDocument>,
        focus: ReviewFocus,
        include_individual: bool,
    ) -> LiteratureReview {
        tracing::info!(papers = documents.len(), %focus, "Starting literature review");
        let review = self.reviews.run(documents, focus, include_individual).await;
        self.metrics.record_review();
        review
    }

    /// Render a finished review as Markdown stamped with the current time.
    pub fn export_report(&self, review: &LiteratureReview) -> String {
        crate::review::export_report(review)
    }

    /// Describe every stored collection.
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError> {
        self.index.list_collections().await
    }

    /// Documents stored in `collection`.
    pub async fn list_documents(
        &self,
        collection: &str,
    ) -> Result<Vec<DocumentSummary>, IndexError> {
        let handle = self.index.load(collection).await?;
        self.index.list_documents(&handle).await
    }

    /// Current counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn activate(&self, handle: CollectionHandle) {
        tracing::debug!(collection = %handle.name, model = %handle.embedding_model_id, "Active index changed");
        *self.active.write().await = Some(handle);
    }

    async fn resolve_active(&self) -> Result<CollectionHandle, QueryError> {
        if let Some(handle) = self.active_index().await {
            return Ok(handle);
        }
        let default_model = self.index.embedders().default_model().to_string();
        match self.load_index_for_model(&default_model).await {
            Ok(handle) => Ok(handle),
            Err(IndexError::CollectionNotFound(_)) => Err(QueryError::NoActiveIndex),
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl ResearchApi for ResearchService {
    async fn process_document(
        &self,
        source_file: String,
        pages: Vec<Page>,
        overrides: Option<ManualOverrides>,
    ) -> ProcessingResult {
        ResearchService::process_document(self, &source_file, &pages, overrides.as_ref())
    }

    async fn build_index(
        &self,
        chunks: Vec<Chunk>,
        embedding_model: Option<String>,
    ) -> Result<CollectionHandle, IndexError> {
        ResearchService::build_index(self, &chunks, embedding_model.as_deref()).await
    }

    async fn load_index(&self, collection: String) -> Result<CollectionHandle, IndexError> {
        ResearchService::load_index(self, &collection).await
    }

    async fn load_index_for_model(
        &self,
        embedding_model: String,
    ) -> Result<CollectionHandle, IndexError> {
        ResearchService::load_index_for_model(self, &embedding_model).await
    }

    async fn query(
        &self,
        question: String,
        k: Option<usize>,
        filter: Option<MetadataFilter>,
    ) -> Result<AnswerResult, QueryError> {
        ResearchService::query(self, &question, k, filter.as_ref()).await
    }

    async fn run_literature_review(
        &self,
        documents: Vec<ReviewDocument>,
        focus: ReviewFocus,
        include_individual: bool,
    ) -> LiteratureReview {
        ResearchService::run_literature_review(self, documents, focus, include_individual).await
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, IndexError> {
        ResearchService::list_collections(self).await
    }

    async fn list_documents(
        &self,
        collection: String,
    ) -> Result<Vec<DocumentSummary>, IndexError> {
        ResearchService::list_documents(self, &collection).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ResearchService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, HashingEmbeddingClient};
    use crate::generation::GenerationRequest;
    use async_trait::async_trait;

    struct EchoClient;

    #[async_trait]
    impl GenerationClient for EchoClient {
        fn model_id(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<String, GenerationClientError> {
            Ok(format!("answer to: {}", request.prompt))
        }
    }

    fn service() -> ResearchService {
        let embedders = Arc::new(EmbedderPool::with_factory(
            "hash",
            Arc::new(|model: &str| {
                let client: Arc<dyn EmbeddingClient> =
                    Arc::new(HashingEmbeddingClient::new(model, 48)?);
                Ok(client)
            }),
        ));
        ResearchService::new(
            Arc::new(LocalVectorStore::in_memory()),
            embedders,
            CollectionRegistry::in_memory(),
            Arc::new(EchoClient),
            ServiceSettings {
                chunk_size: 200,
                chunk_overlap: 20,
                ..ServiceSettings::default()
            },
        )
        .expect("service")
    }

    #[tokio::test]
    async fn query_without_index_reports_no_active_index() {
        let service = service();
        assert!(matches!(
            service.query("What?", None, None).await,
            Err(QueryError::NoActiveIndex)
        ));
    }

    #[tokio::test]
    async fn build_activates_index_and_counts_metrics() {
        let service = service();
        let document = service
            .process_document(
                "silva.txt",
                &[Page::new(0, "Irrigation scheduling improved maize yield.")],
                None,
            )
            .expect("document");
        assert!(service.process_document("empty.txt", &[], None).is_err());

        let handle = service
            .build_index(&document.chunks, None)
            .await
            .expect("build");
        assert_eq!(handle.embedding_model_id, "hash");
        assert_eq!(service.active_index().await, Some(handle.clone()));

        let answer = service
            .query("maize yield", Some(3), None)
            .await
            .expect("answer");
        assert_eq!(answer.text, "answer to: maize yield");
        assert_eq!(answer.sources.len(), 1);

        let documents = service.list_documents(&handle.name).await.expect("documents");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source_file, "silva.txt");

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.documents_processed, 1);
        assert_eq!(snapshot.documents_failed, 1);
        assert_eq!(snapshot.chunks_indexed, 1);
        assert_eq!(snapshot.questions_answered, 1);
    }

    #[tokio::test]
    async fn query_reloads_default_model_collection() {
        let store: Arc<dyn VectorStore> = Arc::new(LocalVectorStore::in_memory());
        let embedders = Arc::new(EmbedderPool::with_factory(
            "hash",
            Arc::new(|model: &str| {
                let client: Arc<dyn EmbeddingClient> =
                    Arc::new(HashingEmbeddingClient::new(model, 48)?);
                Ok(client)
            }),
        ));
        let first = ResearchService::new(
            Arc::clone(&store),
            Arc::clone(&embedders),
            CollectionRegistry::in_memory(),
            Arc::new(EchoClient),
            ServiceSettings::default(),
        )
        .expect("service");
        let document = first
            .process_document("a.txt", &[Page::new(0, "Soil carbon sequestration.")], None)
            .expect("document");
        first.build_index(&document.chunks, None).await.expect("build");

        let second = ResearchService::new(
            store,
            embedders,
            CollectionRegistry::in_memory(),
            Arc::new(EchoClient),
            ServiceSettings::default(),
        )
        .expect("service");
        let answer = second.query("soil carbon", None, None).await.expect("answer");
        assert_eq!(answer.metadata.embedding_model, "hash");
        assert!(second.active_index().await.is_some());
    }

    #[tokio::test]
    async fn same_named_papers_in_separate_folders_are_both_indexed() {
        let dir = tempfile::tempdir().expect("tempdir");
        for (folder, text) in [("a", "Soil carbon in pastures."), ("b", "Pest density in soy.")] {
            std::fs::create_dir(dir.path().join(folder)).expect("folder");
            std::fs::write(dir.path().join(folder).join("paper.txt"), text).expect("paper");
        }
        std::fs::write(dir.path().join("b").join("paper.meta.json"), r#"{"author": "Costa"}"#)
            .expect("sidecar");

        let service = service();
        let mut chunks = Vec::new();
        for source in extraction::discover_documents(dir.path()).await.expect("discover") {
            chunks.extend(service.process_source(&source).await.expect("document").chunks);
        }
        let handle = service.build_index(&chunks, None).await.expect("build");
        assert_eq!(handle.vector_count, 2);

        let documents = service.list_documents(&handle.name).await.expect("documents");
        let sources: Vec<&str> = documents.iter().map(|doc| doc.source_file.as_str()).collect();
        assert_eq!(sources, vec!["a/paper.txt", "b/paper.txt"]);
        assert_eq!(documents[0].author, None);
        assert_eq!(documents[1].author.as_deref(), Some("Costa"));
    }
}
