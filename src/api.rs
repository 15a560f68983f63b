//! HTTP surface for PaperLens.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /documents` – Chunk one document and return its chunks, metadata, and stats.
//! - `POST /index` – Chunk a batch of documents and build the embedding-model collection from
//!   every document that ingested cleanly. Per-document failures are reported, not fatal.
//! - `POST /index/load` – Reopen a collection by name or by embedding model.
//! - `POST /query` – Answer a question from the active index, optionally filtered by metadata.
//! - `POST /reviews` – Run a map-reduce literature review and return it with a Markdown report.
//! - `GET /collections` – Describe stored collections.
//! - `GET /collections/:name/documents` – List the documents stored in one collection.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::answer::AnswerError;
use crate::extraction::pages_from_text;
use crate::index::{CollectionHandle, DocumentSummary, IndexError, StoreError};
use crate::processing::{ManualOverrides, ProcessedDocument, ProcessingError};
use crate::retrieval::{MetadataFilter, RetrievalError};
use crate::review::{LiteratureReview, ReviewDocument, ReviewFocus, export_report};
use crate::service::{QueryError, ResearchApi};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the research API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ResearchApi + 'static,
{
    Router::new()
        .route("/documents", post(process_document::<S>))
        .route("/index", post(build_index::<S>))
        .route("/index/load", post(load_index::<S>))
        .route("/query", post(query::<S>))
        .route("/reviews", post(run_review::<S>))
        .route("/collections", get(list_collections::<S>))
        .route("/collections/:name/documents", get(list_documents::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// One document supplied inline. Pages are separated by form feeds.
#[derive(Deserialize)]
struct DocumentInput {
    /// Filename used as the document's source identifier.
    source_file: String,
    /// Extracted text.
    text: String,
    /// Optional author applied to this document only.
    #[serde(default)]
    author: Option<String>,
    /// Optional publication year applied to this document only.
    #[serde(default)]
    year: Option<i32>,
    /// Optional title applied to this document only.
    #[serde(default)]
    title: Option<String>,
}

impl DocumentInput {
    fn overrides(&self) -> Option<ManualOverrides> {
        if self.author.is_none() && self.year.is_none() && self.title.is_none() {
            return None;
        }
        Some(ManualOverrides {
            author: self.author.clone(),
            year: self.year,
            title: self.title.clone(),
        })
    }
}

async fn ingest<S>(
    service: &S,
    document: DocumentInput,
) -> Result<ProcessedDocument, ProcessingError>
where
    S: ResearchApi,
{
    let overrides = document.overrides();
    let pages = pages_from_text(&document.text);
    service
        .process_document(document.source_file, pages, overrides)
        .await
}

/// Chunk a single document without indexing it.
async fn process_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<DocumentInput>,
) -> Result<Json<ProcessedDocument>, AppError>
where
    S: ResearchApi,
{
    Ok(Json(ingest(service.as_ref(), request).await?))
}

/// Request body for the `POST /index` endpoint.
#[derive(Deserialize)]
struct IndexRequest {
    /// Documents to chunk and index together.
    documents: Vec<DocumentInput>,
    /// Embedding model override (defaults to `EMBEDDING_MODEL`).
    #[serde(default)]
    embedding_model: Option<String>,
}

/// Per-document ingestion status.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum DocumentStatus {
    Indexed {
        source_file: String,
        document_id: String,
        chunks: usize,
    },
    Failed {
        source_file: String,
        error: String,
    },
}

/// Success response for the `POST /index` endpoint.
#[derive(Serialize)]
struct IndexResponse {
    collection: CollectionHandle,
    documents: Vec<DocumentStatus>,
}

/// Chunk every document, then build one collection from the successful ones.
async fn build_index<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, AppError>
where
    S: ResearchApi,
{
    let mut chunks = Vec::new();
    let mut documents = Vec::with_capacity(request.documents.len());
    for document in request.documents {
        let source_file = document.source_file.clone();
        match ingest(service.as_ref(), document).await {
            Ok(processed) => {
                documents.push(DocumentStatus::Indexed {
                    source_file,
                    document_id: processed.document_id.clone(),
                    chunks: processed.chunks.len(),
                });
                chunks.extend(processed.chunks);
            }
            Err(error) => documents.push(DocumentStatus::Failed {
                source_file,
                error: error.to_string(),
            }),
        }
    }

    let collection = service.build_index(chunks, request.embedding_model).await?;
    tracing::info!(
        collection = %collection.name,
        vectors = collection.vector_count,
        documents = documents.len(),
        "Index request completed"
    );
    Ok(Json(IndexResponse {
        collection,
        documents,
    }))
}

/// Request body for `POST /index/load`. Exactly one selector is expected.
#[derive(Deserialize)]
struct LoadRequest {
    #[serde(default)]
    collection: Option<String>,
    #[serde(default)]
    embedding_model: Option<String>,
}

/// Reopen a stored collection and make it the active index.
async fn load_index<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<LoadRequest>,
) -> Result<Json<CollectionHandle>, AppError>
where
    S: ResearchApi,
{
    let handle = match (request.collection, request.embedding_model) {
        (Some(collection), None) => service.load_index(collection).await?,
        (None, Some(model)) => service.load_index_for_model(model).await?,
        _ => {
            return Err(AppError::bad_request(
                "provide exactly one of 'collection' or 'embedding_model'",
            ));
        }
    };
    Ok(Json(handle))
}

/// Request body for `POST /query`.
#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    filter: Option<MetadataFilter>,
}

/// Answer a question from the active index.
async fn query<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, AppError>
where
    S: ResearchApi,
{
    let answer = service
        .query(request.question, request.k, request.filter)
        .await?;
    Ok(Json(answer).into_response())
}

/// Request body for `POST /reviews`.
#[derive(Deserialize)]
struct ReviewRequest {
    documents: Vec<DocumentInput>,
    #[serde(default)]
    focus: ReviewFocus,
    #[serde(default)]
    include_individual: bool,
}

/// Response body for `POST /reviews`.
#[derive(Serialize)]
struct ReviewResponse {
    review: LiteratureReview,
    report: String,
}

/// Chunk every document and run a literature review over the results.
async fn run_review<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError>
where
    S: ResearchApi,
{
    if request.documents.is_empty() {
        return Err(AppError::bad_request("at least one document is required"));
    }

    let mut documents = Vec::with_capacity(request.documents.len());
    for document in request.documents {
        let source_file = document.source_file.clone();
        let result = ingest(service.as_ref(), document).await;
        documents.push(ReviewDocument::from_processing(source_file, result));
    }

    let review = service
        .run_literature_review(documents, request.focus, request.include_individual)
        .await;
    let report = export_report(&review);
    Ok(Json(ReviewResponse { review, report }))
}

/// Describe stored collections.
async fn list_collections<S>(State(service): State<Arc<S>>) -> Result<Response, AppError>
where
    S: ResearchApi,
{
    let collections = service.list_collections().await?;
    Ok(Json(json!({ "collections": collections })).into_response())
}

/// List the documents stored in one collection.
async fn list_documents<S>(
    State(service): State<Arc<S>>,
    Path(name): Path<String>,
) -> Result<Response, AppError>
where
    S: ResearchApi,
{
    let documents: Vec<DocumentSummary> = service.list_documents(name.clone()).await?;
    Ok(Json(json!({ "collection": name, "documents": documents })).into_response())
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: ResearchApi,
{
    Json(service.metrics_snapshot()).into_response()
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "process_document",
                method: "POST",
                path: "/documents",
                description: "Chunk one document and return its chunks, extracted metadata, and stats without indexing.",
                request_example: Some(json!({
                    "source_file": "silva2020.pdf",
                    "text": "Page one\u{000C}Page two",
                    "author": "Silva",
                    "year": 2020
                })),
            },
            CommandDescriptor {
                name: "build_index",
                method: "POST",
                path: "/index",
                description: "Chunk documents and build the collection for an embedding model. Replaces the model's previous collection.",
                request_example: Some(json!({
                    "documents": [{ "source_file": "silva2020.pdf", "text": "..." }],
                    "embedding_model": "all-minilm"
                })),
            },
            CommandDescriptor {
                name: "load_index",
                method: "POST",
                path: "/index/load",
                description: "Reopen a stored collection by name or embedding model and make it active.",
                request_example: Some(json!({ "embedding_model": "all-minilm" })),
            },
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/query",
                description: "Answer a question grounded in the active index. Filters match metadata fields exactly.",
                request_example: Some(json!({
                    "question": "Which sampling methods were used?",
                    "k": 5,
                    "filter": { "author": "Silva", "year": 2020 }
                })),
            },
            CommandDescriptor {
                name: "literature_review",
                method: "POST",
                path: "/reviews",
                description: "Summarize each document under a focus, then compare the summaries. Returns the review and a Markdown report.",
                request_example: Some(json!({
                    "documents": [
                        { "source_file": "a.pdf", "text": "..." },
                        { "source_file": "b.pdf", "text": "..." }
                    ],
                    "focus": "methodology",
                    "include_individual": true
                })),
            },
            CommandDescriptor {
                name: "list_collections",
                method: "GET",
                path: "/collections",
                description: "Describe stored collections with their embedding model, dimension, and vector count.",
                request_example: None,
            },
            CommandDescriptor {
                name: "list_documents",
                method: "GET",
                path: "/collections/:name/documents",
                description: "List the documents stored in a collection with their metadata and chunk counts.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return pipeline counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Error rendered as a status code and a JSON `{ "error": ... }` body.
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, inner.to_string())
    }
}

impl From<IndexError> for AppError {
    fn from(inner: IndexError) -> Self {
        let status = match &inner {
            IndexError::EmptyChunks
            | IndexError::InvalidCollectionName(_)
            | IndexError::DuplicateChunk(_)
            | IndexError::Store(StoreError::InvalidCollectionName(_)) => StatusCode::BAD_REQUEST,
            IndexError::CollectionNotFound(_) => StatusCode::NOT_FOUND,
            IndexError::ModelMismatch { .. } => StatusCode::CONFLICT,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, inner.to_string())
    }
}

impl From<QueryError> for AppError {
    fn from(inner: QueryError) -> Self {
        let status = match &inner {
            QueryError::NoActiveIndex => StatusCode::CONFLICT,
            QueryError::Index(IndexError::ModelMismatch { .. }) => StatusCode::CONFLICT,
            QueryError::Index(_) => StatusCode::BAD_GATEWAY,
            QueryError::Retrieval(error) => match error {
                RetrievalError::EmptyQuery => StatusCode::BAD_REQUEST,
                RetrievalError::IndexNotReady(_)
                | RetrievalError::ModelMismatch { .. }
                | RetrievalError::DimensionMismatch { .. } => StatusCode::CONFLICT,
                RetrievalError::EmptyEmbedding
                | RetrievalError::Embedding(_)
                | RetrievalError::Store(_) => StatusCode::BAD_GATEWAY,
            },
            QueryError::Answer(AnswerError::EmptyQuestion) => StatusCode::BAD_REQUEST,
            QueryError::Answer(AnswerError::Generation(_)) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, inner.to_string())
    }
}
