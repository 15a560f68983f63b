//! HTTP client wrapper implementing the vector store contract on Qdrant.

use crate::index::{
    CollectionInfo, CollectionSpec, DocumentSummary, IndexedPoint, StoreError, StoredHit,
    VectorStore,
};
use crate::qdrant::{
    filters::{INDEXED_FIELDS, accumulate_document, build_filter},
    payload::{build_payload, chunk_from_payload, optional_str, point_id},
    scroller::stream_payloads,
    types::{
        CollectionInfoResponse, ListCollectionsResponse, QdrantError, QueryResponse,
        QueryResponseResult, ScrollResponse,
    },
};
use crate::retrieval::MetadataFilter;
use async_trait::async_trait;
use futures_util::{StreamExt, pin_mut};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Points uploaded per request.
const UPSERT_BATCH_SIZE: usize = 256;

/// Lightweight HTTP client for Qdrant operations.
///
/// Qdrant collections carry no model metadata of their own, so the embedding model travels in
/// every point payload. Models of collections created by this client are remembered so the
/// first upsert into a fresh collection can stamp them.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    models: RwLock<HashMap<String, String>>,
}

impl QdrantStore {
    /// Construct a client for the Qdrant instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("paperlens/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            models: RwLock::new(HashMap::new()),
        })
    }

    async fn model_for(&self, collection: &str) -> Result<String, StoreError> {
        if let Some(model) = self.models.read().await.get(collection) {
            return Ok(model.clone());
        }
        if !self.collection_exists(collection).await? {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        let model = self
            .first_payload_model(collection)
            .await?
            .unwrap_or_default();
        self.models
            .write()
            .await
            .insert(collection.to_string(), model.clone());
        Ok(model)
    }

    /// Ensure payload indexes exist for every filterable field.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) -> Result<(), QdrantError> {
        for (field, schema) in INDEXED_FIELDS {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))
                .query(&[("wait", true)])
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(
                    collection = collection_name,
                    field,
                    schema,
                    "Payload index ensured"
                );
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::warn!(collection = collection_name, field, schema, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    async fn first_payload_model(
        &self,
        collection_name: &str,
    ) -> Result<Option<String>, QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/scroll"),
            )
            .json(&json!({
                "limit": 1,
                "with_payload": ["embedding_model"],
                "with_vector": false,
            }))
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let ScrollResponse { result } = response.json().await?;
        Ok(result
            .points
            .into_iter()
            .find_map(|point| point.payload)
            .and_then(|payload| optional_str(&payload, "embedding_model")))
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        if self.collection_exists(&spec.name).await? {
            tracing::debug!(collection = %spec.name, "Dropping existing collection before rebuild");
            self.delete_collection(&spec.name).await?;
        }

        let body = json!({
            "vectors": {
                "size": spec.dimension,
                "distance": "Cosine"
            }
        });
        let response = self
            .request(Method::PUT, &format!("collections/{}", spec.name))
            .json(&body)
            .send()
            .await
            .map_err(QdrantError::from)?;
        ensure_success(response).await?;
        tracing::debug!(collection = %spec.name, dimension = spec.dimension, "Collection created");

        self.ensure_payload_indexes(&spec.name).await?;
        self.models
            .write()
            .await
            .insert(spec.name.clone(), spec.embedding_model.clone());
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        self.models.write().await.remove(name);
        let response = self
            .request(Method::DELETE, &format!("collections/{name}"))
            .send()
            .await
            .map_err(QdrantError::from)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        tracing::debug!(collection = name, "Collection deleted");
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<IndexedPoint>,
    ) -> Result<usize, StoreError> {
        if points.is_empty() {
            return Ok(0);
        }

        let model = self.model_for(collection).await?;
        let now = current_timestamp_rfc3339();
        let mut written = 0;
        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            let serialized: Vec<Value> = batch
                .iter()
                .map(|point| {
                    json!({
                        "id": point_id(&point.chunk.chunk_id),
                        "vector": point.vector,
                        "payload": build_payload(point, &model, &now),
                    })
                })
                .collect();

            let response = self
                .request(Method::PUT, &format!("collections/{collection}/points"))
                .query(&[("wait", true)])
                .json(&json!({ "points": serialized }))
                .send()
                .await
                .map_err(QdrantError::from)?;
            ensure_success(response).await?;
            written += batch.len();
        }

        tracing::debug!(collection, points = written, "Points indexed");
        Ok(written)
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoredHit>, StoreError> {
        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter_value) = filter.and_then(build_filter)
            && let Some(object) = body.as_object_mut()
        {
            object.insert("filter".into(), filter_value);
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/query"),
            )
            .json(&body)
            .send()
            .await
            .map_err(QdrantError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        let response = ensure_success(response).await?;

        let payload: QueryResponse = response.json().await.map_err(QdrantError::from)?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        let mut hits = Vec::with_capacity(points.len());
        for point in points {
            let payload = point.payload.ok_or_else(|| {
                QdrantError::InvalidPayload("query hit returned without payload".into())
            })?;
            let (seq, chunk) = chunk_from_payload(&payload)?;
            hits.push(StoredHit {
                seq,
                chunk,
                score: point.score,
            });
        }
        Ok(hits)
    }

    async fn describe(&self, collection: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection}"))
            .send()
            .await
            .map_err(QdrantError::from)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        let CollectionInfoResponse { result } =
            response.json().await.map_err(QdrantError::from)?;

        let cached = self.models.read().await.get(collection).cloned();
        let embedding_model = match cached {
            Some(model) => model,
            None => self
                .first_payload_model(collection)
                .await?
                .unwrap_or_default(),
        };

        Ok(Some(CollectionInfo {
            name: collection.to_string(),
            embedding_model,
            dimension: result.config.params.vectors.size,
            vector_count: result.points_count.unwrap_or_default(),
        }))
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let response = self
            .request(Method::GET, "collections")
            .send()
            .await
            .map_err(QdrantError::from)?;
        let response = ensure_success(response).await?;
        let payload: ListCollectionsResponse = response.json().await.map_err(QdrantError::from)?;
        let mut names: Vec<String> = payload
            .result
            .collections
            .into_iter()
            .map(|collection| collection.name)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        let stream = stream_payloads(
            self,
            collection,
            json!(["parent_document_id", "source_file", "author", "year", "title"]),
            None,
        );
        pin_mut!(stream);

        let mut documents = BTreeMap::new();
        while let Some(payload) = stream.next().await {
            accumulate_document(&payload?, &mut documents);
        }

        let mut documents: Vec<DocumentSummary> = documents.into_values().collect();
        documents.sort_by(|a, b| a.source_file.cmp(&b.source_file));
        Ok(documents)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, QdrantError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = QdrantError::UnexpectedStatus { status, body };
        tracing::error!(error = %error, "Qdrant request failed");
        Err(error)
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{Chunk, ChunkMetadata};
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn point(seq: u64) -> IndexedPoint {
        IndexedPoint::new(
            seq,
            Chunk {
                chunk_id: format!("doc-{seq:04}"),
                parent_document_id: "doc".into(),
                text: "Sample text".into(),
                metadata: ChunkMetadata {
                    source_file: "paper.pdf".into(),
                    page_number: 1,
                    chunk_index: seq as u32,
                    author: Some("Silva".into()),
                    ..ChunkMetadata::default()
                },
            },
            vec![0.6, 0.8],
        )
    }

    #[tokio::test]
    async fn create_collection_uses_cosine_and_indexes_fields() {
        let server = MockServer::start_async().await;
        let store = QdrantStore::new(&server.base_url(), Some("secret".into())).expect("store");

        let exists = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/collections/papers-demo")
                    .header("api-key", "secret");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/papers-demo")
                    .json_body(json!({ "vectors": { "size": 2, "distance": "Cosine" } }));
                then.status(200).json_body(json!({ "result": true, "status": "ok" }));
            })
            .await;
        let index = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/papers-demo/index");
                then.status(200).json_body(json!({ "result": {}, "status": "ok" }));
            })
            .await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/papers-demo/points")
                    .query_param("wait", "true")
                    .body_contains("\"embedding_model\":\"all-minilm\"")
                    .body_contains("\"seq\":1");
                then.status(200).json_body(json!({ "result": {}, "status": "ok" }));
            })
            .await;

        store
            .create_collection(&CollectionSpec {
                name: "papers-demo".into(),
                dimension: 2,
                embedding_model: "all-minilm".into(),
            })
            .await
            .expect("create");
        let written = store
            .upsert("papers-demo", vec![point(0), point(1)])
            .await
            .expect("upsert");

        exists.assert_async().await;
        create.assert_async().await;
        index.assert_hits_async(INDEXED_FIELDS.len()).await;
        upsert.assert_async().await;
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn query_sends_filter_and_decodes_chunks() {
        let server = MockServer::start_async().await;
        let store = QdrantStore::new(&server.base_url(), None).expect("store");
        let payload = build_payload(&point(3), "all-minilm", "2025-01-01T00:00:00Z");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/papers-demo/points/query")
                    .json_body_partial(
                        r#"{"filter": {"must": [{"key": "author", "match": {"value": "Silva"}}]}}"#,
                    );
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "points": [ { "id": "x", "score": 0.91, "payload": payload } ] }
                }));
            })
            .await;

        let filter = MetadataFilter::by_author("Silva");
        let hits = store
            .query("papers-demo", &[0.6, 0.8], 5, Some(&filter))
            .await
            .expect("query");

        mock.assert_async().await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].seq, 3);
        assert_eq!(hits[0].chunk.chunk_id, "doc-0003");
        assert!((hits[0].score - 0.91).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn describe_reads_size_count_and_model() {
        let server = MockServer::start_async().await;
        let store = QdrantStore::new(&server.base_url(), None).expect("store");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/papers-demo");
                then.status(200).json_body(json!({
                    "result": {
                        "points_count": 12,
                        "config": { "params": { "vectors": { "size": 384, "distance": "Cosine" } } }
                    }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/papers-demo/points/scroll");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [ { "id": 1, "payload": { "embedding_model": "all-minilm" } } ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/missing");
                then.status(404);
            })
            .await;

        let info = store
            .describe("papers-demo")
            .await
            .expect("describe")
            .expect("present");
        assert_eq!(info.dimension, 384);
        assert_eq!(info.vector_count, 12);
        assert_eq!(info.embedding_model, "all-minilm");
        assert!(store.describe("missing").await.expect("describe").is_none());
    }
}
