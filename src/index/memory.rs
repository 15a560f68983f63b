//! In-process vector store with optional JSON persistence.
//!
//! Collections live in a `HashMap` guarded by a `tokio::sync::RwLock`. When a root directory is
//! configured every collection is mirrored to `{root}/{name}.json` after each write and loaded
//! back on first access, so an index built in one session can be reopened in the next. Names
//! outside `[a-z0-9-]+` are refused before they reach the filesystem.

use super::naming::is_valid_collection_name;
use super::store::{
    CollectionInfo, CollectionSpec, DocumentSummary, IndexedPoint, StoreError, StoredHit,
    VectorStore, cosine_similarity,
};
use crate::retrieval::MetadataFilter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalCollection {
    spec: CollectionSpec,
    points: Vec<IndexedPoint>,
}

/// Vector store kept in process memory.
#[derive(Debug, Default)]
pub struct LocalVectorStore {
    root: Option<PathBuf>,
    collections: RwLock<HashMap<String, LocalCollection>>,
}

impl LocalVectorStore {
    /// Store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store persisting each collection as JSON under `root`.
    pub fn persistent(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn collection_path(&self, name: &str) -> Result<Option<PathBuf>, StoreError> {
        check_name(name)?;
        Ok(self
            .root
            .as_ref()
            .map(|root| root.join(format!("{name}.json"))))
    }

    async fn ensure_loaded(&self, name: &str) -> Result<bool, StoreError> {
        check_name(name)?;
        if self.collections.read().await.contains_key(name) {
            return Ok(true);
        }
        let Some(path) = self.collection_path(name)? else {
            return Ok(false);
        };
        if !tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }

        let bytes = tokio::fs::read(&path).await?;
        let collection: LocalCollection = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            collection = name,
            points = collection.points.len(),
            path = %path.display(),
            "Loaded persisted collection"
        );
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_insert(collection);
        Ok(true)
    }

    async fn persist(&self, collection: &LocalCollection) -> Result<(), StoreError> {
        let Some(path) = self.collection_path(&collection.spec.name)? else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(collection)?;
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn create_collection(&self, spec: &CollectionSpec) -> Result<(), StoreError> {
        check_name(&spec.name)?;
        let collection = LocalCollection {
            spec: spec.clone(),
            points: Vec::new(),
        };
        self.persist(&collection).await?;
        self.collections
            .write()
            .await
            .insert(spec.name.clone(), collection);
        tracing::debug!(collection = %spec.name, dimension = spec.dimension, "Collection created");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let path = self.collection_path(name)?;
        self.collections.write().await.remove(name);
        if let Some(path) = path
            && tokio::fs::try_exists(&path).await?
        {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<IndexedPoint>,
    ) -> Result<usize, StoreError> {
        if !self.ensure_loaded(collection).await? {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        if let Some(point) = points
            .iter()
            .find(|point| point.vector.len() != stored.spec.dimension)
        {
            return Err(StoreError::DimensionMismatch {
                expected: stored.spec.dimension,
                actual: point.vector.len(),
            });
        }

        let written = points.len();
        for point in points {
            match stored
                .points
                .iter_mut()
                .find(|existing| existing.chunk.chunk_id == point.chunk.chunk_id)
            {
                Some(existing) => *existing = point,
                None => stored.points.push(point),
            }
        }

        let snapshot = stored.clone();
        drop(collections);
        self.persist(&snapshot).await?;
        Ok(written)
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<StoredHit>, StoreError> {
        if !self.ensure_loaded(collection).await? {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }

        let collections = self.collections.read().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let mut hits: Vec<StoredHit> = stored
            .points
            .iter()
            .filter(|point| filter.is_none_or(|filter| filter.matches(&point.chunk)))
            .map(|point| StoredHit {
                seq: point.seq,
                chunk: point.chunk.clone(),
                score: cosine_similarity(&point.vector, vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.seq.cmp(&b.seq)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn describe(&self, collection: &str) -> Result<Option<CollectionInfo>, StoreError> {
        if !self.ensure_loaded(collection).await? {
            return Ok(None);
        }
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|stored| CollectionInfo {
            name: stored.spec.name.clone(),
            embedding_model: stored.spec.embedding_model.clone(),
            dimension: stored.spec.dimension,
            vector_count: stored.points.len(),
        }))
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        if let Some(root) = &self.root {
            names.extend(persisted_names(root).await?);
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentSummary>, StoreError> {
        if !self.ensure_loaded(collection).await? {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        let collections = self.collections.read().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let mut documents: BTreeMap<String, DocumentSummary> = BTreeMap::new();
        for point in &stored.points {
            let chunk = &point.chunk;
            let entry = documents
                .entry(chunk.parent_document_id.clone())
                .or_insert_with(|| DocumentSummary {
                    parent_document_id: chunk.parent_document_id.clone(),
                    source_file: chunk.metadata.source_file.clone(),
                    author: chunk.metadata.author.clone(),
                    year: chunk.metadata.year,
                    title: chunk.metadata.title.clone(),
                    chunk_count: 0,
                });
            entry.chunk_count += 1;
        }

        let mut documents: Vec<DocumentSummary> = documents.into_values().collect();
        documents.sort_by(|a, b| a.source_file.cmp(&b.source_file));
        Ok(documents)
    }
}

async fn persisted_names(root: &Path) -> Result<Vec<String>, StoreError> {
    if !tokio::fs::try_exists(root).await? {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json")
            && let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
            && is_valid_collection_name(stem)
        {
            names.push(stem.to_string());
        }
    }
    Ok(names)
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if is_valid_collection_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidCollectionName(name.to_string()))
    }
}
