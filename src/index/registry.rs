//! Persisted mapping from embedding model identity to collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One registered collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Collection name.
    pub collection: String,
    /// Vector dimension of the collection.
    pub dimension: usize,
    /// Vectors written by the last build.
    pub vector_count: usize,
    /// RFC3339 timestamp of the last successful build.
    pub built_at: String,
}

/// Model-to-collection registry, optionally mirrored to a JSON file.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    path: Option<PathBuf>,
    entries: BTreeMap<String, RegistryEntry>,
}

impl CollectionRegistry {
    /// Registry kept only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the registry stored at `path`; a missing file yields an empty registry.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let path = path.into();
        let entries = if tokio::fs::try_exists(&path).await? {
            let bytes = tokio::fs::read(&path).await?;
            serde_json::from_slice(&bytes)
                .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidData, error))?
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), models = entries.len(), "Loaded collection registry");
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// Collection registered for `embedding_model`.
    pub fn get(&self, embedding_model: &str) -> Option<&RegistryEntry> {
        self.entries.get(embedding_model)
    }

    /// All registrations keyed by model identity.
    pub fn entries(&self) -> &BTreeMap<String, RegistryEntry> {
        &self.entries
    }

    /// Record `entry` for `embedding_model` and persist the registry.
    ///
    /// When the file cannot be written the previous registration is restored.
    pub async fn register(
        &mut self,
        embedding_model: &str,
        entry: RegistryEntry,
    ) -> Result<(), std::io::Error> {
        let previous = self.entries.insert(embedding_model.to_string(), entry);
        if let Err(error) = self.save().await {
            match previous {
                Some(previous) => self.entries.insert(embedding_model.to_string(), previous),
                None => self.entries.remove(embedding_model),
            };
            return Err(error);
        }
        Ok(())
    }

    async fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&self.entries)
            .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidData, error))?;
        tokio::fs::write(path, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(collection: &str) -> RegistryEntry {
        RegistryEntry {
            collection: collection.into(),
            dimension: 384,
            vector_count: 10,
            built_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn registrations_survive_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("collections.json");

        let mut registry = CollectionRegistry::load(&path).await.expect("load");
        assert!(registry.entries().is_empty());
        registry
            .register("all-minilm", entry("papers-all-minilm-1234abcd"))
            .await
            .expect("register");

        let reloaded = CollectionRegistry::load(&path).await.expect("reload");
        assert_eq!(
            reloaded.get("all-minilm").map(|entry| entry.collection.as_str()),
            Some("papers-all-minilm-1234abcd")
        );
    }

    #[tokio::test]
    async fn failed_save_keeps_previous_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("collections.json");
        let mut registry = CollectionRegistry::load(&path).await.expect("load");
        registry.register("m", entry("c-1")).await.expect("register");

        tokio::fs::remove_file(&path).await.expect("remove");
        tokio::fs::create_dir(&path).await.expect("block path");
        assert!(registry.register("m", entry("c-2")).await.is_err());
        assert!(registry.register("n", entry("d-1")).await.is_err());

        assert_eq!(registry.get("m").map(|entry| entry.collection.as_str()), Some("c-1"));
        assert!(registry.get("n").is_none());
    }
}
