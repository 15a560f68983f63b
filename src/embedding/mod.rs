//! Embedding client abstraction, backends, and the per-model client pool.

mod hashing;
mod ollama;

pub use hashing::HashingEmbeddingClient;
pub use ollama::OllamaEmbeddingClient;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider response could not be parsed or had the wrong shape.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
///
/// Implementations return unit-length vectors so cosine similarity reduces to a dot product.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Identity of the model producing the vectors.
    fn model_id(&self) -> &str;

    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize_vector(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Settings needed to construct embedding clients.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    /// Backend used for every model.
    pub provider: EmbeddingProvider,
    /// Model used when callers do not name one.
    pub default_model: String,
    /// Output dimension of the hashing backend.
    pub dimension: usize,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
}

impl EmbeddingSettings {
    /// Extract embedding settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider: config.embedding_provider,
            default_model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
            ollama_url: config.ollama_url.clone(),
        }
    }
}

/// Builds a client for a model identity.
pub type EmbedderFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> + Send + Sync>;

/// Maps a requested model name to the identity of the embedding space it produces.
pub type IdentityResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Identity of an embedding space: backend, model name and, for hashing, the dimension.
///
/// Two configurations share an identity only when they produce comparable vectors, so the same
/// model name served by different backends never lands in the same collection.
pub fn embedding_identity(provider: EmbeddingProvider, model: &str, dimension: usize) -> String {
    match provider {
        EmbeddingProvider::Hashing => format!("{HASHING_PREFIX}{model}@{dimension}"),
        EmbeddingProvider::Ollama => format!("{OLLAMA_PREFIX}{model}"),
    }
}

const HASHING_PREFIX: &str = "hashing:";
const OLLAMA_PREFIX: &str = "ollama:";

fn is_qualified(model: &str) -> bool {
    model.starts_with(HASHING_PREFIX) || model.starts_with(OLLAMA_PREFIX)
}

/// Lazily constructed embedding clients, one per embedding identity.
///
/// A client is built on first request for its identity and then shared read-only. Every client
/// reports that identity from [`EmbeddingClient::model_id`].
pub struct EmbedderPool {
    default_model: String,
    resolver: IdentityResolver,
    factory: EmbedderFactory,
    clients: RwLock<HashMap<String, Arc<dyn EmbeddingClient>>>,
}

impl EmbedderPool {
    /// Pool building clients with an arbitrary factory. Model names are used as identities.
    pub fn with_factory(default_model: impl Into<String>, factory: EmbedderFactory) -> Self {
        Self::with_resolver(default_model, Arc::new(|model: &str| model.to_string()), factory)
    }

    /// Pool resolving model names through `resolver` before building clients with `factory`.
    pub fn with_resolver(
        default_model: impl Into<String>,
        resolver: IdentityResolver,
        factory: EmbedderFactory,
    ) -> Self {
        Self {
            default_model: default_model.into(),
            resolver,
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Pool building clients for the configured provider.
    ///
    /// Bare model names resolve to [`embedding_identity`] for this provider. Identities of
    /// another provider are rejected when a client is requested for them.
    pub fn from_settings(settings: EmbeddingSettings) -> Self {
        let EmbeddingSettings {
            provider,
            default_model,
            dimension,
            ollama_url,
        } = settings;

        let resolver: IdentityResolver = Arc::new(move |model: &str| {
            if is_qualified(model) {
                model.to_string()
            } else {
                embedding_identity(provider, model, dimension)
            }
        });

        let factory: EmbedderFactory = Arc::new(move |identity: &str| {
            let client: Arc<dyn EmbeddingClient> = match provider {
                EmbeddingProvider::Hashing => {
                    let suffix = format!("@{dimension}");
                    if identity
                        .strip_prefix(HASHING_PREFIX)
                        .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                        .is_none()
                    {
                        return Err(foreign_identity(identity));
                    }
                    Arc::new(HashingEmbeddingClient::new(identity, dimension)?)
                }
                EmbeddingProvider::Ollama => {
                    let model = identity
                        .strip_prefix(OLLAMA_PREFIX)
                        .ok_or_else(|| foreign_identity(identity))?;
                    Arc::new(
                        OllamaEmbeddingClient::new(ollama_url.clone(), model)?
                            .with_identity(identity),
                    )
                }
            };
            Ok(client)
        });
        Self::with_resolver(default_model, resolver, factory)
    }

    /// Embedding identity a request for `model` resolves to.
    pub fn identity(&self, model: &str) -> String {
        (self.resolver)(model)
    }

    /// Model used when callers do not name one.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Return the client for `model`, constructing it on first use.
    ///
    /// `model` may be a bare model name or an identity returned by [`EmbedderPool::identity`].
    pub async fn get(&self, model: &str) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
        let identity = self.identity(model);
        let model_id = identity.as_str();
        if let Some(client) = self.clients.read().await.get(model_id) {
            return Ok(Arc::clone(client));
        }

        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(model_id) {
            return Ok(Arc::clone(client));
        }

        tracing::debug!(model = model_id, "Initializing embedding client");
        let client = (self.factory)(model_id)?;
        clients.insert(model_id.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Number of clients built so far.
    pub async fn loaded_models(&self) -> usize {
        self.clients.read().await.len()
    }
}

fn foreign_identity(identity: &str) -> EmbeddingClientError {
    EmbeddingClientError::GenerationFailed(format!(
        "embedding space '{identity}' is not served by the configured provider"
    ))
}
