use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for PaperLens.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Vector store backend holding the collections.
    pub vector_store: VectorStoreKind,
    /// Base URL of the Qdrant instance (required when `vector_store` is `qdrant`).
    pub qdrant_url: Option<String>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Directory used by the local store to persist collections.
    pub local_store_dir: PathBuf,
    /// Prefix shared by every collection name.
    pub collection_prefix: String,
    /// JSON file mapping embedding model identities to collection names.
    pub collection_registry_path: PathBuf,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of vectors produced by the hashing provider.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Text-generation backend.
    pub generation_provider: GenerationProvider,
    /// Model identifier passed to the generation backend.
    pub generation_model: String,
    /// Optional base URL override for the generation backend.
    pub generation_url: Option<String>,
    /// API key for hosted generation backends.
    pub generation_api_key: Option<String>,
    /// Sampling temperature for generation requests.
    pub generation_temperature: f32,
    /// Upper bound on generated tokens.
    pub generation_max_tokens: u32,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks of the same page.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub retrieval_k: usize,
    /// Per-chunk character cap inside the answer context.
    pub context_chunk_chars: usize,
    /// Maximum number of concurrent per-paper summaries.
    pub review_concurrency: usize,
    /// Deadline applied to each per-paper summary call.
    pub review_task_timeout: Duration,
    /// Character budget of the text sent for each per-paper summary.
    pub review_max_input_chars: usize,
    /// Approximate word target for the comparative synthesis.
    pub synthesis_word_target: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// In-process store persisted as JSON files.
    Local,
    /// Remote Qdrant instance.
    Qdrant,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic feature-hashing embeddings computed in-process.
    Hashing,
}

/// Supported text-generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint (OpenAI, Groq, vLLM).
    OpenAi,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vector_store: VectorStoreKind::Local,
            qdrant_url: None,
            qdrant_api_key: None,
            local_store_dir: PathBuf::from("data/vectors"),
            collection_prefix: "papers".to_string(),
            collection_registry_path: PathBuf::from("data/collections.json"),
            embedding_provider: EmbeddingProvider::Hashing,
            embedding_model: "all-minilm".to_string(),
            embedding_dimension: 384,
            ollama_url: "http://127.0.0.1:11434".to_string(),
            generation_provider: GenerationProvider::Ollama,
            generation_model: "llama3.1".to_string(),
            generation_url: None,
            generation_api_key: None,
            generation_temperature: 0.3,
            generation_max_tokens: 2048,
            chunk_size: 1200,
            chunk_overlap: 200,
            retrieval_k: 5,
            context_chunk_chars: 1000,
            review_concurrency: 4,
            review_task_timeout: Duration::from_secs(120),
            review_max_input_chars: 8000,
            synthesis_word_target: 500,
            server_port: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    ///
    /// Every variable is optional except `QDRANT_URL` when `VECTOR_STORE=qdrant`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let vector_store = parse_optional("VECTOR_STORE")?.unwrap_or(defaults.vector_store);
        let qdrant_url = load_env_optional("QDRANT_URL");
        if vector_store == VectorStoreKind::Qdrant && qdrant_url.is_none() {
            return Err(ConfigError::MissingVariable("QDRANT_URL".to_string()));
        }

        Ok(Self {
            vector_store,
            qdrant_url,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            local_store_dir: load_env_optional("LOCAL_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_store_dir),
            collection_prefix: load_env_optional("COLLECTION_PREFIX")
                .unwrap_or(defaults.collection_prefix),
            collection_registry_path: load_env_optional("COLLECTION_REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.collection_registry_path),
            embedding_provider: parse_optional("EMBEDDING_PROVIDER")?
                .unwrap_or(defaults.embedding_provider),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimension: parse_optional("EMBEDDING_DIMENSION")?
                .unwrap_or(defaults.embedding_dimension),
            ollama_url: load_env_optional("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            generation_provider: parse_optional("GENERATION_PROVIDER")?
                .unwrap_or(defaults.generation_provider),
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
            generation_url: load_env_optional("GENERATION_URL"),
            generation_api_key: load_env_optional("GENERATION_API_KEY"),
            generation_temperature: parse_optional("GENERATION_TEMPERATURE")?
                .unwrap_or(defaults.generation_temperature),
            generation_max_tokens: parse_optional("GENERATION_MAX_TOKENS")?
                .unwrap_or(defaults.generation_max_tokens),
            chunk_size: parse_optional("CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_optional("CHUNK_OVERLAP")?.unwrap_or(defaults.chunk_overlap),
            retrieval_k: parse_optional("RETRIEVAL_K")?.unwrap_or(defaults.retrieval_k),
            context_chunk_chars: parse_optional("CONTEXT_CHUNK_CHARS")?
                .unwrap_or(defaults.context_chunk_chars),
            review_concurrency: parse_optional::<usize>("REVIEW_CONCURRENCY")?
                .unwrap_or(defaults.review_concurrency)
                .max(1),
            review_task_timeout: parse_optional("REVIEW_TASK_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.review_task_timeout),
            review_max_input_chars: parse_optional("REVIEW_MAX_INPUT_CHARS")?
                .unwrap_or(defaults.review_max_input_chars),
            synthesis_word_target: parse_optional("SYNTHESIS_WORD_TARGET")?
                .unwrap_or(defaults.synthesis_word_target),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl FromStr for VectorStoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hashing" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
}

impl FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "groq" => Ok(Self::OpenAi),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        vector_store = ?config.vector_store,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        generation_provider = ?config.generation_provider,
        generation_model = %config.generation_model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
