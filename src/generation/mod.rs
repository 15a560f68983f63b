//! Abstractions for text generation via hosted or local language models.
//!
//! Prompt construction lives with the callers (answer synthesis, literature review); the
//! clients here only move a request to a backend and return its text. Both backends are reached
//! over plain HTTP with `reqwest`.

mod ollama;
mod openai;

pub use ollama::OllamaGenerationClient;
pub use openai::OpenAiCompatibleClient;

use crate::config::{Config, GenerationProvider};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Errors surfaced while generating text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationClientError {
    /// Provider was unreachable or temporarily refused the request.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider rejected the credentials.
    #[error("Generation provider rejected credentials: {0}")]
    Unauthorized(String),
    /// Provider returned an error response.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to a generation provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Optional system instruction.
    pub system: Option<String>,
    /// User prompt assembled by the caller.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Sampling parameters shared by every request a component issues.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingSettings {
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl SamplingSettings {
    /// Extract sampling parameters from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.generation_temperature,
            max_tokens: config.generation_max_tokens,
        }
    }

    /// Build a request with these parameters.
    pub fn request(&self, system: Option<String>, prompt: String) -> GenerationRequest {
        GenerationRequest {
            system,
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

/// Interface implemented by text-generation providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Identity of the model answering requests.
    fn model_id(&self) -> &str;

    /// Generate a completion for the request.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Build the generation client selected by configuration.
pub fn generation_client_from_config(
    config: &Config,
) -> Result<Arc<dyn GenerationClient>, GenerationClientError> {
    let client: Arc<dyn GenerationClient> = match config.generation_provider {
        GenerationProvider::Ollama => {
            let base_url = config
                .generation_url
                .clone()
                .unwrap_or_else(|| config.ollama_url.clone());
            Arc::new(OllamaGenerationClient::new(
                base_url,
                config.generation_model.clone(),
            )?)
        }
        GenerationProvider::OpenAi => {
            let base_url = config
                .generation_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
            Arc::new(OpenAiCompatibleClient::new(
                base_url,
                config.generation_model.clone(),
                config.generation_api_key.clone(),
            )?)
        }
    };
    tracing::debug!(
        provider = ?config.generation_provider,
        model = client.model_id(),
        "Initialized generation client"
    );
    Ok(client)
}

/// Map a non-success HTTP status to the matching error variant.
pub(crate) fn classify_status(
    provider: &str,
    status: StatusCode,
    body: &str,
) -> GenerationClientError {
    let message = format!("{provider} returned {status}: {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GenerationClientError::Unauthorized(message)
        }
        StatusCode::NOT_FOUND | StatusCode::TOO_MANY_REQUESTS => {
            GenerationClientError::ProviderUnavailable(message)
        }
        status if status.is_server_error() => GenerationClientError::ProviderUnavailable(message),
        _ => GenerationClientError::GenerationFailed(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_status_separates_auth_and_transient_errors() {
        assert!(matches!(
            classify_status("OpenAI", StatusCode::UNAUTHORIZED, ""),
            GenerationClientError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status("OpenAI", StatusCode::TOO_MANY_REQUESTS, ""),
            GenerationClientError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            classify_status("Ollama", StatusCode::BAD_GATEWAY, ""),
            GenerationClientError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            classify_status("Ollama", StatusCode::BAD_REQUEST, "bad prompt"),
            GenerationClientError::GenerationFailed(message) if message.contains("bad prompt")
        ));
    }

    #[test]
    fn sampling_settings_fill_requests() {
        let settings = SamplingSettings {
            temperature: 0.1,
            max_tokens: 64,
        };
        let request = settings.request(None, "Hello".into());
        assert_eq!(request.max_tokens, 64);
        assert!(request.system.is_none());
    }
}
