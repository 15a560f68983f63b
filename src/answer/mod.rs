//! Grounded answer synthesis over retrieved chunks.
//!
//! The synthesizer renders the retrieved chunks into a bounded context block, wraps it in an
//! instruction prompt, and delegates generation to a [`GenerationClient`]. When retrieval found
//! nothing the generation backend is never contacted.

pub mod context;
pub mod prompt;

use crate::generation::{GenerationClient, GenerationClientError, SamplingSettings};
use crate::retrieval::RetrievalResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Answer returned when retrieval produced no chunks.
pub const NO_MATCHING_DOCUMENTS: &str = "No matching documents were found for this question. \
Try rephrasing it or removing the metadata filter.";

/// Default per-chunk character budget inside the context block.
pub const DEFAULT_CONTEXT_CHUNK_CHARS: usize = 1000;

/// Provenance of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    /// Number of retrieval results handed to the synthesizer.
    pub chunks_retrieved: usize,
    /// Character length of the rendered context block.
    pub context_chars: usize,
    /// Model that produced the answer text.
    pub generation_model: String,
    /// Model that embedded the query and the collection.
    pub embedding_model: String,
}

/// A generated answer and the chunks it was grounded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Answer text.
    pub text: String,
    /// Retrieval results the answer was grounded in, in rank order.
    pub sources: Vec<RetrievalResult>,
    /// Provenance details.
    pub metadata: AnswerMetadata,
}

/// Errors emitted while answering.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Question text was blank.
    #[error("Question must not be empty")]
    EmptyQuestion,
    /// Generation backend failed.
    #[error("Answer generation failed: {0}")]
    Generation(#[from] GenerationClientError),
}

/// Turns retrieval results into a grounded answer.
pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationClient>,
    sampling: SamplingSettings,
    context_chunk_chars: usize,
}

impl AnswerSynthesizer {
    /// Construct a synthesizer issuing requests to `generator`.
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        sampling: SamplingSettings,
        context_chunk_chars: usize,
    ) -> Self {
        Self {
            generator,
            sampling,
            context_chunk_chars,
        }
    }

    /// Model answering requests.
    pub fn generation_model(&self) -> &str {
        self.generator.model_id()
    }

    /// Answer `question` from `results`, which were embedded with `embedding_model`.
    pub async fn answer(
        &self,
        question: &str,
        results: Vec<RetrievalResult>,
        embedding_model: &str,
    ) -> Result<AnswerResult, AnswerError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        let mut metadata = AnswerMetadata {
            chunks_retrieved: results.len(),
            context_chars: 0,
            generation_model: self.generator.model_id().to_string(),
            embedding_model: embedding_model.to_string(),
        };

        if results.is_empty() {
            tracing::info!("No matching documents; skipping generation");
            return Ok(AnswerResult {
                text: NO_MATCHING_DOCUMENTS.to_string(),
                sources: Vec::new(),
                metadata,
            });
        }

        let context = context::build_context(&results, self.context_chunk_chars);
        metadata.context_chars = context.chars().count();

        let request = self
            .sampling
            .request(Some(prompt::system_prompt(&context)), question.to_string());
        tracing::debug!(
            model = %metadata.generation_model,
            chunks = metadata.chunks_retrieved,
            context_chars = metadata.context_chars,
            "Requesting grounded answer"
        );
        let text = self.generator.generate(request).await.map_err(|error| {
            tracing::error!(error = %error, "Answer generation failed");
            error
        })?;

        Ok(AnswerResult {
            text: text.trim().to_string(),
            sources: results,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationRequest;
    use crate::processing::{Chunk, ChunkMetadata};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<GenerationRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl GenerationClient for RecordingClient {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<String, GenerationClientError> {
            self.requests.lock().expect("lock").push(request);
            if self.fail {
                Err(GenerationClientError::ProviderUnavailable("offline".into()))
            } else {
                Ok("  Silva (2020) reports higher yield.  ".into())
            }
        }
    }

    fn result(id: &str) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                chunk_id: id.into(),
                parent_document_id: "doc".into(),
                text: "Yield rose by 12%.".into(),
                metadata: ChunkMetadata {
                    source_file: "silva.pdf".into(),
                    page_number: 4,
                    chunk_index: 2,
                    ..ChunkMetadata::default()
                },
            },
            similarity_score: 0.7,
        }
    }

    fn synthesizer(client: Arc<RecordingClient>) -> AnswerSynthesizer {
        AnswerSynthesizer::new(client, SamplingSettings::default(), DEFAULT_CONTEXT_CHUNK_CHARS)
    }

    #[tokio::test]
    async fn answer_grounds_question_in_context() {
        let client = Arc::new(RecordingClient::default());
        let answer = synthesizer(Arc::clone(&client))
            .answer("What happened to yield?", vec![result("a")], "hash")
            .await
            .expect("answer");

        assert_eq!(answer.text, "Silva (2020) reports higher yield.");
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.metadata.chunks_retrieved, 1);
        assert_eq!(answer.metadata.generation_model, "scripted");
        assert_eq!(answer.metadata.embedding_model, "hash");

        let requests = client.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "What happened to yield?");
        let system = requests[0].system.as_deref().expect("system");
        assert!(system.contains("[silva.pdf - p.4 - chunk 2]\nYield rose by 12%."));
        assert_eq!(
            answer.metadata.context_chars,
            "[silva.pdf - p.4 - chunk 2]\nYield rose by 12%.".chars().count()
        );
    }

    #[tokio::test]
    async fn empty_results_skip_generation() {
        let client = Arc::new(RecordingClient::default());
        let answer = synthesizer(Arc::clone(&client))
            .answer("Anything?", Vec::new(), "hash")
            .await
            .expect("answer");

        assert_eq!(answer.text, NO_MATCHING_DOCUMENTS);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.metadata.chunks_retrieved, 0);
        assert!(client.requests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn generation_errors_surface() {
        let client = Arc::new(RecordingClient {
            fail: true,
            ..RecordingClient::default()
        });
        let error = synthesizer(client)
            .answer("What happened?", vec![result("a")], "hash")
            .await
            .expect_err("failure");
        assert!(matches!(
            error,
            AnswerError::Generation(GenerationClientError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let client = Arc::new(RecordingClient::default());
        assert!(matches!(
            synthesizer(client).answer("  ", vec![result("a")], "hash").await,
            Err(AnswerError::EmptyQuestion)
        ));
    }
}
