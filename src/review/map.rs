//! Map step: summarize one paper under a focus.

use super::focus::ReviewFocus;
use super::truncate::truncate_input;
use super::types::{PaperSummary, ReviewDocument, SummaryMetadata, SummaryOutcome};
use crate::generation::{GenerationClient, SamplingSettings};
use std::sync::Arc;

/// Default character budget for one paper's input.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 8000;

const REVIEWER_SYSTEM_PROMPT: &str = "You are a specialized academic reviewer. Report only \
what the paper states.";

/// Issues one extraction request per paper.
pub struct Summarizer {
    generator: Arc<dyn GenerationClient>,
    sampling: SamplingSettings,
    max_input_chars: usize,
}

impl Summarizer {
    /// Construct a summarizer cutting each paper's input to `max_input_chars`.
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        sampling: SamplingSettings,
        max_input_chars: usize,
    ) -> Self {
        Self {
            generator,
            sampling,
            max_input_chars,
        }
    }

    /// Summarize `document` under `focus`.
    ///
    /// Failed ingestion and empty chunk sets resolve to a failed summary without contacting
    /// the backend; generation errors are captured in the summary.
    pub async fn summarize(&self, document: &ReviewDocument, focus: ReviewFocus) -> PaperSummary {
        let chunks = match &document.content {
            Ok(chunks) => chunks,
            Err(error) => {
                return PaperSummary::failed(
                    &document.source_id,
                    focus,
                    SummaryMetadata::default(),
                    format!("ingestion failed: {error}"),
                );
            }
        };
        let metadata = document.metadata();
        if chunks.is_empty() {
            return PaperSummary::failed(
                &document.source_id,
                focus,
                metadata,
                "document has no chunks to summarize",
            );
        }

        let full_text = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let (text, input_truncated) = truncate_input(&full_text, self.max_input_chars);
        if input_truncated {
            tracing::debug!(
                source = %document.source_id,
                original_chars = full_text.chars().count(),
                budget = self.max_input_chars,
                "Paper input truncated"
            );
        }

        let request = self.sampling.request(
            Some(REVIEWER_SYSTEM_PROMPT.to_string()),
            focus.extraction_prompt(&text),
        );
        let outcome = match self.generator.generate(request).await {
            Ok(summary) if !summary.trim().is_empty() => {
                let summary_text = summary.trim().to_string();
                SummaryOutcome::Completed {
                    word_count: summary_text.split_whitespace().count(),
                    summary_text,
                }
            }
            Ok(_) => SummaryOutcome::Failed {
                error: "generation returned an empty summary".to_string(),
            },
            Err(error) => {
                tracing::warn!(source = %document.source_id, error = %error, "Paper summary failed");
                SummaryOutcome::Failed {
                    error: error.to_string(),
                }
            }
        };

        PaperSummary {
            source_id: document.source_id.clone(),
            focus,
            outcome,
            metadata,
            input_truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationClientError, GenerationRequest};
    use crate::processing::{Chunk, ChunkMetadata};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedClient {
        reply: Result<String, GenerationClientError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(reply: Result<String, GenerationClientError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<String, GenerationClientError> {
            self.prompts.lock().expect("lock").push(request.prompt);
            self.reply.clone()
        }
    }

    fn chunk(index: u32, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("doc-{index:04}"),
            parent_document_id: "doc".into(),
            text: text.into(),
            metadata: ChunkMetadata {
                source_file: "silva.pdf".into(),
                chunk_index: index,
                author: Some("Silva".into()),
                year: Some(2020),
                ..ChunkMetadata::default()
            },
        }
    }

    #[tokio::test]
    async fn summary_counts_words_and_keeps_metadata() {
        let client = ScriptedClient::new(Ok(" A randomized trial with 40 farms. ".into()));
        let summarizer = Summarizer::new(client.clone(), SamplingSettings::default(), 8000);
        let document =
            ReviewDocument::new("silva.pdf", vec![chunk(0, "First."), chunk(1, "Second.")]);

        let summary = summarizer.summarize(&document, ReviewFocus::Methodology).await;

        assert_eq!(summary.summary_text(), Some("A randomized trial with 40 farms."));
        assert_eq!(summary.word_count(), 6);
        assert_eq!(summary.metadata.author.as_deref(), Some("Silva"));
        assert!(!summary.input_truncated);
        let prompts = client.prompts.lock().expect("lock");
        assert!(prompts[0].contains("First.\n\nSecond."));
        assert!(prompts[0].contains("methodology of this paper"));
    }

    #[tokio::test]
    async fn long_input_is_truncated() {
        let client = ScriptedClient::new(Ok("Summary.".into()));
        let summarizer = Summarizer::new(client.clone(), SamplingSettings::default(), 50);
        let document = ReviewDocument::new("silva.pdf", vec![chunk(0, &"x".repeat(120))]);

        let summary = summarizer.summarize(&document, ReviewFocus::Results).await;

        assert!(summary.input_truncated);
        let prompts = client.prompts.lock().expect("lock");
        assert!(prompts[0].contains(&"x".repeat(50)));
        assert!(!prompts[0].contains(&"x".repeat(51)));
    }

    #[tokio::test]
    async fn empty_and_failed_documents_skip_generation() {
        let client = ScriptedClient::new(Ok("unused".into()));
        let summarizer = Summarizer::new(client.clone(), SamplingSettings::default(), 8000);

        let empty = summarizer
            .summarize(&ReviewDocument::new("empty.pdf", Vec::new()), ReviewFocus::Results)
            .await;
        let failed = summarizer
            .summarize(
                &ReviewDocument::failed("broken.pdf", "document is empty"),
                ReviewFocus::Results,
            )
            .await;

        assert!(!empty.is_success());
        assert!(matches!(
            failed.outcome,
            SummaryOutcome::Failed { ref error } if error.contains("document is empty")
        ));
        assert!(client.prompts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn generation_errors_are_captured() {
        let client = ScriptedClient::new(Err(GenerationClientError::ProviderUnavailable(
            "rate limited".into(),
        )));
        let summarizer = Summarizer::new(client, SamplingSettings::default(), 8000);
        let summary = summarizer
            .summarize(
                &ReviewDocument::new("silva.pdf", vec![chunk(0, "Body.")]),
                ReviewFocus::Limitations,
            )
            .await;

        assert_eq!(
            summary.outcome,
            SummaryOutcome::Failed {
                error: "Generation provider unavailable: rate limited".into()
            }
        );
        assert_eq!(summary.source_id, "silva.pdf");
    }
}
