//! Map-reduce literature review driver.

use super::focus::ReviewFocus;
use super::map::{DEFAULT_MAX_INPUT_CHARS, Summarizer};
use super::reduce::{Comparator, DEFAULT_SYNTHESIS_WORD_TARGET};
use super::types::{
    LiteratureReview, PaperSummary, ReviewDocument, ReviewError, ReviewFailure, ReviewPhase,
    SynthesisOutcome,
};
use crate::config::Config;
use crate::generation::{GenerationClient, SamplingSettings};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use uuid::Uuid;

/// Tuning for a review run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSettings {
    /// Maximum summaries in flight at once.
    pub concurrency: usize,
    /// Deadline for each summary request.
    pub task_timeout: Duration,
    /// Character budget for each paper's input.
    pub max_input_chars: usize,
    /// Word bound for the synthesis.
    pub synthesis_word_target: usize,
}

impl ReviewSettings {
    /// Extract review settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.review_concurrency,
            task_timeout: config.review_task_timeout,
            max_input_chars: config.review_max_input_chars,
            synthesis_word_target: config.synthesis_word_target,
        }
    }
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            task_timeout: Duration::from_secs(120),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            synthesis_word_target: DEFAULT_SYNTHESIS_WORD_TARGET,
        }
    }
}

/// Summarizes each paper concurrently, then compares the summaries.
pub struct ReviewOrchestrator {
    summarizer: Arc<Summarizer>,
    comparator: Comparator,
    concurrency: usize,
    task_timeout: Duration,
}

impl ReviewOrchestrator {
    /// Construct an orchestrator issuing every request to `generator`.
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        sampling: SamplingSettings,
        settings: ReviewSettings,
    ) -> Self {
        Self {
            summarizer: Arc::new(Summarizer::new(
                Arc::clone(&generator),
                sampling,
                settings.max_input_chars,
            )),
            comparator: Comparator::new(generator, sampling, settings.synthesis_word_target),
            concurrency: settings.concurrency.max(1),
            task_timeout: settings.task_timeout,
        }
    }

    /// Run the review over `documents`, reporting summaries in input order.
    pub async fn run(
        &self,
        documents: Vec<ReviewDocument>,
        focus: ReviewFocus,
        include_individual: bool,
    ) -> LiteratureReview {
        let started = Instant::now();
        let review_id = Uuid::new_v4().to_string();
        let total_papers = documents.len();
        let mut phase = ReviewPhase::Init;

        advance(&review_id, &mut phase, ReviewPhase::MapRunning);
        let per_paper = self.map(documents, focus).await;
        advance(&review_id, &mut phase, ReviewPhase::MapDone);

        let successful_count = per_paper.iter().filter(|summary| summary.is_success()).count();
        let total_words = per_paper.iter().map(PaperSummary::word_count).sum();

        let reduced = if successful_count < 2 {
            Err(ReviewError::InsufficientInput {
                successful: successful_count,
            })
        } else {
            advance(&review_id, &mut phase, ReviewPhase::ReduceRunning);
            self.comparator.compare(&per_paper, focus).await
        };

        let synthesis = match reduced {
            Ok(text) => {
                advance(&review_id, &mut phase, ReviewPhase::Done);
                SynthesisOutcome::Completed { text }
            }
            Err(error) => {
                tracing::warn!(review_id = %review_id, error = %error, "Synthesis unavailable");
                let failure = ReviewFailure::from(error);
                advance(&review_id, &mut phase, ReviewPhase::Failed(failure.clone()));
                SynthesisOutcome::Failed { failure }
            }
        };

        let duration = started.elapsed();
        tracing::info!(
            review_id = %review_id,
            focus = %focus,
            total_papers,
            successful = successful_count,
            words = total_words,
            elapsed_ms = duration.as_millis() as u64,
            "Literature review finished"
        );

        LiteratureReview {
            review_id,
            focus,
            per_paper,
            include_individual,
            synthesis,
            phase,
            total_papers,
            successful_count,
            total_words,
            duration,
        }
    }

    async fn map(&self, documents: Vec<ReviewDocument>, focus: ReviewFocus) -> Vec<PaperSummary> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(documents.len());

        for document in documents {
            let source_id = document.source_id.clone();
            let metadata = document.metadata();
            let summarizer = Arc::clone(&self.summarizer);
            let semaphore = Arc::clone(&semaphore);
            let deadline = self.task_timeout;

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(error) => {
                        return PaperSummary::failed(
                            document.source_id.clone(),
                            focus,
                            document.metadata(),
                            format!("summary task could not start: {error}"),
                        );
                    }
                };
                match timeout(deadline, summarizer.summarize(&document, focus)).await {
                    Ok(summary) => summary,
                    Err(_) => {
                        tracing::warn!(source = %document.source_id, ?deadline, "Paper summary timed out");
                        PaperSummary::failed(
                            document.source_id.clone(),
                            focus,
                            document.metadata(),
                            format!("summary timed out after {deadline:?}"),
                        )
                    }
                }
            });
            tasks.push((source_id, metadata, handle));
        }

        let mut summaries = Vec::with_capacity(tasks.len());
        for (source_id, metadata, handle) in tasks {
            let summary = match handle.await {
                Ok(summary) => summary,
                Err(error) => {
                    tracing::error!(source = %source_id, error = %error, "Paper summary task aborted");
                    PaperSummary::failed(
                        source_id,
                        focus,
                        metadata,
                        format!("summary task aborted: {error}"),
                    )
                }
            };
            summaries.push(summary);
        }
        summaries
    }
}

fn advance(review_id: &str, phase: &mut ReviewPhase, next: ReviewPhase) {
    tracing::debug!(review_id, from = ?phase, to = ?next, "Review phase transition");
    *phase = next;
}
