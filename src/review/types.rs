//! Inputs, per-paper summaries, and the aggregate literature review.

use super::focus::ReviewFocus;
use crate::generation::GenerationClientError;
use crate::processing::{Chunk, ProcessingResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// One document handed to the review, as produced by ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDocument {
    /// Identifier reported back in the summary, usually the filename.
    pub source_id: String,
    /// Ordered chunks, or the reason ingestion failed.
    pub content: Result<Vec<Chunk>, String>,
}

impl ReviewDocument {
    /// Document with its chunks in order.
    pub fn new(source_id: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self {
            source_id: source_id.into(),
            content: Ok(chunks),
        }
    }

    /// Document whose ingestion failed.
    pub fn failed(source_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            content: Err(error.into()),
        }
    }

    /// Wrap the outcome of processing `source_id`.
    pub fn from_processing(source_id: impl Into<String>, result: ProcessingResult) -> Self {
        match result {
            Ok(document) => Self::new(source_id, document.chunks),
            Err(error) => Self::failed(source_id, error.to_string()),
        }
    }

    /// Bibliographic details of the first chunk, empty when ingestion failed.
    pub fn metadata(&self) -> SummaryMetadata {
        self.content
            .as_deref()
            .map(SummaryMetadata::from_chunks)
            .unwrap_or_default()
    }
}

/// Bibliographic details copied from a document's first chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    /// Source filename.
    pub source_file: Option<String>,
    /// Author, when known.
    pub author: Option<String>,
    /// Publication year, when known.
    pub year: Option<i32>,
    /// Title, manual or guessed.
    pub title: Option<String>,
}

impl SummaryMetadata {
    /// Metadata of the first chunk, or empty metadata when there is none.
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        chunks
            .first()
            .map(|chunk| {
                let metadata = &chunk.metadata;
                Self {
                    source_file: Some(metadata.source_file.clone()),
                    author: metadata.author.clone(),
                    year: metadata.year,
                    title: metadata.title.clone().or_else(|| metadata.title_guess.clone()),
                }
            })
            .unwrap_or_default()
    }
}

/// Result of summarizing one paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryOutcome {
    /// Generation produced a summary.
    Completed {
        /// Summary text.
        summary_text: String,
        /// Whitespace-delimited words in the summary.
        word_count: usize,
    },
    /// The paper could not be summarized.
    Failed {
        /// Captured failure reason.
        error: String,
    },
}

/// Summary of one paper under a focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperSummary {
    /// Identifier of the summarized document.
    pub source_id: String,
    /// Focus the summary was written for.
    pub focus: ReviewFocus,
    /// Summary text or failure.
    pub outcome: SummaryOutcome,
    /// Bibliographic details.
    pub metadata: SummaryMetadata,
    /// True when the input exceeded the character budget and was cut.
    pub input_truncated: bool,
}

impl PaperSummary {
    /// Failed summary carrying `error`.
    pub fn failed(
        source_id: impl Into<String>,
        focus: ReviewFocus,
        metadata: SummaryMetadata,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            focus,
            outcome: SummaryOutcome::Failed {
                error: error.into(),
            },
            metadata,
            input_truncated: false,
        }
    }

    /// Summary text when generation succeeded.
    pub fn summary_text(&self) -> Option<&str> {
        match &self.outcome {
            SummaryOutcome::Completed { summary_text, .. } => Some(summary_text),
            SummaryOutcome::Failed { .. } => None,
        }
    }

    /// Word count of a successful summary, zero otherwise.
    pub fn word_count(&self) -> usize {
        match &self.outcome {
            SummaryOutcome::Completed { word_count, .. } => *word_count,
            SummaryOutcome::Failed { .. } => 0,
        }
    }

    /// True when generation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SummaryOutcome::Completed { .. })
    }
}

/// Why a review ended without a synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewFailure {
    /// Fewer than two papers were summarized.
    InsufficientInput {
        /// Number of successful summaries.
        successful: usize,
    },
    /// The comparison request itself failed.
    SynthesisGeneration {
        /// Error reported by the generation backend.
        error: String,
    },
}

/// Stage of the map-reduce state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ReviewPhase {
    /// Nothing started yet.
    Init,
    /// Per-paper summaries in flight.
    MapRunning,
    /// Every per-paper summary resolved.
    MapDone,
    /// Comparison in flight.
    ReduceRunning,
    /// Synthesis produced.
    Done,
    /// Review ended without a synthesis.
    Failed(ReviewFailure),
}

/// Cross-document synthesis or the reason it is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SynthesisOutcome {
    /// Comparison text.
    Completed {
        /// Synthesis body.
        text: String,
    },
    /// No synthesis was produced.
    Failed {
        /// Failure reason.
        failure: ReviewFailure,
    },
}

/// Errors from the reduce step.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// Comparison needs at least two successful summaries.
    #[error("At least 2 successful summaries are required for a comparison, got {successful}")]
    InsufficientInput {
        /// Number of successful summaries supplied.
        successful: usize,
    },
    /// Generation backend failed.
    #[error("Synthesis generation failed: {0}")]
    Generation(#[from] GenerationClientError),
}

impl From<ReviewError> for ReviewFailure {
    fn from(error: ReviewError) -> Self {
        match error {
            ReviewError::InsufficientInput { successful } => {
                ReviewFailure::InsufficientInput { successful }
            }
            ReviewError::Generation(error) => ReviewFailure::SynthesisGeneration {
                error: error.to_string(),
            },
        }
    }
}

/// Completed literature review. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureReview {
    /// Unique identifier of this run.
    pub review_id: String,
    /// Focus applied to every paper.
    pub focus: ReviewFocus,
    /// Per-paper summaries in input order.
    pub per_paper: Vec<PaperSummary>,
    /// Whether exported reports list individual summaries.
    pub include_individual: bool,
    /// Cross-document synthesis.
    pub synthesis: SynthesisOutcome,
    /// Terminal phase.
    pub phase: ReviewPhase,
    /// Number of documents supplied.
    pub total_papers: usize,
    /// Number of papers summarized successfully.
    pub successful_count: usize,
    /// Combined word count of successful summaries.
    pub total_words: usize,
    /// Wall time of the whole run.
    pub duration: Duration,
}

impl LiteratureReview {
    /// Successful summaries in input order.
    pub fn successful_summaries(&self) -> impl Iterator<Item = &PaperSummary> {
        self.per_paper.iter().filter(|summary| summary.is_success())
    }

    /// Synthesis text when the reduce step succeeded.
    pub fn synthesis_text(&self) -> Option<&str> {
        match &self.synthesis {
            SynthesisOutcome::Completed { text } => Some(text),
            SynthesisOutcome::Failed { .. } => None,
        }
    }
}
