//! Reduce step: compare successful summaries across papers.

use super::focus::ReviewFocus;
use super::types::{PaperSummary, ReviewError};
use crate::generation::{GenerationClient, SamplingSettings};
use std::fmt::Write as _;
use std::sync::Arc;

/// Default word bound for the comparative synthesis.
pub const DEFAULT_SYNTHESIS_WORD_TARGET: usize = 500;

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are an expert in systematic literature reviews.";

/// Issues the single cross-document comparison request.
pub struct Comparator {
    generator: Arc<dyn GenerationClient>,
    sampling: SamplingSettings,
    word_target: usize,
}

impl Comparator {
    /// Construct a comparator bounding the synthesis to `word_target` words.
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        sampling: SamplingSettings,
        word_target: usize,
    ) -> Self {
        Self {
            generator,
            sampling,
            word_target,
        }
    }

    /// Compare the successful entries of `summaries` under `focus`.
    ///
    /// Failed summaries are ignored. Fewer than two successful summaries fail with
    /// [`ReviewError::InsufficientInput`] before any request is made.
    pub async fn compare(
        &self,
        summaries: &[PaperSummary],
        focus: ReviewFocus,
    ) -> Result<String, ReviewError> {
        let successful: Vec<&PaperSummary> =
            summaries.iter().filter(|summary| summary.is_success()).collect();
        if successful.len() < 2 {
            return Err(ReviewError::InsufficientInput {
                successful: successful.len(),
            });
        }

        let prompt = comparison_prompt(&successful, focus, self.word_target);
        let request = self
            .sampling
            .request(Some(SYNTHESIS_SYSTEM_PROMPT.to_string()), prompt);
        let text = self.generator.generate(request).await?;
        Ok(text.trim().to_string())
    }
}

/// Build the comparison prompt listing every summary with its provenance.
pub fn comparison_prompt(
    summaries: &[&PaperSummary],
    focus: ReviewFocus,
    word_target: usize,
) -> String {
    let mut listing = String::new();
    for (position, summary) in summaries.iter().enumerate() {
        let metadata = &summary.metadata;
        let author = metadata.author.as_deref().unwrap_or("Unknown author");
        let year = metadata
            .year
            .map(|year| year.to_string())
            .unwrap_or_else(|| "n.d.".to_string());
        let source = metadata.source_file.as_deref().unwrap_or(&summary.source_id);
        let _ = write!(
            listing,
            "\n\n**Paper {} - {author} ({year}) [{source}]:**\n{}",
            position + 1,
            summary.summary_text().unwrap_or_default()
        );
    }

    format!(
        "Compare the following {count} papers, focusing on {focus}:{listing}\n\n\
         Write a structured comparative synthesis:\n\n\
         ## {title} Comparison\n\n\
         ### Similarities\n- Aspects the studies share\n\n\
         ### Differences\n- Distinct approaches or findings\n\n\
         ### Emerging Patterns\n- Trends or consensus across the studies\n\n\
         ### Research Gaps\n- What still needs to be investigated\n\n\
         Be technical but clear, use bullets, and stay within {word_target} words.",
        count = summaries.len(),
        focus = focus.as_str(),
        title = focus.title(),
    )
}
