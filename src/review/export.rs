//! Markdown rendering of a finished review.

use super::types::{LiteratureReview, ReviewFailure, SynthesisOutcome};
use std::fmt::Write as _;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const REPORT_FOOTER: &str = "*Generated by paperlens with a map-reduce literature review. \
Verify every claim against the original papers before citing it.*";

/// Render `review` as Markdown stamped with `generated_at`.
///
/// Output depends only on the review and the timestamp.
pub fn render_report(review: &LiteratureReview, generated_at: OffsetDateTime) -> String {
    let timestamp = generated_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| generated_at.unix_timestamp().to_string());

    let mut report = String::new();
    let _ = writeln!(report, "# Literature Review: {}", review.focus.title());
    report.push('\n');
    let _ = writeln!(report, "- **Focus:** {}", review.focus);
    let _ = writeln!(
        report,
        "- **Papers summarized:** {} of {}",
        review.successful_count, review.total_papers
    );
    let _ = writeln!(report, "- **Words in summaries:** {}", review.total_words);
    let _ = writeln!(
        report,
        "- **Duration:** {:.1}s",
        review.duration.as_secs_f64()
    );
    let _ = writeln!(report, "- **Generated:** {timestamp}");
    report.push('\n');

    report.push_str("## Comparative Synthesis\n\n");
    match &review.synthesis {
        SynthesisOutcome::Completed { text } => {
            report.push_str(text.trim());
            report.push('\n');
        }
        SynthesisOutcome::Failed { failure } => {
            let _ = writeln!(report, "> Synthesis unavailable: {}", describe_failure(failure));
        }
    }

    if review.include_individual {
        report.push_str("\n## Individual Summaries\n");
        for (position, summary) in review.successful_summaries().enumerate() {
            let metadata = &summary.metadata;
            let label = metadata
                .title
                .as_deref()
                .or(metadata.source_file.as_deref())
                .unwrap_or(&summary.source_id);
            let _ = writeln!(report, "\n### {}. {label}\n", position + 1);

            let author = metadata.author.as_deref().unwrap_or("Unknown author");
            let year = metadata
                .year
                .map(|year| year.to_string())
                .unwrap_or_else(|| "n.d.".to_string());
            let _ = writeln!(report, "*{author} ({year}) - {}*\n", summary.source_id);
            let _ = writeln!(report, "{}", summary.summary_text().unwrap_or_default());
        }
    }

    report.push_str("\n---\n\n");
    report.push_str(REPORT_FOOTER);
    report.push('\n');
    report
}

/// Render `review` stamped with the current UTC time.
pub fn export_report(review: &LiteratureReview) -> String {
    render_report(review, OffsetDateTime::now_utc())
}

fn describe_failure(failure: &ReviewFailure) -> String {
    match failure {
        ReviewFailure::InsufficientInput { successful } => format!(
            "at least 2 successfully summarized papers are needed for a comparison, {successful} available."
        ),
        ReviewFailure::SynthesisGeneration { error } => {
            format!("the comparison request failed: {error}")
        }
    }
}
