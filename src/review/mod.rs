//! Map-reduce literature review over per-document chunk sets.
//!
//! The map step summarizes every paper under a [`ReviewFocus`] with bounded concurrency and a
//! per-request deadline; the reduce step compares the successful summaries in a single request.
//! Reviews work on chunk sets straight from the processing pipeline and never touch the index.

pub mod export;
pub mod focus;
mod map;
mod orchestrator;
mod reduce;
pub mod truncate;
pub mod types;

pub use export::{export_report, render_report};
pub use focus::ReviewFocus;
pub use map::{DEFAULT_MAX_INPUT_CHARS, Summarizer};
pub use orchestrator::{ReviewOrchestrator, ReviewSettings};
pub use reduce::{Comparator, DEFAULT_SYNTHESIS_WORD_TARGET, comparison_prompt};
pub use types::{
    LiteratureReview, PaperSummary, ReviewDocument, ReviewError, ReviewFailure, ReviewPhase,
    SummaryMetadata, SummaryOutcome, SynthesisOutcome,
};
