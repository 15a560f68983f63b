//! Similarity retrieval with exact-match metadata filtering.

mod engine;
pub mod filter;

pub use engine::{RetrievalEngine, RetrievalError, RetrievalOutcome, RetrievalResult};
pub use filter::{FilterValue, MetadataFilter};
