#![deny(missing_docs)]

//! Core library for PaperLens, retrieval-augmented question answering and literature reviews
//! over scientific papers.

/// Grounded answer synthesis from retrieved chunks.
pub mod answer;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Page extraction from plain-text documents.
pub mod extraction;
/// Text generation client abstraction and adapters.
pub mod generation;
/// Vector index lifecycle and storage backends.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Similarity search over an active collection.
pub mod retrieval;
/// Map-reduce literature reviews.
pub mod review;
/// Facade wiring processing, indexing, retrieval, answers, and reviews together.
pub mod service;
