//! Turns the pages of one document into metadata-bearing chunks.

use super::metadata::{chunk_id, document_id, extract_metadata, guess_title};
use super::normalize::normalize_text;
use super::splitter::RecursiveSplitter;
use super::types::{
    Chunk, ChunkMetadata, IngestionError, ManualOverrides, Page, ProcessedDocument,
    ProcessingResult, ProcessingStats, SplitError,
};

/// Share of U+FFFD characters above which a page is treated as undecodable.
const GARBLED_RATIO: f64 = 0.5;

/// Chunking pipeline bound to one splitter configuration.
#[derive(Debug, Clone, Copy)]
pub struct DocumentProcessor {
    splitter: RecursiveSplitter,
}

impl DocumentProcessor {
    /// Build a processor, rejecting degenerate chunk bounds.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SplitError> {
        Ok(Self {
            splitter: RecursiveSplitter::new(chunk_size, overlap)?,
        })
    }

    /// Splitter used for every page.
    pub const fn splitter(&self) -> &RecursiveSplitter {
        &self.splitter
    }

    /// Process the pages of one document.
    ///
    /// Pages are normalized and split independently so overlap never crosses a page boundary.
    /// `overrides` apply to this document only. Failures are returned, never panicked.
    pub fn process(
        &self,
        pages: &[Page],
        source_file: &str,
        overrides: Option<&ManualOverrides>,
    ) -> ProcessingResult {
        if pages.is_empty() {
            return Err(IngestionError::EmptyDocument(source_file.to_string()).into());
        }

        if let Some(reason) = pages.iter().find_map(garbled) {
            return Err(IngestionError::Unreadable {
                source_file: source_file.to_string(),
                reason,
            }
            .into());
        }

        let normalized: Vec<(u32, String)> = pages
            .iter()
            .map(|page| (page_number(page), normalize_text(&page.raw_text)))
            .collect();
        if normalized.iter().all(|(_, text)| text.is_empty()) {
            return Err(IngestionError::NoExtractableText(source_file.to_string()).into());
        }

        let title_guess = normalized
            .first()
            .and_then(|(_, text)| guess_title(text));
        let (extracted_metadata, overrides) =
            extract_metadata(source_file, pages.len(), title_guess.as_deref(), overrides);

        let document_id = document_id(source_file);
        let mut chunks = Vec::new();
        for (page_number, text) in &normalized {
            for piece in self.splitter.split(text) {
                let chunk_index = chunks.len() as u32;
                chunks.push(Chunk {
                    chunk_id: chunk_id(&document_id, chunk_index),
                    parent_document_id: document_id.clone(),
                    text: piece,
                    metadata: ChunkMetadata {
                        source_file: source_file.to_string(),
                        page_number: *page_number,
                        chunk_index,
                        author: overrides.author.clone(),
                        year: overrides.year,
                        title: overrides.title.clone(),
                        title_guess: title_guess.clone(),
                    },
                });
            }
        }

        let total_chars: usize = chunks.iter().map(|chunk| chunk.text.chars().count()).sum();
        let stats = ProcessingStats {
            total_pages: pages.len(),
            total_chunks: chunks.len(),
            average_chunk_chars: if chunks.is_empty() {
                0.0
            } else {
                total_chars as f64 / chunks.len() as f64
            },
        };

        tracing::debug!(
            source_file,
            document_id = %document_id,
            pages = stats.total_pages,
            chunks = stats.total_chunks,
            "Processed document"
        );

        Ok(ProcessedDocument {
            document_id,
            source_file: source_file.to_string(),
            chunks,
            extracted_metadata,
            stats,
        })
    }
}

fn page_number(page: &Page) -> u32 {
    u32::try_from(page.index).unwrap_or(u32::MAX - 1) + 1
}

fn garbled(page: &Page) -> Option<String> {
    let total = page.raw_text.chars().filter(|ch| !ch.is_whitespace()).count();
    if total == 0 {
        return None;
    }
    let replaced = page
        .raw_text
        .chars()
        .filter(|ch| *ch == char::REPLACEMENT_CHARACTER)
        .count();
    if replaced as f64 / total as f64 > GARBLED_RATIO {
        Some(format!(
            "page {} is mostly undecodable characters",
            page_number(page)
        ))
    } else {
        None
    }
}
