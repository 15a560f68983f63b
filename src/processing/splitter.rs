//! Recursive character splitter with a separator cascade and sliding overlap.

use super::types::SplitError;
use std::collections::VecDeque;

/// Separators tried in priority order. The empty separator splits between characters.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Splits text into chunks no longer than `chunk_size` characters.
///
/// The highest-priority separator present in the text is used first; pieces that are still too
/// long are split again with the remaining separators. Consecutive chunks share up to `overlap`
/// characters of whole pieces.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl RecursiveSplitter {
    /// Validate the bounds and build a splitter.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SplitError> {
        if chunk_size == 0 {
            return Err(SplitError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(SplitError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum characters per chunk.
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared between adjacent chunks.
    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into trimmed, non-empty chunks in text order.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        if !text.trim().is_empty() {
            self.split_with(text, &SEPARATORS, &mut chunks);
        }
        chunks
    }

    fn split_with(&self, text: &str, separators: &[&str], chunks: &mut Vec<String>) {
        let position = separators
            .iter()
            .position(|separator| separator.is_empty() || text.contains(separator))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces = if separator.is_empty() {
            split_chars(text)
        } else {
            split_keeping_separator(text, separator)
        };

        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                self.merge(&pending, chunks);
                pending.clear();
            }
            if remaining.is_empty() {
                self.merge(&split_chars(piece), chunks);
            } else {
                self.split_with(piece, remaining, chunks);
            }
        }
        if !pending.is_empty() {
            self.merge(&pending, chunks);
        }
    }

    /// Greedily pack pieces into chunks, carrying trailing pieces forward as overlap.
    fn merge(&self, pieces: &[&str], chunks: &mut Vec<String>) {
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_chunk(&window, chunks);
                while total > self.overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        push_chunk(&window, chunks);
    }
}

fn push_chunk(window: &VecDeque<(&str, usize)>, chunks: &mut Vec<String>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

fn split_chars(text: &str) -> Vec<&str> {
    text.char_indices()
        .map(|(idx, ch)| &text[idx..idx + ch.len_utf8()])
        .collect()
}
