//! Citation-preserving context assembly for grounded answers.

use crate::retrieval::RetrievalResult;
use std::collections::HashSet;

/// Separator placed between context blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Render retrieved chunks as citation-headed blocks in rank order.
///
/// Each block is `[source - p.N - chunk i]` followed by the chunk text cut to `max_chunk_chars`
/// characters, with `...` appended when cut. A chunk appearing more than once is rendered at
/// its first position only.
pub fn build_context(results: &[RetrievalResult], max_chunk_chars: usize) -> String {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter(|result| seen.insert(result.chunk.chunk_id.as_str()))
        .map(|result| {
            let metadata = &result.chunk.metadata;
            format!(
                "[{} - p.{} - chunk {}]\n{}",
                metadata.source_file,
                metadata.page_number,
                metadata.chunk_index,
                truncate_chars(&result.chunk.text, max_chunk_chars)
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{Chunk, ChunkMetadata};

    fn result(id: &str, page: u32, index: u32, text: &str) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                chunk_id: id.into(),
                parent_document_id: "doc".into(),
                text: text.into(),
                metadata: ChunkMetadata {
                    source_file: "silva2020.pdf".into(),
                    page_number: page,
                    chunk_index: index,
                    ..ChunkMetadata::default()
                },
            },
            similarity_score: 0.8,
        }
    }

    #[test]
    fn blocks_carry_citation_headers_in_rank_order() {
        let context = build_context(
            &[result("b", 3, 5, "Second ranked."), result("a", 1, 0, "Third.")],
            1000,
        );
        assert_eq!(
            context,
            "[silva2020.pdf - p.3 - chunk 5]\nSecond ranked.\n\n---\n\n[silva2020.pdf - p.1 - chunk 0]\nThird."
        );
    }

    #[test]
    fn long_chunks_are_cut_with_ellipsis() {
        let text = "é".repeat(1200);
        let context = build_context(&[result("a", 1, 0, &text)], 1000);
        let body = context.split_once('\n').map(|(_, body)| body).unwrap_or_default();
        assert_eq!(body.chars().count(), 1003);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn text_at_the_limit_is_untouched() {
        let text = "x".repeat(1000);
        let context = build_context(&[result("a", 1, 0, &text)], 1000);
        assert!(!context.ends_with("..."));
    }

    #[test]
    fn duplicate_chunks_appear_once() {
        let context = build_context(
            &[
                result("a", 1, 0, "Alpha."),
                result("a", 1, 0, "Alpha."),
                result("b", 2, 1, "Beta."),
            ],
            1000,
        );
        assert_eq!(context.matches("Alpha.").count(), 1);
        assert_eq!(context.matches(BLOCK_SEPARATOR).count(), 1);
    }

    #[test]
    fn no_results_give_empty_context() {
        assert!(build_context(&[], 1000).is_empty());
    }
}
