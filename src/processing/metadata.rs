//! Document identity and document-level metadata extraction.

use super::sanitize::sanitize_overrides;
use super::types::{ExtractedMetadata, ManualOverrides, MetadataSource, MetadataValue};
use sha2::{Digest, Sha256};

/// Number of leading lines of the first page searched for a title.
const TITLE_SCAN_LINES: usize = 10;
/// A line must be longer than this many characters to count as a title.
const TITLE_MIN_CHARS: usize = 20;

/// Derive a stable document identifier from the filename.
pub fn document_id(source_file: &str) -> String {
    let digest = Sha256::digest(source_file.as_bytes());
    hex::encode(&digest[..8])
}

/// Build the identifier of the chunk at `chunk_index` inside `document_id`.
pub fn chunk_id(document_id: &str, chunk_index: u32) -> String {
    format!("{document_id}-{chunk_index:04}")
}

/// Guess the document title from the normalized text of its first page.
///
/// Returns the first of the leading lines that is long enough to plausibly be a title.
pub fn guess_title(first_page: &str) -> Option<String> {
    first_page
        .lines()
        .take(TITLE_SCAN_LINES)
        .map(str::trim)
        .find(|line| line.chars().count() > TITLE_MIN_CHARS)
        .map(str::to_string)
}

/// Combine caller overrides with the heuristic title into document metadata.
///
/// A caller-supplied title always wins over the heuristic guess.
pub fn extract_metadata(
    source_file: &str,
    total_pages: usize,
    title_guess: Option<&str>,
    overrides: Option<&ManualOverrides>,
) -> (ExtractedMetadata, ManualOverrides) {
    let overrides = overrides
        .cloned()
        .map(sanitize_overrides)
        .unwrap_or_default();

    let title = match (&overrides.title, title_guess) {
        (Some(manual), _) => Some(MetadataValue {
            value: manual.clone(),
            source: MetadataSource::Manual,
        }),
        (None, Some(guess)) => Some(MetadataValue {
            value: guess.to_string(),
            source: MetadataSource::Heuristic,
        }),
        (None, None) => None,
    };

    let metadata = ExtractedMetadata {
        source_file: source_file.to_string(),
        total_pages,
        title,
        author: overrides.author.clone(),
        year: overrides.year,
    };
    (metadata, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_is_deterministic_per_filename() {
        assert_eq!(document_id("paper.pdf"), document_id("paper.pdf"));
        assert_ne!(document_id("paper.pdf"), document_id("other.pdf"));
        assert_eq!(document_id("paper.pdf").len(), 16);
    }

    #[test]
    fn chunk_id_pads_index() {
        assert_eq!(chunk_id("abc", 7), "abc-0007");
    }

    #[test]
    fn guess_title_skips_short_lines() {
        let page = "Vol. 3\nJournal of Things\nDeep Learning for Coastal Erosion Monitoring\nAbstract";
        assert_eq!(
            guess_title(page).as_deref(),
            Some("Deep Learning for Coastal Erosion Monitoring")
        );
    }

    #[test]
    fn guess_title_only_scans_leading_lines() {
        let mut page = "short\n".repeat(10);
        page.push_str("This line is long enough to be a title");
        assert_eq!(guess_title(&page), None);
    }

    #[test]
    fn manual_title_overrides_heuristic() {
        let overrides = ManualOverrides {
            author: Some("Silva".into()),
            year: Some(2021),
            title: Some(" Real Title ".into()),
        };
        let (metadata, _) = extract_metadata("a.pdf", 3, Some("Guessed title"), Some(&overrides));
        let title = metadata.title.expect("title");
        assert_eq!(title.value, "Real Title");
        assert_eq!(title.source, MetadataSource::Manual);
        assert_eq!(metadata.author.as_deref(), Some("Silva"));
    }

    #[test]
    fn heuristic_title_is_marked_low_confidence() {
        let (metadata, overrides) = extract_metadata("a.pdf", 1, Some("Guessed title"), None);
        assert_eq!(
            metadata.title.map(|title| title.source),
            Some(MetadataSource::Heuristic)
        );
        assert_eq!(overrides, ManualOverrides::default());
    }
}
