//! Text cleanup applied to every page before splitting.

use regex::Regex;
use std::sync::OnceLock;

fn horizontal_whitespace() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\S\n]+").expect("valid whitespace pattern"))
}

fn excess_newlines() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n{3,}").expect("valid newline pattern"))
}

/// Normalize extracted page text.
///
/// Line endings are unified, horizontal whitespace runs collapse to a single space, every line
/// is trimmed, words hyphenated across a line break are rejoined, and blank-line runs collapse
/// to one empty line. Applying the function twice yields the same text as applying it once.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = horizontal_whitespace().replace_all(&unified, " ");
    let trimmed_lines = collapsed
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    let joined = join_hyphenated_words(&trimmed_lines);
    let paragraphs = excess_newlines().replace_all(&joined, "\n\n");
    paragraphs.trim().to_string()
}

/// Remove `-\n` between two word characters, so `meth-\nod` becomes `method`.
fn join_hyphenated_words(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut output = String::with_capacity(text.len());
    let mut idx = 0;

    while idx < chars.len() {
        let current = chars[idx];
        let wraps = current == '-'
            && chars.get(idx + 1) == Some(&'\n')
            && chars.get(idx + 2).is_some_and(|next| next.is_alphanumeric())
            && output
                .chars()
                .last()
                .is_some_and(|prev| prev.is_alphanumeric() || prev == '_');
        if wraps {
            idx += 2;
            continue;
        }
        output.push(current);
        idx += 1;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unifies_line_endings_and_whitespace() {
        let text = "Alpha \t  beta\r\ngamma\rdelta   ";
        assert_eq!(normalize_text(text), "Alpha beta\ngamma\ndelta");
    }

    #[test]
    fn collapses_blank_line_runs() {
        let text = "First paragraph.\n\n\n\n   \nSecond paragraph.";
        assert_eq!(normalize_text(text), "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn joins_words_split_by_line_wrap_hyphen() {
        assert_eq!(normalize_text("meth-\nodology"), "methodology");
        assert_eq!(normalize_text("a-\nb-\nc"), "abc");
        assert_eq!(normalize_text("meth-  \n  odology"), "methodology");
    }

    #[test]
    fn keeps_hyphens_that_are_not_wraps() {
        assert_eq!(normalize_text("state-of-the-art"), "state-of-the-art");
        assert_eq!(normalize_text("list:\n- item"), "list:\n- item");
    }

    #[test]
    fn unicode_spaces_collapse_like_ascii() {
        let text = "soil\u{a0}\u{a0}carbon\u{3000}stock\u{2028}\u{85}\nnext_line";
        assert_eq!(normalize_text(text), "soil carbon stock\nnext_line");
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(
            raw in "[a-z_ \\-\\t\\r\\n.\u{a0}\u{85}\u{2028}\u{3000}]{0,200}"
        ) {
            let once = normalize_text(&raw);
            prop_assert_eq!(normalize_text(&once), once);
        }
    }
}
