//! Input budgeting for per-paper summaries.

/// Share of the budget a paragraph cut must preserve, in percent.
const PARAGRAPH_CUT_MIN_PERCENT: usize = 80;

/// Cut `text` to at most `max_chars` characters, returning whether anything was dropped.
///
/// The cut lands on the last paragraph boundary before the budget when that boundary keeps at
/// least 80% of the budget; otherwise the text is cut hard at the budget.
pub fn truncate_input(text: &str, max_chars: usize) -> (String, bool) {
    let Some((limit, _)) = text.char_indices().nth(max_chars) else {
        return (text.to_string(), false);
    };

    let head = &text[..limit];
    let floor = max_chars * PARAGRAPH_CUT_MIN_PERCENT / 100;
    if let Some(boundary) = head.rfind("\n\n")
        && head[..boundary].chars().count() >= floor
    {
        return (head[..boundary].to_string(), true);
    }
    (head.to_string(), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_input("abc", 10), ("abc".to_string(), false));
        assert_eq!(truncate_input("abcdefghij", 10), ("abcdefghij".to_string(), false));
    }

    #[test]
    fn late_paragraph_boundary_is_preferred() {
        let text = format!("{}\n\n{}", "a".repeat(90), "b".repeat(50));
        let (cut, truncated) = truncate_input(&text, 100);
        assert!(truncated);
        assert_eq!(cut, "a".repeat(90));
    }

    #[test]
    fn early_paragraph_boundary_falls_back_to_hard_cut() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(200));
        let (cut, truncated) = truncate_input(&text, 100);
        assert!(truncated);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with('b'));
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let text = "ção".repeat(10);
        let (cut, truncated) = truncate_input(&text, 7);
        assert!(truncated);
        assert_eq!(cut, "çãoçãoç");
    }
}
