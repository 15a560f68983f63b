//! Helpers for normalizing caller-supplied metadata values.

use super::types::ManualOverrides;

/// Sanitize arbitrary string input by trimming whitespace and dropping empties.
pub(crate) fn sanitize_string(value: Option<String>) -> Option<String> {
    value.and_then(|input| {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Drop publication years that cannot be real (zero or negative).
pub(crate) fn sanitize_year(value: Option<i32>) -> Option<i32> {
    value.filter(|year| *year > 0)
}

/// Normalize every field of a set of manual overrides.
pub fn sanitize_overrides(overrides: ManualOverrides) -> ManualOverrides {
    let ManualOverrides {
        author,
        year,
        title,
    } = overrides;

    ManualOverrides {
        author: sanitize_string(author),
        year: sanitize_year(year),
        title: sanitize_string(title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_string_trims_and_drops_blanks() {
        assert_eq!(sanitize_string(Some("  Silva ".into())), Some("Silva".into()));
        assert_eq!(sanitize_string(Some("   ".into())), None);
        assert_eq!(sanitize_string(None), None);
    }

    #[test]
    fn sanitize_overrides_cleans_every_field() {
        let cleaned = sanitize_overrides(ManualOverrides {
            author: Some(" Ada Lovelace ".into()),
            year: Some(0),
            title: Some("\t".into()),
        });
        assert_eq!(
            cleaned,
            ManualOverrides {
                author: Some("Ada Lovelace".into()),
                year: None,
                title: None,
            }
        );
    }
}
