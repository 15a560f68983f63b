//! Collection naming for embedding identities.

use sha2::{Digest, Sha256};

const MAX_SLUG_CHARS: usize = 32;
const FALLBACK_PREFIX: &str = "papers";

/// Deterministic base collection name for an embedding identity.
///
/// The readable slug keeps names recognizable; the hash suffix keeps distinct identities apart
/// even when their slugs collide (`BAAI/bge-small` and `baai-bge-small`). The prefix is
/// slugified too, so every name satisfies [`is_valid_collection_name`].
pub fn collection_name(prefix: &str, embedding_model: &str) -> String {
    let digest = Sha256::digest(embedding_model.as_bytes());
    let suffix = hex::encode(&digest[..4]);
    let prefix = match slugify(prefix) {
        slug if slug.is_empty() => FALLBACK_PREFIX.to_string(),
        slug => slug,
    };
    let slug = slugify(embedding_model);
    if slug.is_empty() {
        format!("{prefix}-{suffix}")
    } else {
        format!("{prefix}-{slug}-{suffix}")
    }
}

/// Name of build generation `generation` of the collection `base`.
pub fn generation_name(base: &str, generation: u64) -> String {
    format!("{base}-{generation}")
}

/// Generation number encoded in `name` when it belongs to `base`.
pub fn parse_generation(base: &str, name: &str) -> Option<u64> {
    let digits = name.strip_prefix(base)?.strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// True when `name` is non-empty and made of lowercase ASCII letters, digits and `-`.
///
/// Names reach file paths and URLs, so anything else is refused before use.
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-')
}

fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-')
        .chars()
        .take(MAX_SLUG_CHARS)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_deterministic() {
        assert_eq!(
            collection_name("papers", "all-minilm"),
            collection_name("papers", "all-minilm")
        );
        assert!(collection_name("papers", "all-minilm").starts_with("papers-all-minilm-"));
    }

    #[test]
    fn colliding_slugs_get_distinct_names() {
        let a = collection_name("papers", "BAAI/bge-small");
        let b = collection_name("papers", "baai-bge-small");
        assert_ne!(a, b);
        assert!(a.starts_with("papers-baai-bge-small-"));
    }

    #[test]
    fn slug_is_bounded_and_safe() {
        let name = collection_name("papers", "sentence-transformers/all-MiniLM-L6-v2:latest");
        assert!(
            name.chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        );
        assert_eq!(collection_name("papers", "///").len(), "papers-".len() + 8);
    }

    #[test]
    fn prefix_is_slugified() {
        let name = collection_name("My_Papers", "all-minilm");
        assert!(name.starts_with("my-papers-all-minilm-"));
        assert!(is_valid_collection_name(&name));
        assert!(collection_name("///", "all-minilm").starts_with("papers-all-minilm-"));
    }

    #[test]
    fn generations_round_trip_for_their_base_only() {
        let base = collection_name("papers", "hashing:all-minilm@384");
        let name = generation_name(&base, 3);
        assert_eq!(parse_generation(&base, &name), Some(3));
        assert_eq!(parse_generation(&base, &base), None);
        assert_eq!(parse_generation(&base, &format!("{base}-x1")), None);
        assert_eq!(parse_generation(&base, "papers-other-1"), None);
    }

    #[test]
    fn traversal_names_are_invalid() {
        assert!(is_valid_collection_name("papers-all-minilm-a51ea6ac-1"));
        for name in ["", "../../x", "papers/..", "Papers", "a b", "x.json"] {
            assert!(!is_valid_collection_name(name), "{name:?} should be rejected");
        }
    }
}
