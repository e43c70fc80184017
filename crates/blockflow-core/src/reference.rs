//! # Reference Extractor
//!
//! Scans a text payload and returns the ordered list of block names it
//! references.
//!
//! Two lexical forms are recognized, non-overlapping, left to right:
//!
//! - bare: `#` followed by one or more of `[A-Za-z0-9_.-]`
//! - bracket: `[` up to the first `]`, arbitrary non-`]` content,
//!   allowing spaces; must be non-empty and terminated
//!
//! Duplicates are preserved (the substitution engine performs one
//! replacement pass per occurrence). Bracket forms do not nest;
//! unterminated or empty brackets are ignored and scanning resumes
//! just past the opening bracket.
//!
//! This is a hand-rolled scanner rather than a regex on purpose: the
//! word-boundary rule for bare tokens during substitution must agree
//! exactly with the character class used here, and owning both sides
//! keeps the boundary conditions in one place.

use crate::primitives::{BRACKET_CLOSE, BRACKET_OPEN, REFERENCE_MARKER};

/// Whether a character may appear in a bare `#name` token.
#[must_use]
pub fn is_bare_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Extract every referenced block name from `text`, in order of
/// appearance, duplicates preserved.
#[must_use]
pub fn extract_references(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c == REFERENCE_MARKER {
            // Bare form: consume the identifier character class.
            let start = idx + c.len_utf8();
            let mut end = start;
            while let Some(&(next_idx, next_c)) = chars.peek() {
                if is_bare_name_char(next_c) {
                    end = next_idx + next_c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            if end > start {
                names.push(text[start..end].to_string());
            }
        } else if c == BRACKET_OPEN {
            // Bracket form: everything up to the first closing bracket.
            // No nesting; an unterminated bracket matches nothing and
            // scanning continues with the character after '['.
            let content_start = idx + c.len_utf8();
            if let Some(close_idx) = text[content_start..].find(BRACKET_CLOSE) {
                let content = &text[content_start..content_start + close_idx];
                if !content.is_empty() {
                    names.push(content.to_string());
                    // Skip the consumed content and the closing bracket.
                    let resume = content_start + close_idx + BRACKET_CLOSE.len_utf8();
                    while let Some(&(next_idx, _)) = chars.peek() {
                        if next_idx < resume {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
        }
    }

    names
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn no_references_yields_empty() {
        assert!(extract_references("plain text, nothing here").is_empty());
    }

    #[test]
    fn bare_reference_extracted() {
        assert_eq!(extract_references("#alpha world"), vec!["alpha"]);
    }

    #[test]
    fn bare_reference_allows_identifier_chars() {
        assert_eq!(
            extract_references("#block-1.v2_final done"),
            vec!["block-1.v2_final"]
        );
    }

    #[test]
    fn bare_reference_stops_at_non_identifier() {
        assert_eq!(extract_references("#a,#b!"), vec!["a", "b"]);
    }

    #[test]
    fn lone_marker_ignored() {
        assert!(extract_references("# not a ref").is_empty());
        assert!(extract_references("#").is_empty());
    }

    #[test]
    fn bracket_reference_allows_spaces() {
        assert_eq!(
            extract_references("use [my first block] here"),
            vec!["my first block"]
        );
    }

    #[test]
    fn unterminated_bracket_ignored() {
        assert!(extract_references("broken [name").is_empty());
    }

    #[test]
    fn unterminated_bracket_does_not_hide_later_tokens() {
        assert_eq!(extract_references("broken [x then #a"), vec!["a"]);
    }

    #[test]
    fn empty_bracket_ignored() {
        assert!(extract_references("empty []").is_empty());
    }

    #[test]
    fn marker_inside_bracket_consumed_by_bracket() {
        assert_eq!(extract_references("[a #b] tail"), vec!["a #b"]);
    }

    #[test]
    fn duplicates_preserved_in_order() {
        assert_eq!(
            extract_references("#a then [b] then #a again"),
            vec!["a", "b", "a"]
        );
    }

    #[test]
    fn mixed_forms_in_order() {
        assert_eq!(
            extract_references("#first [second block] #third"),
            vec!["first", "second block", "third"]
        );
    }

    #[test]
    fn adjacent_tokens() {
        assert_eq!(extract_references("#a#b"), vec!["a", "b"]);
        assert_eq!(extract_references("[a][b]"), vec!["a", "b"]);
    }

    #[test]
    fn non_ascii_data_does_not_panic() {
        assert_eq!(extract_references("héllo #naïve… [café au lait]"), vec![
            "na", // bare class is ASCII-only, stops at 'ï'
            "café au lait",
        ]);
    }

    // The scanner must agree with the substitution engine's character
    // class for arbitrary inputs; this mostly guards against panics on
    // odd char boundaries.
    proptest::proptest! {
        #[test]
        fn extraction_never_panics(text in ".*") {
            let _ = extract_references(&text);
        }

        #[test]
        fn extracted_bare_names_match_class(name in "[A-Za-z0-9_.-]{1,16}") {
            let text = format!("#{} tail", name);
            let refs = extract_references(&text);
            proptest::prop_assert_eq!(refs, vec![name]);
        }
    }
}
