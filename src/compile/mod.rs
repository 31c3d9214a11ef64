//! Compiles template source into a [`Document`].

mod lex;
mod markup;
mod parse;

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

pub(crate) use crate::compile::markup::Tk;
pub(crate) use crate::compile::parse::{Parser, TagHead};
use crate::tags::TagRegistry;
use crate::types::document::Document;
use crate::Result;

/// Matches the comments theme-check uses to toggle its checks, in both the
/// inline and the block form.
static THEME_CHECK_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\{%-?\s*#\s*theme-check-(?:disable|enable)[^%]*?-?%\}|\{%-?\s*comment\s*-?%\}\s*theme-check-(?:disable|enable).*?\{%-?\s*endcomment\s*-?%\}",
    )
    .unwrap()
});

/// Parses a template with the given tag registry.
///
/// The source is preprocessed first, see [`preprocess`].
pub fn parse(source: &str, tags: &TagRegistry) -> Result<Document> {
    parse_preprocessed(preprocess(source).into_owned(), tags)
}

pub(crate) fn parse_preprocessed(source: String, tags: &TagRegistry) -> Result<Document> {
    let hash = hash(&source);
    let (nodes, has_includes) = Parser::new(&source, tags)?.parse_document()?;
    Ok(Document {
        source,
        nodes,
        has_includes,
        hash,
    })
}

/// Normalizes line endings and strips theme-check comments.
///
/// This runs before hashing so that sources differing only in these respects
/// share a cache entry.
pub fn preprocess(source: &str) -> Cow<'_, str> {
    let source = if source.contains('\r') {
        Cow::Owned(source.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(source)
    };
    let stripped = match THEME_CHECK_COMMENT.replace_all(&source, "") {
        Cow::Borrowed(_) => None,
        Cow::Owned(stripped) => Some(stripped),
    };
    stripped.map_or(source, Cow::Owned)
}

/// Returns the hex encoded SHA-256 of the given source.
pub fn hash(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_strips_theme_check_comments() {
        let source = "a{% # theme-check-disable UnusedAssign %}b\r\n{%- comment -%}theme-check-enable{%- endcomment -%}c";
        assert_eq!(preprocess(source), "ab\nc");
    }

    #[test]
    fn preprocess_borrows_clean_source() {
        assert!(matches!(preprocess("{{ a }}"), Cow::Borrowed(_)));
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash("abc"), hash("abc"));
        assert_ne!(hash("abc"), hash("abd"));
        assert_eq!(hash("").len(), 64);
    }
}
