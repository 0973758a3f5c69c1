//! Link detection for rich-text facets.
//!
//! Bluesky addresses facet spans in UTF-8 bytes, so every offset produced
//! here is a byte offset into the exact string that gets published.

use std::sync::OnceLock;

use regex::Regex;

/// Greedy link pattern: scheme, then anything up to the next space, tab,
/// newline or carriage return.
const LINK_PATTERN: &str = r"https?://[^ \n\r\t]*";

/// A link span inside post text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFacet {
    /// The matched URL text.
    pub url: String,
    /// Inclusive start byte offset.
    pub byte_start: usize,
    /// Exclusive end byte offset.
    pub byte_end: usize,
}

fn link_regex() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(LINK_PATTERN).ok()).as_ref()
}

/// Find every `http://` / `https://` run in `text`.
///
/// The match is deliberately permissive: trailing punctuation is kept and
/// well-formedness is not checked. Returns an empty vector when the text
/// has no links.
pub fn extract_links(text: &str) -> Vec<LinkFacet> {
    let Some(pattern) = link_regex() else {
        return Vec::new();
    };

    pattern
        .find_iter(text)
        .map(|m| LinkFacet {
            url: m.as_str().to_owned(),
            byte_start: m.start(),
            byte_end: m.end(),
        })
        .collect()
}
