//! Trigram extraction over normalized text.
//!
//! A trigram is a 3-byte window of the normalized (and, unless the index is
//! case sensitive, lowercased) text. Windows containing no alphanumeric byte
//! are dropped so runs of separators do not pollute the index.

use crate::text::normalize::normalize;

/// A single positional trigram: the 3-byte term plus its 0-based start
/// offset in the normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gram {
    pub text: String,
    pub position: u32,
}

/// Extract positional trigrams from `text` for indexing.
///
/// The text is normalized first; the case flag is fixed at index build time
/// and must match between indexing and querying. Strings shorter than three
/// bytes after normalization yield nothing.
pub fn trigrams(text: &str, case_sensitive: bool) -> Vec<Gram> {
    let mut normalized = normalize(text);
    if !case_sensitive {
        normalized.make_ascii_lowercase();
    }

    let bytes = normalized.as_bytes();
    if bytes.len() < 3 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(bytes.len() - 2);
    for (pos, window) in bytes.windows(3).enumerate() {
        if window.iter().any(|b| b.is_ascii_alphanumeric()) {
            // Normalized text is ASCII, so the window is always valid UTF-8.
            out.push(Gram {
                text: String::from_utf8_lossy(window).into_owned(),
                position: pos as u32,
            });
        }
    }
    out
}

/// Extract the deduplicated trigram terms of a query string.
///
/// Same alphabet and case folding as [`trigrams`]; positions are not needed
/// for lookup, and duplicate terms must not inflate counted lookups.
pub fn query_trigrams(query: &str, case_sensitive: bool) -> Vec<String> {
    let mut terms: Vec<String> = trigrams(query, case_sensitive)
        .into_iter()
        .map(|g| g.text)
        .collect();
    terms.sort_unstable();
    terms.dedup();
    terms
}
