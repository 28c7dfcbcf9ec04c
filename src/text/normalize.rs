//! Indexing-side text normalization.
//!
//! Names and paths pass through here before trigram extraction. Underscores
//! and hyphens survive normalization: they separate words for the tokenizer
//! but still participate in trigram overlap with the original spelling.

/// Normalize text for trigram indexing.
///
/// Every code unit outside letters, digits, underscore, hyphen and whitespace
/// becomes a space; whitespace runs collapse to a single space; the result is
/// trimmed. Output is pure ASCII word characters, `_`, `-` and single spaces.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            // Whitespace and everything else collapses into one separator.
            pending_space = true;
        }
    }

    out
}
