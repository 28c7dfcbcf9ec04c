//! In-name scoring for search candidates.
//!
//! Candidates recalled through the trigram and token indexes are re-ranked by
//! how well the query matches the item's short name. The score ladder is
//! strict: exact > prefix > contains > abbreviation > fuzzy walk, and a fuzzy
//! walk that fails to consume the whole query scores zero.

use crate::text::tokenizer::split_words;

/// Query equals the name.
pub const SCORE_EXACT: i32 = 1000;
/// Name starts with the query.
pub const SCORE_PREFIX: i32 = 900;
/// Name contains the query.
pub const SCORE_CONTAINS: i32 = 800;
/// The abbreviation predicate holds (e.g. "gUN" against "getUserName").
pub const SCORE_ABBREV: i32 = 700;
/// Flat score for abbreviation-only hits found by index enumeration rather
/// than trigram or token recall.
pub const SCORE_ABBREV_FALLBACK: i32 = 600;
/// Boost applied to candidates recalled through the token index.
pub const TOKEN_HIT_BOOST: i32 = 100;

const FUZZY_CHAR: i32 = 100;
const FUZZY_CONSECUTIVE: i32 = 50;
const FUZZY_WORD_BOUNDARY: i32 = 25;
const FUZZY_LENGTH_PENALTY: i32 = 5;

/// Score `query` against a candidate `name`.
///
/// Case folding applies unless the index was built case sensitive. Returns 0
/// when the query cannot be matched at all; the result is always >= 0.
pub fn score(query: &str, name: &str, case_sensitive: bool) -> i32 {
    if query.is_empty() || name.is_empty() {
        return 0;
    }

    let (q, n) = if case_sensitive {
        (query.to_string(), name.to_string())
    } else {
        (query.to_lowercase(), name.to_lowercase())
    };

    if n == q {
        return SCORE_EXACT;
    }
    if n.starts_with(&q) {
        return SCORE_PREFIX;
    }
    if n.contains(&q) {
        return SCORE_CONTAINS;
    }
    if abbrev_matches(query, name) {
        return SCORE_ABBREV;
    }

    fuzzy_walk(&q, &n)
}

/// The abbreviation predicate. Always case folded: abbreviations like "gUN"
/// are about token structure, not letter case.
///
/// Holds when the folded query is a prefix of the token concatenation, a
/// prefix of the token initials, or when a loose in-order walk consumes the
/// whole query (one token per query character, each token used at most once).
pub fn abbrev_matches(query: &str, name: &str) -> bool {
    if query.is_empty() {
        return false;
    }
    let q = query.to_lowercase();
    let tokens = split_words(name);
    if tokens.is_empty() {
        return false;
    }

    let concat: String = tokens
        .iter()
        .flat_map(|t| t.text.chars().flat_map(char::to_lowercase))
        .collect();
    if concat.starts_with(&q) {
        return true;
    }

    let initials: String = tokens
        .iter()
        .filter_map(|t| t.text.chars().next())
        .flat_map(char::to_lowercase)
        .collect();
    if initials.starts_with(&q) {
        return true;
    }

    // Loose walk: each query character consumes the next token, either by
    // matching its first letter or by appearing anywhere in its body.
    let mut ti = 0;
    for ch in q.chars() {
        match tokens.get(ti) {
            Some(tok) if tok.text.to_lowercase().contains(ch) => ti += 1,
            _ => return false,
        }
    }
    true
}

/// In-order fuzzy character walk: 100 per matched character, +50 for a match
/// adjacent to the previous one, +25 at a word boundary, minus 5 per unit of
/// length difference. Zero when the query is not fully consumed.
fn fuzzy_walk(q: &str, n: &str) -> i32 {
    let name: Vec<char> = n.chars().collect();
    let mut total = 0i32;
    let mut next = 0usize;
    let mut last_match: Option<usize> = None;

    for qc in q.chars() {
        let found = (next..name.len()).find(|&i| name[i] == qc);
        let Some(i) = found else {
            return 0;
        };

        total += FUZZY_CHAR;
        if last_match == Some(i.wrapping_sub(1)) {
            total += FUZZY_CONSECUTIVE;
        }
        if i == 0 || !name[i - 1].is_alphanumeric() {
            total += FUZZY_WORD_BOUNDARY;
        }

        last_match = Some(i);
        next = i + 1;
    }

    let len_diff = (name.len() as i32 - q.chars().count() as i32).abs();
    total -= FUZZY_LENGTH_PENALTY * len_diff;

    // Keep the ladder strict: a fuzzy walk never outranks an abbreviation.
    total.clamp(0, SCORE_ABBREV - 1)
}
