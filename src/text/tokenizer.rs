//! Word tokenization for names and paths.
//!
//! Splits on snake/kebab/whitespace separators first, then at CamelCase
//! boundaries. Two camel rules, applied in order:
//!
//! 1. break between a lowercase and the uppercase that follows (`aB` → `a|B`)
//! 2. break between an uppercase run and an uppercase-then-lowercase
//!    (`ABCd` → `AB|Cd`)
//!
//! so `HTTPSConnection` yields `HTTPS`, `Connection` and `parseJSON` yields
//! `parse`, `JSON`. Token positions are offsets into the original text, not
//! the normalized form.

/// A word token with its start offset in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordToken {
    pub text: String,
    pub position: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CharType {
    Upper,
    Lower,
    Other,
}

fn classify(ch: char) -> CharType {
    if ch.is_uppercase() {
        CharType::Upper
    } else if ch.is_lowercase() {
        CharType::Lower
    } else {
        CharType::Other
    }
}

fn is_separator(ch: char) -> bool {
    ch == '_' || ch == '-' || ch.is_whitespace()
}

/// Split `text` into word tokens with positions.
pub fn split_words(text: &str) -> Vec<WordToken> {
    let mut out = Vec::new();
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    let mut i = 0;
    while i < chars.len() {
        if is_separator(chars[i].1) {
            i += 1;
            continue;
        }
        // Found the start of a separator-delimited segment.
        let start = i;
        while i < chars.len() && !is_separator(chars[i].1) {
            i += 1;
        }
        camel_split(text, &chars[start..i], &mut out);
    }

    out
}

/// Apply the two CamelCase rules to one separator-free segment.
fn camel_split(text: &str, seg: &[(usize, char)], out: &mut Vec<WordToken>) {
    if seg.is_empty() {
        return;
    }

    let mut start = 0;
    for i in 1..seg.len() {
        let prev = classify(seg[i - 1].1);
        let cur = classify(seg[i].1);
        let next = seg.get(i + 1).map(|&(_, c)| classify(c));

        let boundary = (prev == CharType::Lower && cur == CharType::Upper)
            || (prev == CharType::Upper
                && cur == CharType::Upper
                && next == Some(CharType::Lower));

        if boundary {
            push_token(text, seg, start, i, out);
            start = i;
        }
    }
    push_token(text, seg, start, seg.len(), out);
}

fn push_token(text: &str, seg: &[(usize, char)], start: usize, end: usize, out: &mut Vec<WordToken>) {
    let byte_start = seg[start].0;
    let byte_end = seg
        .get(end)
        .map(|&(b, _)| b)
        .unwrap_or_else(|| seg[end - 1].0 + seg[end - 1].1.len_utf8());
    out.push(WordToken {
        text: text[byte_start..byte_end].to_string(),
        position: byte_start as u32,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[WordToken]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_camel_case_split() {
        assert_eq!(texts(&split_words("getUserById")), vec!["get", "User", "By", "Id"]);
        assert_eq!(texts(&split_words("parseJSON")), vec!["parse", "JSON"]);
    }

    #[test]
    fn test_upper_run_split() {
        assert_eq!(texts(&split_words("HTTPSConnection")), vec!["HTTPS", "Connection"]);
        assert_eq!(texts(&split_words("ABCd")), vec!["AB", "Cd"]);
    }

    #[test]
    fn test_snake_and_kebab() {
        assert_eq!(texts(&split_words("get_user-name")), vec!["get", "user", "name"]);
        assert_eq!(
            texts(&split_words("getUserName_withID")),
            vec!["get", "User", "Name", "with", "ID"]
        );
    }

    #[test]
    fn test_whitespace_separators() {
        assert_eq!(texts(&split_words("main rs  src")), vec!["main", "rs", "src"]);
    }

    #[test]
    fn test_positions_in_original_text() {
        let tokens = split_words("get_User");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 4);

        let camel = split_words("abDef");
        assert_eq!(camel[1].text, "Def");
        assert_eq!(camel[1].position, 2);
    }

    #[test]
    fn test_digits_are_neutral() {
        // Digits are neither case, so neither camel rule fires around them;
        // only explicit separators split digit-bearing segments.
        assert_eq!(texts(&split_words("utf8Decoder")), vec!["utf8Decoder"]);
        assert_eq!(texts(&split_words("v2_api")), vec!["v2", "api"]);
    }

    #[test]
    fn test_empty_and_separator_only() {
        assert!(split_words("").is_empty());
        assert!(split_words("___--  ").is_empty());
    }

    #[test]
    fn test_character_coverage() {
        // Token lengths sum to the input length minus the separators.
        let input = "getUserName_withID";
        let tokens = split_words(input);
        let token_len: usize = tokens.iter().map(|t| t.text.len()).sum();
        let separator_len = input.chars().filter(|&c| is_separator(c)).count();
        assert_eq!(token_len, input.len() - separator_len);
    }
}
