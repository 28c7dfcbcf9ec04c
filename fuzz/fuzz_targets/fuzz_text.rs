#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Normalization, trigram and token extraction must never panic on
    // arbitrary input, and must uphold their structural invariants.
    let normalized = navix::text::normalize(data);
    assert!(normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' '));

    for case_sensitive in [false, true] {
        for gram in navix::text::trigrams(data, case_sensitive) {
            assert_eq!(gram.text.len(), 3);
            assert!(gram.text.bytes().any(|b| b.is_ascii_alphanumeric()));
        }
    }

    for token in navix::text::split_words(data) {
        assert!(!token.text.is_empty());
        assert!(data[token.position as usize..].starts_with(&token.text));
    }
});
