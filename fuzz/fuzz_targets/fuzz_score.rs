#![no_main]

use libfuzzer_sys::fuzz_target;
use navix::text::score::SCORE_EXACT;

fuzz_target!(|input: (&str, &str)| {
    let (query, name) = input;

    // The scoring ladder is total and bounded on arbitrary input.
    for case_sensitive in [false, true] {
        let s = navix::text::score(query, name, case_sensitive);
        assert!((0..=SCORE_EXACT).contains(&s));
    }

    // Folded equality is always the top rung.
    if !query.is_empty() && query.to_lowercase() == name.to_lowercase() {
        assert_eq!(navix::text::score(query, name, false), SCORE_EXACT);
    }

    let _ = navix::text::abbrev_matches(query, name);
});
