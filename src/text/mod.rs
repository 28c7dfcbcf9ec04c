//! Pure text operations: normalization, trigram extraction, word
//! tokenization and candidate scoring. Everything here is stateless; the
//! case-sensitivity flag threads through from the index configuration.

pub mod normalize;
pub mod score;
pub mod tokenizer;
pub mod trigram;

pub use normalize::normalize;
pub use score::{abbrev_matches, score};
pub use tokenizer::{split_words, WordToken};
pub use trigram::{query_trigrams, trigrams, Gram};
