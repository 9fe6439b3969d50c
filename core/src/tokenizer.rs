use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::Spanish);
}

/// Tokenize text into normalized terms: NFKC normalization, lowercase, then every
/// maximal alphanumeric run in order. Token `i` of the output sits at position `i + 1`.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized).map(|m| m.as_str().to_string()).collect()
}

/// Normalized tokens of the raw `text` paired with the byte offset each one starts at.
pub fn token_offsets(text: &str) -> impl Iterator<Item = (usize, String)> + '_ {
    RE.find_iter(text).map(|m| (m.start(), m.as_str().nfkc().collect::<String>().to_lowercase()))
}

/// Normalize a value that is indexed whole (e.g. a date) instead of tokenized.
pub fn normalize_keyword(text: &str) -> String {
    text.trim().nfkc().collect::<String>().to_lowercase()
}

/// Stem of an already normalized term.
pub fn stem(term: &str) -> String {
    STEMMER.stem(term).into_owned()
}
