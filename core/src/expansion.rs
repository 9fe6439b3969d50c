//! Derived term-expansion structures, built once over the frozen dictionary.
//!
//! [`StemIndex`] groups terms into stem classes; [`PermutermIndex`] stores every rotation of
//! `term$` so a single-wildcard pattern becomes a prefix scan over an ordered map.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::QueryError;
use crate::index::{Dictionary, TermId};
use crate::tokenizer::stem;

/// Marks the end of a term inside a rotation key. The tokenizer never emits it.
pub const TERMINAL: char = '$';

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StemIndex {
    classes: HashMap<String, Vec<TermId>>,
}

impl StemIndex {
    pub fn build(dictionary: &Dictionary) -> Self {
        let stemmed: Vec<(String, TermId)> = dictionary
            .terms()
            .par_iter()
            .enumerate()
            .map(|(id, term)| (stem(term), id as TermId))
            .collect();

        let mut classes: HashMap<String, Vec<TermId>> = HashMap::new();
        // collected in term id order, so every class stays sorted
        for (s, id) in stemmed {
            classes.entry(s).or_default().push(id);
        }
        Self { classes }
    }

    /// Terms sharing the stem of `term`. `term` itself need not be indexed.
    pub fn class(&self, term: &str) -> &[TermId] {
        self.classes.get(&stem(term)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of stem classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardKind {
    /// `*`: zero or more characters.
    Many,
    /// `?`: exactly one character.
    One,
}

/// A literal pattern with exactly one wildcard, split around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    pub prefix: String,
    pub suffix: String,
    pub kind: WildcardKind,
}

impl WildcardPattern {
    pub fn contains_wildcard(s: &str) -> bool {
        s.contains(['*', '?'])
    }

    /// Split an already lowercased pattern. More than one wildcard character fails.
    pub fn parse(pattern: &str, offset: usize) -> Result<Self, QueryError> {
        let mut found = pattern.match_indices(['*', '?']);
        let (at, wc) = found
            .next()
            .ok_or_else(|| QueryError::parse(offset, format!("`{pattern}` has no wildcard")))?;
        if found.next().is_some() {
            return Err(QueryError::parse(
                offset,
                format!("`{pattern}` has more than one wildcard, only one `*` or `?` per term is supported"),
            ));
        }
        Ok(Self {
            prefix: pattern[..at].to_string(),
            suffix: pattern[at + 1..].to_string(),
            kind: if wc == "*" { WildcardKind::Many } else { WildcardKind::One },
        })
    }

    /// Rotation of `prefix*suffix$` that puts the wildcard last: `suffix$prefix`.
    pub fn rotation_key(&self) -> String {
        format!("{}{TERMINAL}{}", self.suffix, self.prefix)
    }

    pub fn matches(&self, term: &str) -> bool {
        if !term.starts_with(&self.prefix) || !term.ends_with(&self.suffix) {
            return false;
        }
        let fixed = self.prefix.chars().count() + self.suffix.chars().count();
        let len = term.chars().count();
        match self.kind {
            WildcardKind::Many => len >= fixed,
            WildcardKind::One => len == fixed + 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermutermIndex {
    // `$` occurs once per key, so a rotation identifies its term
    rotations: BTreeMap<String, TermId>,
}

impl PermutermIndex {
    pub fn build(dictionary: &Dictionary) -> Self {
        let rotations: Vec<(String, TermId)> = dictionary
            .terms()
            .par_iter()
            .enumerate()
            .flat_map_iter(|(id, term)| rotate_all(term).into_iter().map(move |r| (r, id as TermId)))
            .collect();
        Self { rotations: rotations.into_iter().collect() }
    }

    /// Distinct terms matching `pattern`, ascending by term id.
    ///
    /// `*` patterns are answered by the rotation prefix scan alone. `?` patterns reuse the scan to
    /// narrow candidates to the right prefix and suffix, then keep those of the exact length.
    pub fn lookup(&self, pattern: &WildcardPattern, dictionary: &Dictionary) -> Vec<TermId> {
        let key = pattern.rotation_key();
        let mut found: Vec<TermId> = self
            .rotations
            .range(key.clone()..)
            .take_while(|(k, _)| k.starts_with(&key))
            .map(|(_, &id)| id)
            .filter(|&id| pattern.kind == WildcardKind::Many || pattern.matches(dictionary.term(id)))
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Number of stored rotations.
    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }
}

/// The |term|+1 cyclic rotations of `term$`.
fn rotate_all(term: &str) -> Vec<String> {
    let chars: Vec<char> = term.chars().chain(std::iter::once(TERMINAL)).collect();
    (0..chars.len())
        .map(|i| chars[i..].iter().chain(&chars[..i]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BuildConfig, IndexBuilder, NewsItem};

    fn dictionary(text: &str) -> Dictionary {
        let mut b = IndexBuilder::new(BuildConfig::default());
        let doc = b.add_document("t");
        b.add_news(doc, &NewsItem { article: text.into(), ..Default::default() });
        b.finish().dictionary().clone()
    }

    fn names(dict: &Dictionary, ids: &[TermId]) -> Vec<String> {
        let mut v: Vec<String> = ids.iter().map(|&i| dict.term(i).to_string()).collect();
        v.sort();
        v
    }

    #[test]
    fn rotations_of_term() {
        assert_eq!(rotate_all("ab"), vec!["ab$", "b$a", "$ab"]);
        assert_eq!(rotate_all("ñu").len(), 3);
    }

    #[test]
    fn prefix_suffix_and_infix_wildcards() {
        let dict = dictionary("internet interior intento mercado");
        let pt = PermutermIndex::build(&dict);
        let lookup = |p: &str| names(&dict, &pt.lookup(&WildcardPattern::parse(p, 0).unwrap(), &dict));
        assert_eq!(lookup("inter*"), vec!["interior", "internet"]);
        assert_eq!(lookup("*do"), vec!["mercado"]);
        assert_eq!(lookup("in*o"), vec!["intento"]);
        assert_eq!(lookup("internet*"), vec!["internet"]);
        assert_eq!(lookup("*").len(), 4);
    }

    #[test]
    fn single_char_wildcard_is_length_constrained() {
        let dict = dictionary("casa cosa cesta caso");
        let pt = PermutermIndex::build(&dict);
        let lookup = |p: &str| names(&dict, &pt.lookup(&WildcardPattern::parse(p, 0).unwrap(), &dict));
        assert_eq!(lookup("c?sa"), vec!["casa", "cosa"]);
        assert_eq!(lookup("cas?"), vec!["casa", "caso"]);
        assert!(lookup("ces?").is_empty());
    }

    #[test]
    fn more_than_one_wildcard_fails() {
        assert!(WildcardPattern::parse("a*b*", 0).is_err());
        assert!(WildcardPattern::parse("a*b?", 0).is_err());
    }

    #[test]
    fn stem_class_groups_inflections() {
        let dict = dictionary("corriendo corrieron casa");
        let stems = StemIndex::build(&dict);
        assert_eq!(names(&dict, stems.class("corriendo")), vec!["corriendo", "corrieron"]);
        assert_eq!(names(&dict, stems.class("casa")), vec!["casa"]);
        assert_eq!(stems.len(), 2);
    }
}
