//! Token-level difference highlighting across a group of outputs
//!
//! Each text is split into words, whitespace and punctuation. Words are
//! compared case-insensitively with surrounding punctuation stripped; a word
//! is unique to a text when no other text in the group contains it. Timing
//! annotations such as `(Time: 1.23s)` are kept whole and never compared.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use super::similarity::normalize_token;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+|\w+[\w.]*|[^\w\s]").expect("token pattern is valid"))
}

fn timing_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(Time:[^)]*\)").expect("timing pattern is valid"))
}

/// A slice of the original text and, for words, its comparison form
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// `None` for whitespace, punctuation and timing annotations
    pub word: Option<String>,
}

/// Split text into tokens whose concatenation is the original text
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for timing in timing_regex().find_iter(text) {
        push_tokens(&text[cursor..timing.start()], &mut tokens);
        tokens.push(Token {
            text: timing.as_str(),
            word: None,
        });
        cursor = timing.end();
    }
    push_tokens(&text[cursor..], &mut tokens);

    tokens
}

fn push_tokens<'a>(segment: &'a str, tokens: &mut Vec<Token<'a>>) {
    // The pattern covers every character, so matches are contiguous
    for m in token_regex().find_iter(segment) {
        let word = Some(normalize_token(m.as_str())).filter(|w| !w.is_empty());
        tokens.push(Token {
            text: m.as_str(),
            word,
        });
    }
}

/// Normalized words of a text, timing annotations excluded
pub fn word_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().filter_map(|t| t.word).collect()
}

/// Label to the normalized words found only in that label's text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightedSet {
    unique: IndexMap<String, BTreeSet<String>>,
}

impl HighlightedSet {
    pub fn get(&self, label: &str) -> Option<&BTreeSet<String>> {
        self.unique.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.unique.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.unique.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.unique.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }

    /// True when no text in the group has a unique word
    pub fn has_no_differences(&self) -> bool {
        self.unique.values().all(BTreeSet::is_empty)
    }

    /// Render a label's text with its unique words marked
    pub fn render(&self, label: &str, text: &str) -> String {
        match self.get(label) {
            Some(unique) => render_marked(text, unique),
            None => text.to_string(),
        }
    }
}

/// Find the words unique to each text of a group.
///
/// Labels are expected to be distinct; a repeated label keeps the last text's
/// set. A group of one has nothing to differ from, so its set is empty.
pub fn highlight<L, T>(group: &[(L, T)]) -> HighlightedSet
where
    L: AsRef<str>,
    T: AsRef<str>,
{
    let word_sets: Vec<BTreeSet<String>> = group.iter().map(|(_, t)| word_set(t.as_ref())).collect();

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for words in &word_sets {
        for word in words {
            *occurrences.entry(word.as_str()).or_insert(0) += 1;
        }
    }

    let compare = group.len() > 1;
    let unique = group
        .iter()
        .zip(&word_sets)
        .map(|((label, _), words)| {
            let only_here = if compare {
                words
                    .iter()
                    .filter(|w| occurrences.get(w.as_str()) == Some(&1))
                    .cloned()
                    .collect()
            } else {
                BTreeSet::new()
            };
            (label.as_ref().to_string(), only_here)
        })
        .collect();

    HighlightedSet { unique }
}

/// Wrap every occurrence of the given words in `<mark>` tags, leaving the
/// rest of the text untouched
pub fn render_marked(text: &str, unique: &BTreeSet<String>) -> String {
    if unique.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + unique.len() * 13);
    for token in tokenize(text) {
        match &token.word {
            Some(word) if unique.contains(word) => {
                out.push_str("<mark>");
                out.push_str(token.text);
                out.push_str("</mark>");
            }
            _ => out.push_str(token.text),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tokenize_is_lossless() {
        let text = "Hello, world!  It's v1.2 (Time: 3.40s)\n";
        let joined: String = tokenize(text).iter().map(|t| t.text).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_tokenize_keeps_dotted_words() {
        let words: Vec<_> = tokenize("Version 1.2.3 of U.S. law.")
            .into_iter()
            .filter_map(|t| t.word)
            .collect();
        assert_eq!(words, vec!["version", "1.2.3", "of", "u.s", "law"]);
    }

    #[test]
    fn test_timing_annotation_is_not_a_word() {
        let words = word_set("Summary here (Time: 12.5s)");
        assert_eq!(words, set(&["summary", "here"]));
    }

    #[test]
    fn test_unique_words_per_text() {
        let result = highlight(&[("A", "the cat sat"), ("B", "the dog sat")]);
        assert_eq!(result.get("A"), Some(&set(&["cat"])));
        assert_eq!(result.get("B"), Some(&set(&["dog"])));
    }

    #[test]
    fn test_single_text_has_no_differences() {
        let result = highlight(&[("only", "nothing to compare against")]);
        assert_eq!(result.len(), 1);
        assert!(result.has_no_differences());
    }

    #[test]
    fn test_identical_texts_ignore_case() {
        let result = highlight(&[("A", "The Cat sat."), ("B", "the cat SAT"), ("C", "THE CAT SAT!")]);
        assert!(result.has_no_differences());
    }

    #[test]
    fn test_word_shared_by_two_of_three_is_not_unique() {
        let result = highlight(&[
            ("A", "red apple"),
            ("B", "red pear"),
            ("C", "green pear"),
        ]);
        assert_eq!(result.get("A"), Some(&set(&["apple"])));
        assert!(result.get("B").map(BTreeSet::is_empty).unwrap_or(false));
        assert_eq!(result.get("C"), Some(&set(&["green"])));
    }

    #[test]
    fn test_labels_keep_group_order() {
        let result = highlight(&[("z", "a"), ("a", "b"), ("m", "c")]);
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_render_marks_original_casing() {
        let result = highlight(&[("A", "The Cat sat. (Time: 1.0s)"), ("B", "the dog sat (Time: 2.0s)")]);
        assert_eq!(
            result.render("A", "The Cat sat. (Time: 1.0s)"),
            "The <mark>Cat</mark> sat. (Time: 1.0s)"
        );
        assert_eq!(result.render("missing", "untouched"), "untouched");
    }

    #[test]
    fn test_render_marked_without_words_is_identity() {
        assert_eq!(render_marked("a b c", &BTreeSet::new()), "a b c");
    }
}
