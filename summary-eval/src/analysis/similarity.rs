//! Similarity scoring of a candidate output against an expected answer

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Scores derived from one invocation output and the question's expected answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Jaccard overlap of normalized word sets (0.0 - 1.0)
    pub word_ratio: f64,
    /// `2 * LCS / (|a| + |b|)` over characters (0.0 - 1.0)
    pub char_ratio: f64,
    /// Shorter length over longer length, in characters (0.0 - 1.0)
    pub length_ratio: f64,
    /// Case-insensitive equality after trimming
    pub exact_match: bool,
    /// Judge score normalized to 0.0 - 1.0, absent when not judged or unparseable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_rationale: Option<String>,
}

impl ScoreResult {
    /// Attach the judge's verdict
    pub fn with_judge(mut self, score: Option<f64>, rationale: impl Into<String>) -> Self {
        self.judge_score = score;
        self.judge_rationale = Some(rationale.into());
        self
    }
}

/// Score a candidate against the expected answer. Pure and total.
pub fn score(candidate: &str, expected: &str) -> ScoreResult {
    ScoreResult {
        word_ratio: word_ratio(candidate, expected),
        char_ratio: char_ratio(candidate, expected),
        length_ratio: length_ratio(candidate, expected),
        exact_match: exact_match(candidate, expected),
        judge_score: None,
        judge_rationale: None,
    }
}

/// Lowercase a token and strip surrounding punctuation.
/// Returns an empty string for punctuation-only tokens.
pub fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_lowercase()
}

/// The set of normalized words in a text
pub fn normalize_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(normalize_token)
        .filter(|w| !w.is_empty())
        .collect()
}

/// Intersection over union of normalized word sets.
///
/// Empty inputs are decided on the raw text: both empty is a perfect match,
/// one empty is no match. Two non-empty texts with no words left after
/// normalization (punctuation only) also count as a match.
pub fn word_ratio(a: &str, b: &str) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let a = normalize_words(a);
    let b = normalize_words(b);

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let intersection = a.intersection(&b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Character sequence similarity, `2 * LCS / (|a| + |b|)`
pub fn char_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * lcs_len(&a, &b) as f64 / total as f64
}

/// Longest common subsequence length using a single rolling row
fn lcs_len(a: &[char], b: &[char]) -> usize {
    // Iterate over the longer sequence so the row is the shorter one
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }

    let mut row = vec![0usize; short.len() + 1];
    for &lc in long {
        let mut diagonal = 0;
        for (j, &sc) in short.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if lc == sc {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[short.len()]
}

/// Shorter over longer character count
pub fn length_ratio(a: &str, b: &str) -> f64 {
    let a = a.chars().count();
    let b = b.chars().count();
    match a.max(b) {
        0 => 1.0,
        longest => a.min(b) as f64 / longest as f64,
    }
}

pub fn exact_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_scores_one() {
        let text = "The Nile is the longest river.";
        let result = score(text, text);
        assert_eq!(result.word_ratio, 1.0);
        assert_eq!(result.char_ratio, 1.0);
        assert_eq!(result.length_ratio, 1.0);
        assert!(result.exact_match);
        assert!(result.judge_score.is_none());
    }

    #[test]
    fn test_empty_inputs() {
        let both = score("", "");
        assert_eq!(both.word_ratio, 1.0);
        assert_eq!(both.char_ratio, 1.0);

        let missing_expected = score("something", "");
        assert_eq!(missing_expected.word_ratio, 0.0);
        assert_eq!(missing_expected.char_ratio, 0.0);
        assert_eq!(missing_expected.length_ratio, 0.0);
    }

    #[test]
    fn test_word_ratio_ignores_case_and_punctuation() {
        assert!(word_ratio("The capital is paris.", "Paris") > 0.0);
        assert_eq!(word_ratio("Paris!", "paris"), 1.0);
        assert_eq!(word_ratio("red green", "blue yellow"), 0.0);
        // {the, cat, sat} vs {the, dog, sat}: 2 shared of 4
        assert!((word_ratio("the cat sat", "the dog sat") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_punctuation_only_text_normalizes_to_nothing() {
        assert!(normalize_words("... !!! ?").is_empty());
        assert_eq!(word_ratio("...", "!!"), 1.0);
    }

    #[test]
    fn test_wordless_candidate_against_empty_expected() {
        for candidate in ["!!!", "...", "  "] {
            assert_eq!(word_ratio(candidate, ""), 0.0, "candidate {:?}", candidate);
            assert_eq!(char_ratio(candidate, ""), 0.0, "candidate {:?}", candidate);
        }
        assert_eq!(word_ratio("", "?"), 0.0);
    }

    #[test]
    fn test_char_ratio_known_values() {
        // LCS("abcd", "abed") = "abd"
        assert!((char_ratio("abcd", "abed") - 0.75).abs() < 1e-9);
        assert_eq!(char_ratio("abc", "xyz"), 0.0);
        assert!((char_ratio("kitten", "sitting") - char_ratio("sitting", "kitten")).abs() < 1e-12);
    }

    #[test]
    fn test_char_ratio_handles_multibyte() {
        assert_eq!(char_ratio("café", "café"), 1.0);
        assert!((char_ratio("café", "cafe") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_length_ratio_and_exact_match() {
        assert!((length_ratio("ab", "abcd") - 0.5).abs() < 1e-9);
        assert!(exact_match("  Paris ", "paris"));
        assert!(!exact_match("Paris, France", "Paris"));
    }

    #[test]
    fn test_with_judge_keeps_analytical_scores() {
        let result = score("Paris", "Paris").with_judge(Some(0.9), "Correct city");
        assert_eq!(result.word_ratio, 1.0);
        assert_eq!(result.judge_score, Some(0.9));
        assert_eq!(result.judge_rationale.as_deref(), Some("Correct city"));
    }
}
