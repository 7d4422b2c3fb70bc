//! Output analysis: similarity scoring, difference highlighting and judging

pub mod highlight;
pub mod judge;
pub mod similarity;

pub use highlight::{highlight, render_marked, tokenize, HighlightedSet, Token};
pub use judge::{build_judge_prompt, parse_verdict, Judge, JudgeVerdict};
pub use similarity::{char_ratio, normalize_words, score, word_ratio, ScoreResult};
