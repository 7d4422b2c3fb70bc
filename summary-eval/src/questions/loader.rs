//! Question bank loading from JSON files
//!
//! A bank is a JSON object mapping category name to a list of questions:
//!
//! ```json
//! {
//!   "geography": [
//!     {"id": "geo-1", "question": "Capital of France?", "expected_answer": "Paris",
//!      "scoring_criteria": "Names the city", "difficulty": "easy"}
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;

use super::QuestionItem;

/// Error type for question bank loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Duplicate question id: {0}")]
    DuplicateId(String),

    #[error("Question {0} has an empty question text")]
    EmptyQuestion(String),
}

/// Questions grouped by category, in file order
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    categories: IndexMap<String, Vec<QuestionItem>>,
}

impl QuestionBank {
    /// Parse a bank from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self, LoadError> {
        let raw: IndexMap<String, Vec<QuestionItem>> = serde_json::from_str(content)
            .map_err(|e| LoadError::Parse(format!("JSON parse error: {}", e)))?;

        let mut seen = HashSet::new();
        let mut categories = IndexMap::with_capacity(raw.len());

        for (category, mut questions) in raw {
            for question in &mut questions {
                if question.category.is_empty() {
                    question.category = category.clone();
                }
                if question.question.trim().is_empty() {
                    return Err(LoadError::EmptyQuestion(question.id.clone()));
                }
                if !seen.insert(question.id.clone()) {
                    return Err(LoadError::DuplicateId(question.id.clone()));
                }
            }
            categories.insert(category, questions);
        }

        Ok(Self { categories })
    }

    /// Category names in file order
    pub fn categories(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    /// Questions listed under a category
    pub fn questions_in(&self, category: &str) -> &[QuestionItem] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All questions, optionally restricted to the given categories
    /// (case-insensitive). Bank order is preserved.
    pub fn select(&self, categories: Option<&[String]>) -> Vec<QuestionItem> {
        self.categories
            .iter()
            .filter(|(name, _)| match categories {
                Some(wanted) => wanted.iter().any(|w| w.eq_ignore_ascii_case(name)),
                None => true,
            })
            .flat_map(|(_, questions)| questions.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load a question bank from a JSON file
pub fn load_question_bank(path: impl AsRef<Path>) -> Result<QuestionBank, LoadError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    QuestionBank::from_json_str(&content)
}
