//! Question bank items and per-invocation results

pub mod difficulty;
pub mod loader;

pub use difficulty::Difficulty;
pub use loader::{load_question_bank, LoadError, QuestionBank};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::CompletionResponse;

/// A question with its reference answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionItem {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub expected_answer: String,
    /// Filled from the bank key when absent
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_scoring_criteria")]
    pub scoring_criteria: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

fn default_scoring_criteria() -> String {
    "General accuracy and relevance".to_string()
}

impl QuestionItem {
    pub fn new(
        id: impl Into<String>,
        question: impl Into<String>,
        expected_answer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            expected_answer: expected_answer.into(),
            category: "general".to_string(),
            scoring_criteria: default_scoring_criteria(),
            difficulty: Difficulty::default(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.scoring_criteria = criteria.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }
}

/// Identifies one invocation within a question: (model, temperature, repetition)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotKey {
    pub model: String,
    pub temperature: f32,
    /// Zero-based
    pub repetition: u32,
}

impl SlotKey {
    pub fn new(model: impl Into<String>, temperature: f32, repetition: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            repetition,
        }
    }

    /// Display label, e.g. `llama3.2 t=0.8 run 2`
    pub fn label(&self) -> String {
        format!("{} t={} run {}", self.model, self.temperature, self.repetition + 1)
    }
}

/// Status of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Success,
    Error,
    Timeout,
    RateLimited,
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Outcome of one model call. Never mutated once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub question_id: String,
    pub model: String,
    pub temperature: f32,
    pub repetition: u32,
    pub status: InvocationStatus,
    /// Empty for failed invocations
    pub output: String,
    pub latency_ms: u64,
    pub attempts: u32,
    pub usage: Option<TokenUsage>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InvocationResult {
    /// Create a successful result
    pub fn success(
        question_id: impl Into<String>,
        slot: &SlotKey,
        response: CompletionResponse,
        attempts: u32,
    ) -> Self {
        let usage = match (response.input_tokens, response.output_tokens) {
            (0, 0) => None,
            (input_tokens, output_tokens) => Some(TokenUsage {
                input_tokens,
                output_tokens,
            }),
        };
        Self {
            question_id: question_id.into(),
            model: slot.model.clone(),
            temperature: slot.temperature,
            repetition: slot.repetition,
            status: InvocationStatus::Success,
            output: response.content,
            latency_ms: response.latency_ms,
            attempts,
            usage,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a failure result
    pub fn failure(
        question_id: impl Into<String>,
        slot: &SlotKey,
        status: InvocationStatus,
        error: impl Into<String>,
        latency_ms: u64,
        attempts: u32,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            model: slot.model.clone(),
            temperature: slot.temperature,
            repetition: slot.repetition,
            status,
            output: String::new(),
            latency_ms,
            attempts,
            usage: None,
            error_message: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }

    pub fn slot(&self) -> SlotKey {
        SlotKey::new(&self.model, self.temperature, self.repetition)
    }

    pub fn label(&self) -> String {
        self.slot().label()
    }
}
