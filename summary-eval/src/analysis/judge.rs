//! Judge model adapter: asks a model to grade a candidate answer and parses
//! its verdict.
//!
//! The judge is prompted for two lines:
//!
//! ```text
//! Score: 0.85
//! Reasoning: Names the right city but adds an incorrect date.
//! ```
//!
//! Whole-number percentages (`Score: 85`) and explicit scales
//! (`Score: 85/100`, `8/10`) are normalized to 0-1. A bare fraction above 1 (`Score: 1.5`) fits
//! no scale. Anything else leaves the score absent and keeps the raw reply as
//! the rationale.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::JudgeConfig;
use crate::providers::{CompletionRequest, Message, SharedProvider};

const JUDGE_SYSTEM_PROMPT: &str =
    "You are an expert evaluator. Provide objective, consistent scoring.";

/// Parsed judge reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Normalized to 0.0 - 1.0
    pub score: Option<f64>,
    pub rationale: String,
}

impl JudgeVerdict {
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            score: None,
            rationale: format!("Judge error: {}", error),
        }
    }
}

fn score_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[\s*#_-]*score[\s*_]*[:=]\s*\**\s*(\d+(?:\.\d+)?|\.\d+)\s*(?:/\s*(\d+(?:\.\d+)?))?")
            .expect("score pattern is valid")
    })
}

fn reasoning_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?ims)^[\s*#_-]*reasoning[\s*_]*:\s*\**\s*(.+)").expect("reasoning pattern is valid")
    })
}

/// Bring a raw score onto 0-1, rejecting values that fit no known scale.
/// Without an explicit scale only whole numbers above 1 read as percentages.
fn normalize_score(value: f64, scale: Option<f64>) -> Option<f64> {
    let normalized = match scale {
        Some(scale) if scale > 0.0 => value / scale,
        Some(_) => return None,
        None if value <= 1.0 => value,
        None if value <= 100.0 && value.fract() == 0.0 => value / 100.0,
        None => return None,
    };
    (0.0..=1.0).contains(&normalized).then_some(normalized)
}

/// Parse a judge reply. Never fails: an unreadable reply yields no score
/// and the raw text as rationale.
pub fn parse_verdict(raw: &str) -> JudgeVerdict {
    let score = score_regex().captures(raw).and_then(|caps| {
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let scale = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<f64>().ok()?),
            None => None,
        };
        normalize_score(value, scale)
    });

    if score.is_none() {
        tracing::warn!("Could not parse judge score from reply: {:.80}", raw.trim());
        return JudgeVerdict {
            score: None,
            rationale: raw.to_string(),
        };
    }

    let rationale = reasoning_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| raw.trim().to_string());

    JudgeVerdict { score, rationale }
}

/// Build the grading prompt for one candidate
pub fn build_judge_prompt(question: &str, candidate: &str, expected: &str, criteria: &str) -> String {
    format!(
        "Evaluate the following AI response against the expected answer.\n\n\
         Question: {question}\n\
         Expected Answer: {expected}\n\
         AI Response: {candidate}\n\n\
         Scoring Criteria: {criteria}\n\n\
         Please provide:\n\
         1. A score between 0 and 1 (where 1 is a perfect match to the expected answer)\n\
         2. Brief reasoning for the score\n\n\
         Format your response as:\n\
         Score: [number]\n\
         Reasoning: [explanation]\n"
    )
}

/// Grades candidates with a judge model at a fixed temperature
pub struct Judge {
    provider: SharedProvider,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl Judge {
    pub fn new(provider: SharedProvider, config: &JudgeConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the judge model answers at all
    pub async fn is_available(&self) -> bool {
        matches!(self.provider.health_check().await, Ok(true))
    }

    /// Grade one candidate. Provider failures become a verdict without a score.
    pub async fn judge(
        &self,
        question: &str,
        candidate: &str,
        expected: &str,
        criteria: &str,
    ) -> JudgeVerdict {
        let prompt = build_judge_prompt(question, candidate, expected, criteria);
        let request = CompletionRequest::new(vec![Message::user(prompt)], self.max_tokens)
            .with_model(&self.model)
            .with_temperature(self.temperature)
            .with_system(JUDGE_SYSTEM_PROMPT);

        match tokio::time::timeout(self.timeout, self.provider.complete(&request)).await {
            Ok(Ok(response)) => parse_verdict(&response.content),
            Ok(Err(e)) => {
                tracing::warn!("Judge {} failed: {}", self.model, e);
                JudgeVerdict::failed(e)
            }
            Err(_) => {
                tracing::warn!("Judge {} timed out after {:?}", self.model, self.timeout);
                JudgeVerdict::failed(format!("timed out after {}ms", self.timeout.as_millis()))
            }
        }
    }
}
