//! Per-question evaluation records

use serde::{Deserialize, Serialize};

use crate::analysis::{HighlightedSet, ScoreResult};
use crate::questions::{InvocationResult, QuestionItem, SlotKey};

/// Scores for one successful invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotScore {
    #[serde(flatten)]
    pub slot: SlotKey,
    #[serde(flatten)]
    pub score: ScoreResult,
}

/// Highlighting for one comparison group within a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightGroup {
    /// Model id for per-model groups, `all` for the whole question
    pub key: String,
    /// Slot label to words unique within the group
    pub unique_words: HighlightedSet,
}

/// A question with everything produced for it during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: QuestionItem,
    /// One per (model, temperature, repetition), in configuration order
    pub invocations: Vec<InvocationResult>,
    /// Successful invocations only
    #[serde(default)]
    pub scores: Vec<SlotScore>,
    #[serde(default)]
    pub highlights: Vec<HighlightGroup>,
}

impl EvaluationRecord {
    pub fn new(question: QuestionItem) -> Self {
        Self {
            question,
            invocations: Vec::new(),
            scores: Vec::new(),
            highlights: Vec::new(),
        }
    }

    pub fn successful(&self) -> impl Iterator<Item = &InvocationResult> {
        self.invocations.iter().filter(|r| r.is_success())
    }

    pub fn failure_count(&self) -> usize {
        self.invocations.iter().filter(|r| !r.is_success()).count()
    }

    /// Invocations for a (model, temperature) pair, in repetition order
    pub fn invocations_for<'a>(
        &'a self,
        model: &'a str,
        temperature: f32,
    ) -> impl Iterator<Item = &'a InvocationResult> + 'a {
        self.invocations
            .iter()
            .filter(move |r| r.model == model && r.temperature == temperature)
    }

    pub fn score_for(&self, slot: &SlotKey) -> Option<&ScoreResult> {
        self.scores
            .iter()
            .find(|s| &s.slot == slot)
            .map(|s| &s.score)
    }

    pub fn highlight_group(&self, key: &str) -> Option<&HighlightedSet> {
        self.highlights
            .iter()
            .find(|g| g.key == key)
            .map(|g| &g.unique_words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::similarity;
    use crate::providers::CompletionResponse;
    use crate::questions::InvocationStatus;

    fn ok(slot: &SlotKey, text: &str) -> InvocationResult {
        InvocationResult::success(
            "Q-1",
            slot,
            CompletionResponse {
                content: text.to_string(),
                model: slot.model.clone(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: "stop".to_string(),
                latency_ms: 5,
            },
            1,
        )
    }

    #[test]
    fn test_record_lookups() {
        let mut record = EvaluationRecord::new(QuestionItem::new("Q-1", "Capital?", "Paris"));
        let a = SlotKey::new("m1", 0.0, 0);
        let b = SlotKey::new("m1", 0.8, 0);
        let c = SlotKey::new("m2", 0.0, 0);

        record.invocations.push(ok(&a, "Paris"));
        record.invocations.push(ok(&b, "Lyon"));
        record.invocations.push(InvocationResult::failure(
            "Q-1",
            &c,
            InvocationStatus::Error,
            "boom",
            3,
            1,
        ));
        record.scores.push(SlotScore {
            slot: a.clone(),
            score: similarity::score("Paris", "Paris"),
        });

        assert_eq!(record.successful().count(), 2);
        assert_eq!(record.failure_count(), 1);
        assert_eq!(record.invocations_for("m1", 0.8).count(), 1);
        assert!(record.score_for(&a).map(|s| s.exact_match).unwrap_or(false));
        assert!(record.score_for(&c).is_none());
    }

    #[test]
    fn test_slot_score_serializes_flat() {
        let entry = SlotScore {
            slot: SlotKey::new("m1", 0.0, 2),
            score: similarity::score("a", "a"),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["model"], "m1");
        assert_eq!(json["repetition"], 2);
        assert_eq!(json["word_ratio"], 1.0);
        assert!(json.get("judge_score").is_none());
    }
}
