//! Aggregate statistics per category, model and temperature

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::runner::EvaluationRecord;

/// Statistics over a set of invocations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub invocations: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub avg_word_ratio: Option<f64>,
    pub avg_char_ratio: Option<f64>,
    pub avg_length_ratio: Option<f64>,
    pub exact_matches: usize,
    /// Invocations with a parsed judge score
    pub judged: usize,
    pub avg_judge_score: Option<f64>,
    pub min_judge_score: Option<f64>,
    pub max_judge_score: Option<f64>,
    pub avg_latency_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureStats {
    pub temperature: f32,
    #[serde(flatten)]
    pub stats: Stats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTotals {
    pub model: String,
    #[serde(flatten)]
    pub stats: Stats,
}

/// Run-level statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_questions: usize,
    pub total_invocations: usize,
    pub failed_invocations: usize,
    /// Per model across every question, in first-seen order
    pub models: Vec<ModelTotals>,
    /// category -> model -> per-temperature statistics
    pub categories: IndexMap<String, IndexMap<String, Vec<TemperatureStats>>>,
}

#[derive(Default)]
struct Accumulator {
    invocations: usize,
    successes: usize,
    word: Vec<f64>,
    chars: Vec<f64>,
    length: Vec<f64>,
    exact_matches: usize,
    judge: Vec<f64>,
    latency: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

impl Accumulator {
    fn finish(&self) -> Stats {
        let success_rate = if self.invocations == 0 {
            0.0
        } else {
            self.successes as f64 / self.invocations as f64
        };
        Stats {
            invocations: self.invocations,
            successes: self.successes,
            success_rate,
            avg_word_ratio: mean(&self.word),
            avg_char_ratio: mean(&self.chars),
            avg_length_ratio: mean(&self.length),
            exact_matches: self.exact_matches,
            judged: self.judge.len(),
            avg_judge_score: mean(&self.judge),
            min_judge_score: self.judge.iter().copied().reduce(f64::min),
            max_judge_score: self.judge.iter().copied().reduce(f64::max),
            avg_latency_ms: mean(&self.latency),
        }
    }
}

impl RunSummary {
    /// Aggregate records. Failed invocations count toward totals but carry no
    /// scores.
    pub fn from_records(records: &[EvaluationRecord]) -> Self {
        let mut by_model: IndexMap<String, Accumulator> = IndexMap::new();
        let mut by_category: IndexMap<String, IndexMap<String, Vec<(f32, Accumulator)>>> =
            IndexMap::new();
        let mut total_invocations = 0;
        let mut failed_invocations = 0;

        for record in records {
            for result in &record.invocations {
                total_invocations += 1;

                let temps = by_category
                    .entry(record.question.category.clone())
                    .or_default()
                    .entry(result.model.clone())
                    .or_default();
                let index = match temps.iter().position(|(t, _)| *t == result.temperature) {
                    Some(index) => index,
                    None => {
                        temps.push((result.temperature, Accumulator::default()));
                        temps.len() - 1
                    }
                };
                let model_acc = by_model.entry(result.model.clone()).or_default();

                for acc in [&mut temps[index].1, model_acc] {
                    acc.invocations += 1;
                    if !result.is_success() {
                        continue;
                    }
                    acc.successes += 1;
                    acc.latency.push(result.latency_ms as f64);
                    if let Some(score) = record.score_for(&result.slot()) {
                        acc.word.push(score.word_ratio);
                        acc.chars.push(score.char_ratio);
                        acc.length.push(score.length_ratio);
                        if score.exact_match {
                            acc.exact_matches += 1;
                        }
                        if let Some(judge) = score.judge_score {
                            acc.judge.push(judge);
                        }
                    }
                }

                if !result.is_success() {
                    failed_invocations += 1;
                }
            }
        }

        let models = by_model
            .into_iter()
            .map(|(model, acc)| ModelTotals {
                model,
                stats: acc.finish(),
            })
            .collect();

        let categories = by_category
            .into_iter()
            .map(|(category, models)| {
                let models = models
                    .into_iter()
                    .map(|(model, temps)| {
                        let temps = temps
                            .into_iter()
                            .map(|(temperature, acc)| TemperatureStats {
                                temperature,
                                stats: acc.finish(),
                            })
                            .collect();
                        (model, temps)
                    })
                    .collect();
                (category, models)
            })
            .collect();

        Self {
            total_questions: records.len(),
            total_invocations,
            failed_invocations,
            models,
            categories,
        }
    }

    pub fn model(&self, id: &str) -> Option<&Stats> {
        self.models.iter().find(|m| m.model == id).map(|m| &m.stats)
    }

    pub fn temperature_stats(&self, category: &str, model: &str, temperature: f32) -> Option<&Stats> {
        self.categories
            .get(category)?
            .get(model)?
            .iter()
            .find(|t| t.temperature == temperature)
            .map(|t| &t.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::similarity;
    use crate::providers::CompletionResponse;
    use crate::questions::{InvocationResult, InvocationStatus, QuestionItem, SlotKey};
    use crate::runner::SlotScore;

    fn success(question: &str, slot: &SlotKey, text: &str, latency_ms: u64) -> InvocationResult {
        InvocationResult::success(
            question,
            slot,
            CompletionResponse {
                content: text.to_string(),
                model: slot.model.clone(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: "stop".to_string(),
                latency_ms,
            },
            1,
        )
    }

    fn record() -> EvaluationRecord {
        let question = QuestionItem::new("geo-1", "Capital of France?", "Paris").with_category("geography");
        let mut record = EvaluationRecord::new(question);

        let a = SlotKey::new("m1", 0.0, 0);
        let b = SlotKey::new("m1", 0.0, 1);
        let c = SlotKey::new("m1", 0.8, 0);
        record.invocations.push(success("geo-1", &a, "Paris", 100));
        record.invocations.push(success("geo-1", &b, "Lyon", 300));
        record.invocations.push(InvocationResult::failure(
            "geo-1",
            &c,
            InvocationStatus::Timeout,
            "Timeout after 10ms",
            10,
            3,
        ));
        record.scores.push(SlotScore {
            slot: a,
            score: similarity::score("Paris", "Paris").with_judge(Some(1.0), "exact"),
        });
        record.scores.push(SlotScore {
            slot: b,
            score: similarity::score("Lyon", "Paris").with_judge(Some(0.2), "wrong city"),
        });
        record
    }

    #[test]
    fn test_summary_groups_by_category_model_temperature() {
        let summary = RunSummary::from_records(&[record()]);
        assert_eq!(summary.total_questions, 1);
        assert_eq!(summary.total_invocations, 3);
        assert_eq!(summary.failed_invocations, 1);

        let cold = summary.temperature_stats("geography", "m1", 0.0).unwrap();
        assert_eq!(cold.invocations, 2);
        assert_eq!(cold.successes, 2);
        assert_eq!(cold.exact_matches, 1);
        assert_eq!(cold.judged, 2);
        assert_eq!(cold.min_judge_score, Some(0.2));
        assert_eq!(cold.max_judge_score, Some(1.0));
        assert!((cold.avg_judge_score.unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(cold.avg_latency_ms, Some(200.0));

        let warm = summary.temperature_stats("geography", "m1", 0.8).unwrap();
        assert_eq!(warm.successes, 0);
        assert_eq!(warm.success_rate, 0.0);
        assert!(warm.avg_word_ratio.is_none());
    }

    #[test]
    fn test_model_totals() {
        let summary = RunSummary::from_records(&[record()]);
        let totals = summary.model("m1").unwrap();
        assert_eq!(totals.invocations, 3);
        assert!((totals.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(summary.model("missing").is_none());
    }

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::from_records(&[]);
        assert_eq!(summary.total_invocations, 0);
        assert!(summary.models.is_empty());
        assert!(summary.categories.is_empty());
    }
}
