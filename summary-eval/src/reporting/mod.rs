//! Results reporting

pub mod report;
pub mod summary;

pub use report::{EvaluationReport, ReportError, RunMode};
pub use summary::{ModelTotals, RunSummary, Stats, TemperatureStats};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::render_marked;

/// JSON summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub run_id: String,
    pub timestamp: String,
    pub mode: RunMode,
    pub total_questions: usize,
    pub total_invocations: usize,
    pub failed_invocations: usize,
    pub cancelled: bool,
    pub judge_model: Option<String>,
    pub model_rankings: Vec<ModelRanking>,
    pub detailed_results_file: String,
}

/// Model ranking in summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRanking {
    pub model: String,
    pub success_rate: f64,
    pub avg_word_ratio: Option<f64>,
    pub avg_char_ratio: Option<f64>,
    pub avg_judge_score: Option<f64>,
}

/// Judge score when present, otherwise word overlap
fn ranking_key(ranking: &ModelRanking) -> f64 {
    ranking
        .avg_judge_score
        .or(ranking.avg_word_ratio)
        .unwrap_or(0.0)
}

impl JsonSummary {
    pub fn from_report(report: &EvaluationReport, detailed_file: impl Into<String>) -> Self {
        let mut rankings: Vec<ModelRanking> = report
            .summary
            .models
            .iter()
            .map(|m| ModelRanking {
                model: m.model.clone(),
                success_rate: m.stats.success_rate,
                avg_word_ratio: m.stats.avg_word_ratio,
                avg_char_ratio: m.stats.avg_char_ratio,
                avg_judge_score: m.stats.avg_judge_score,
            })
            .collect();

        rankings.sort_by(|a, b| {
            ranking_key(b)
                .partial_cmp(&ranking_key(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Self {
            run_id: report.run_id.clone(),
            timestamp: report.completed_at.to_rfc3339(),
            mode: report.mode,
            total_questions: report.summary.total_questions,
            total_invocations: report.summary.total_invocations,
            failed_invocations: report.summary.failed_invocations,
            cancelled: report.cancelled,
            judge_model: report.judge_model.clone(),
            model_rankings: rankings,
            detailed_results_file: detailed_file.into(),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "-".to_string())
}

/// Generate a console report of a scored run
pub fn print_console_report(report: &EvaluationReport) {
    let summary = &report.summary;

    println!("\n=== Evaluation Results ===\n");
    println!("Run: {}", report.run_id);
    println!(
        "Questions: {}  Invocations: {}  Failed: {}",
        summary.total_questions, summary.total_invocations, summary.failed_invocations
    );
    if let Some(judge) = &report.judge_model {
        println!("Judge: {}", judge);
    }
    if report.cancelled {
        println!("Run was cancelled; results are partial.");
    }

    println!("\nModels:");
    println!("{:-<78}", "");
    println!(
        "  {:<28} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "Model", "OK", "Word", "Char", "Judge", "Latency"
    );
    for totals in &summary.models {
        let stats = &totals.stats;
        println!(
            "  {:<28} {:>7.0}% {:>8} {:>8} {:>8} {:>8}ms",
            totals.model,
            stats.success_rate * 100.0,
            fmt_opt(stats.avg_word_ratio),
            fmt_opt(stats.avg_char_ratio),
            fmt_opt(stats.avg_judge_score),
            stats.avg_latency_ms.map(|l| l.round() as u64).unwrap_or(0),
        );
    }

    if !summary.categories.is_empty() {
        println!("\nBy Category:");
        println!("{:-<78}", "");

        for (category, models) in &summary.categories {
            println!("  {}:", category);
            for (model, temps) in models {
                for t in temps {
                    println!(
                        "    {:<24} t={:<4} judge avg {} (min {}, max {})  word {}",
                        model,
                        t.temperature,
                        fmt_opt(t.stats.avg_judge_score),
                        fmt_opt(t.stats.min_judge_score),
                        fmt_opt(t.stats.max_judge_score),
                        fmt_opt(t.stats.avg_word_ratio),
                    );
                }
            }
        }
    }

    println!("\n{:=<78}", "");
}

/// Print each output with the words unique to it marked
pub fn print_comparison(report: &EvaluationReport) {
    for record in &report.records {
        println!("\n=== {} ===", record.question.id);
        for group in &record.highlights {
            println!("\n[{}]", group.key);
            for result in record.successful() {
                let label = result.label();
                if let Some(unique) = group.unique_words.get(&label) {
                    println!(
                        "  {} ({}ms):\n    {}",
                        label,
                        result.latency_ms,
                        render_marked(result.output.trim(), unique)
                    );
                }
            }
        }
        for failed in record.invocations.iter().filter(|r| !r.is_success()) {
            println!(
                "  {} FAILED: {}",
                failed.label(),
                failed.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::similarity;
    use crate::providers::CompletionResponse;
    use crate::questions::{InvocationResult, QuestionItem, SlotKey};
    use crate::runner::{EvaluationRecord, RunOutcome, SlotScore};
    use chrono::Utc;

    fn report() -> EvaluationReport {
        let mut record = EvaluationRecord::new(QuestionItem::new("Q-1", "Capital?", "Paris"));
        for (model, text) in [("strong", "Paris"), ("weak", "Lyon")] {
            let slot = SlotKey::new(model, 0.0, 0);
            record.invocations.push(InvocationResult::success(
                "Q-1",
                &slot,
                CompletionResponse {
                    content: text.to_string(),
                    model: model.to_string(),
                    input_tokens: 0,
                    output_tokens: 0,
                    finish_reason: "stop".to_string(),
                    latency_ms: 1,
                },
                1,
            ));
            record.scores.push(SlotScore {
                slot,
                score: similarity::score(text, "Paris"),
            });
        }

        EvaluationReport::assemble(
            "run-1",
            RunMode::Evaluation,
            Utc::now(),
            Vec::new(),
            vec![0.0],
            RunOutcome {
                records: vec![record],
                cancelled: false,
                judge_model: None,
            },
        )
    }

    #[test]
    fn test_summary_ranks_models() {
        let summary = JsonSummary::from_report(&report(), "report.json");
        assert_eq!(summary.total_questions, 1);
        assert_eq!(summary.model_rankings[0].model, "strong");
        assert_eq!(summary.model_rankings[1].model, "weak");
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let report = report();

        let summary_path = dir.path().join("summary.json");
        JsonSummary::from_report(&report, "report.json")
            .write_to_file(&summary_path)
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(json["detailed_results_file"], "report.json");

        let files = report.write_responses(dir.path().join("responses")).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "Paris");
    }
}
