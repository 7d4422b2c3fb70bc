//! Full evaluation report written as `report.json`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::summary::RunSummary;
use crate::config::ModelConfig;
use crate::runner::{EvaluationRecord, RunOutcome};

/// Error type for report output
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What the run was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Question bank with scoring
    Evaluation,
    /// Content file, highlighting only
    Comparison,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub models: Vec<ModelConfig>,
    pub temperatures: Vec<f32>,
    pub judge_model: Option<String>,
    /// The run stopped before every question was evaluated
    pub cancelled: bool,
    pub records: Vec<EvaluationRecord>,
    pub summary: RunSummary,
}

impl EvaluationReport {
    /// Assemble a report from a finished (or cancelled) run
    pub fn assemble(
        run_id: impl Into<String>,
        mode: RunMode,
        started_at: DateTime<Utc>,
        models: Vec<ModelConfig>,
        temperatures: Vec<f32>,
        outcome: RunOutcome,
    ) -> Self {
        let summary = RunSummary::from_records(&outcome.records);
        Self {
            run_id: run_id.into(),
            mode,
            started_at,
            completed_at: Utc::now(),
            models,
            temperatures,
            judge_model: outcome.judge_model,
            cancelled: outcome.cancelled,
            records: outcome.records,
            summary,
        }
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write every successful output to `dir` as
    /// `{question}-{model}-t{temperature}-run{n}.txt`. Returns the files written.
    pub fn write_responses(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ReportError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for record in &self.records {
            for result in record.successful() {
                let filename = format!(
                    "{}-{}-t{}-run{}.txt",
                    sanitize(&record.question.id),
                    sanitize(&result.model),
                    result.temperature,
                    result.repetition + 1
                );
                let path = dir.join(filename);
                std::fs::write(&path, &result.output)?;
                written.push(path);
            }
        }
        Ok(written)
    }
}

/// Keep file names portable: model ids like `llama3.2:latest` or `org/model`
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("llama3.2:latest"), "llama3.2_latest");
        assert_eq!(sanitize("Org/Model"), "org_model");
    }

    #[test]
    fn test_empty_report_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let report = EvaluationReport::assemble(
            "20250101-000000",
            RunMode::Evaluation,
            Utc::now(),
            Vec::new(),
            vec![0.0],
            RunOutcome {
                records: Vec::new(),
                cancelled: true,
                judge_model: None,
            },
        );

        let path = dir.path().join("report.json");
        report.write_to_file(&path).unwrap();
        let loaded = EvaluationReport::read_from_file(&path).unwrap();
        assert_eq!(loaded.run_id, "20250101-000000");
        assert!(loaded.cancelled);
        assert_eq!(loaded.mode, RunMode::Evaluation);
        assert!(report.write_responses(dir.path().join("responses")).unwrap().is_empty());
    }
}
