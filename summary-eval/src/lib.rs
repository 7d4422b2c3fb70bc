//! Output differencing and scoring for LLM evaluations
//!
//! Runs a question bank (or a piece of content) through several local and
//! hosted models at several temperatures, then compares what came back.
//!
//! # Features
//!
//! - OpenAI-compatible hosted models and local Ollama models
//! - Repetition policy per model class (hosted once, local three times)
//! - Word overlap and character sequence similarity against expected answers
//! - Optional judge model scoring with best-effort verdict parsing
//! - Token-level highlighting of words unique to each output
//! - JSON report, summary statistics and console tables
//!
//! # Example
//!
//! ```no_run
//! use summary_eval::{
//!     config::Config,
//!     providers::create_providers_with_config,
//!     questions::QuestionItem,
//!     runner::{EvaluationRunner, ModelHandle, RunSettings},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let models = create_providers_with_config(&config)?
//!         .into_iter()
//!         .map(|(model, provider)| ModelHandle::new(model, provider))
//!         .collect();
//!
//!     let runner = EvaluationRunner::new(models, RunSettings::from_config(&config))?;
//!     let question = QuestionItem::new("geo-1", "What is the capital of France?", "Paris");
//!     let outcome = runner.run(&[question]).await?;
//!
//!     for result in &outcome.records[0].invocations {
//!         println!("{}: {}", result.label(), result.output);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod providers;
pub mod questions;
pub mod reporting;
pub mod runner;

pub use config::{Config, ConfigError, ModelClass};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{
        highlight, render_marked, score, HighlightedSet, Judge, JudgeVerdict, ScoreResult,
    };
    pub use crate::config::{Config, ConfigError, HighlightScope, ModelClass, ModelConfig};
    pub use crate::providers::{
        create_provider, create_providers_with_config, CompletionRequest, CompletionResponse,
        LLMProvider, Message, ProviderError, ProviderResult, SharedProvider,
    };
    pub use crate::questions::{
        load_question_bank, Difficulty, InvocationResult, InvocationStatus, QuestionBank,
        QuestionItem, SlotKey,
    };
    pub use crate::reporting::{print_console_report, EvaluationReport, JsonSummary, RunMode};
    pub use crate::runner::{
        EvaluationRecord, EvaluationRunner, ModelHandle, RunOutcome, RunSettings,
    };
}
