//! Evaluation execution engine

pub mod executor;
pub mod rate_limiter;
pub mod record;

pub use executor::{
    content_item, ConsoleProgress, EvaluationRunner, ModelHandle, NoOpProgress, ProgressCallback,
    RunOutcome, RunSettings, ALL_OUTPUTS_GROUP,
};
pub use rate_limiter::RateLimiter;
pub use record::{EvaluationRecord, HighlightGroup, SlotScore};
