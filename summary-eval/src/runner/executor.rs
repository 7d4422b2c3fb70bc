//! Evaluation runner: invokes every model at every temperature for each
//! question, then scores and highlights the outputs

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::record::{EvaluationRecord, HighlightGroup, SlotScore};
use crate::analysis::{highlight, similarity, Judge};
use crate::config::{
    duplicate_temperature, Config, ConfigError, HighlightScope, ModelClass, ModelConfig,
    RepetitionPolicy, RunnerConfig,
};
use crate::providers::{
    CompletionRequest, CompletionResponse, Message, ProviderError, SharedProvider,
};
use crate::questions::{InvocationResult, InvocationStatus, QuestionItem, SlotKey};

/// Group key used when every output of a question is compared together
pub const ALL_OUTPUTS_GROUP: &str = "all";

/// A configured model and the provider that serves it
#[derive(Clone)]
pub struct ModelHandle {
    pub config: ModelConfig,
    pub provider: SharedProvider,
}

impl ModelHandle {
    pub fn new(config: ModelConfig, provider: SharedProvider) -> Self {
        Self { config, provider }
    }
}

/// Settings that shape a run, taken from [`Config`]
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub temperatures: Vec<f32>,
    pub repetitions: RepetitionPolicy,
    pub system_prompt: String,
    pub highlight_scope: HighlightScope,
    pub runner: RunnerConfig,
}

impl RunSettings {
    /// Settings for question bank runs
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperatures: config.evaluation.temperatures.clone(),
            repetitions: config.evaluation.repetitions.clone(),
            system_prompt: config.evaluation.system_prompt.clone(),
            highlight_scope: config.evaluation.highlight_scope,
            runner: config.runner.clone(),
        }
    }

    /// Settings for content comparison runs
    pub fn for_content(config: &Config) -> Self {
        Self {
            system_prompt: config.evaluation.content_system_prompt.clone(),
            ..Self::from_config(config)
        }
    }
}

/// Records produced by a run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<EvaluationRecord>,
    /// Set when the run stopped before the last question
    pub cancelled: bool,
    /// Judge model used, if judging actually ran
    pub judge_model: Option<String>,
}

/// Build a comparison item from free-form content
pub fn content_item(id: impl Into<String>, instruction: &str, content: &str) -> QuestionItem {
    QuestionItem::new(id, format!("{}\n{}", instruction, content.trim()), "")
        .with_category("content")
}

/// Runs questions across models, temperatures and repetitions
pub struct EvaluationRunner {
    models: Vec<ModelHandle>,
    settings: RunSettings,
    judge: Option<Arc<Judge>>,
    scoring: bool,
    semaphore: Arc<Semaphore>,
    progress: Arc<dyn ProgressCallback>,
}

impl EvaluationRunner {
    /// Create a runner, rejecting settings that cannot produce any invocation
    pub fn new(models: Vec<ModelHandle>, settings: RunSettings) -> Result<Self, ConfigError> {
        if models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        if settings.temperatures.is_empty() {
            return Err(ConfigError::NoTemperatures);
        }
        if let Some(t) = duplicate_temperature(&settings.temperatures) {
            return Err(ConfigError::DuplicateTemperature(t));
        }
        if let Some((_, model)) = models
            .iter()
            .enumerate()
            .find(|(i, m)| models[..*i].iter().any(|o| o.config.id == m.config.id))
        {
            return Err(ConfigError::DuplicateModel(model.config.id.clone()));
        }
        if let Some(model) = models
            .iter()
            .find(|m| settings.repetitions.repetitions_for(&m.config) == 0)
        {
            return Err(ConfigError::ZeroRepetitions(model.config.id.clone()));
        }

        let semaphore = Arc::new(Semaphore::new(settings.runner.parallel_requests.max(1)));
        Ok(Self {
            models,
            settings,
            judge: None,
            scoring: true,
            semaphore,
            progress: Arc::new(NoOpProgress),
        })
    }

    /// Grade successful outputs with a judge model
    pub fn with_judge(mut self, judge: Judge) -> Self {
        self.judge = Some(Arc::new(judge));
        self
    }

    /// Disable similarity scoring and judging, keeping highlighting
    pub fn with_scoring(mut self, enabled: bool) -> Self {
        self.scoring = enabled;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn models(&self) -> &[ModelHandle] {
        &self.models
    }

    /// Invocation slots of one question, in configuration order
    pub fn slots(&self) -> Vec<(usize, SlotKey)> {
        let mut slots = Vec::new();
        for (index, model) in self.models.iter().enumerate() {
            let repetitions = self.settings.repetitions.repetitions_for(&model.config);
            for &temperature in &self.settings.temperatures {
                for repetition in 0..repetitions {
                    slots.push((index, SlotKey::new(&model.config.id, temperature, repetition)));
                }
            }
        }
        slots
    }

    /// Run every question to completion
    pub async fn run(&self, questions: &[QuestionItem]) -> Result<RunOutcome, ConfigError> {
        self.run_with_cancel(questions, CancellationToken::new()).await
    }

    /// Run questions until done or cancelled. Cancellation is observed between
    /// questions; records of finished questions are kept.
    pub async fn run_with_cancel(
        &self,
        questions: &[QuestionItem],
        cancel: CancellationToken,
    ) -> Result<RunOutcome, ConfigError> {
        if questions.is_empty() {
            return Err(ConfigError::NoQuestions);
        }

        self.warm_up_local_models().await;
        let judge = self.available_judge().await;

        let mut records = Vec::with_capacity(questions.len());
        let mut cancelled = false;

        for (index, question) in questions.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "Run cancelled after {} of {} questions",
                    index,
                    questions.len()
                );
                cancelled = true;
                break;
            }

            tracing::info!("Question {} ({}/{})", question.id, index + 1, questions.len());
            let record = self.evaluate_question(question, judge.as_deref()).await;
            records.push(record);
            self.progress.on_question_complete(index + 1, questions.len());
        }

        Ok(RunOutcome {
            records,
            cancelled,
            judge_model: judge.map(|j| j.model().to_string()),
        })
    }

    async fn warm_up_local_models(&self) {
        for model in self.models.iter().filter(|m| m.config.class == ModelClass::Local) {
            tracing::info!("Warming up {}", model.config.id);
            if let Err(e) = model.provider.warm_up().await {
                tracing::warn!("Warm-up failed for {}: {}", model.config.id, e);
            }
        }
    }

    /// The judge, unless scoring is off or the judge model does not answer
    async fn available_judge(&self) -> Option<Arc<Judge>> {
        if !self.scoring {
            return None;
        }
        let judge = self.judge.as_ref()?;
        if judge.is_available().await {
            Some(Arc::clone(judge))
        } else {
            tracing::warn!(
                "Judge model {} is not available, continuing without judge scores",
                judge.model()
            );
            None
        }
    }

    /// Invoke, score and highlight one question
    pub async fn evaluate_question(
        &self,
        question: &QuestionItem,
        judge: Option<&Judge>,
    ) -> EvaluationRecord {
        let mut record = EvaluationRecord::new(question.clone());
        record.invocations = self.invoke_all(question).await;

        if self.scoring {
            record.scores = self.score_outputs(&record, judge).await;
        }
        record.highlights = self.highlight_outputs(&record);

        let failures = record.failure_count();
        if failures > 0 {
            tracing::warn!(
                "{}: {} of {} invocations failed",
                question.id,
                failures,
                record.invocations.len()
            );
        }
        record
    }

    async fn invoke_all(&self, question: &QuestionItem) -> Vec<InvocationResult> {
        let slots = self.slots();

        if self.settings.runner.parallel_requests <= 1 {
            let mut results = Vec::with_capacity(slots.len());
            for (index, slot) in slots {
                let job = self.job(question, index, slot);
                results.push(self.run_job(job).await);
            }
            return results;
        }

        let mut handles = Vec::with_capacity(slots.len());
        for (index, slot) in slots {
            let job = self.job(question, index, slot.clone());
            let semaphore = Arc::clone(&self.semaphore);
            let progress = Arc::clone(&self.progress);
            let runner = self.settings.runner.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                execute_job(job, &runner, progress.as_ref()).await
            });
            handles.push((slot, handle));
        }

        // Awaiting in spawn order keeps slots in configuration order
        let mut results = Vec::with_capacity(handles.len());
        for (slot, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Invocation {} panicked: {}", slot.label(), e);
                    results.push(InvocationResult::failure(
                        &question.id,
                        &slot,
                        InvocationStatus::Error,
                        format!("invocation task failed: {}", e),
                        0,
                        0,
                    ));
                }
            }
        }
        results
    }

    fn job(&self, question: &QuestionItem, model_index: usize, slot: SlotKey) -> InvocationJob {
        let model = &self.models[model_index];
        let request = CompletionRequest::new(
            vec![Message::user(&question.question)],
            model.config.max_tokens,
        )
        .with_model(&model.config.id)
        .with_temperature(slot.temperature)
        .with_system(&self.settings.system_prompt);

        InvocationJob {
            question_id: question.id.clone(),
            slot,
            provider: Arc::clone(&model.provider),
            request,
        }
    }

    async fn run_job(&self, job: InvocationJob) -> InvocationResult {
        execute_job(job, &self.settings.runner, self.progress.as_ref()).await
    }

    async fn score_outputs(
        &self,
        record: &EvaluationRecord,
        judge: Option<&Judge>,
    ) -> Vec<SlotScore> {
        let question = &record.question;
        let mut scores = Vec::new();

        for result in record.successful() {
            let mut score = similarity::score(&result.output, &question.expected_answer);
            if let Some(judge) = judge {
                let verdict = judge
                    .judge(
                        &question.question,
                        &result.output,
                        &question.expected_answer,
                        &question.scoring_criteria,
                    )
                    .await;
                score = score.with_judge(verdict.score, verdict.rationale);
            }
            scores.push(SlotScore {
                slot: result.slot(),
                score,
            });
        }
        scores
    }

    fn highlight_outputs(&self, record: &EvaluationRecord) -> Vec<HighlightGroup> {
        match self.settings.highlight_scope {
            HighlightScope::PerModel => self
                .models
                .iter()
                .filter_map(|model| {
                    let group: Vec<(String, &str)> = record
                        .successful()
                        .filter(|r| r.model == model.config.id)
                        .map(|r| (r.label(), r.output.as_str()))
                        .collect();
                    (!group.is_empty()).then(|| HighlightGroup {
                        key: model.config.id.clone(),
                        unique_words: highlight(&group),
                    })
                })
                .collect(),
            HighlightScope::PerQuestion => {
                let group: Vec<(String, &str)> = record
                    .successful()
                    .map(|r| (r.label(), r.output.as_str()))
                    .collect();
                if group.is_empty() {
                    Vec::new()
                } else {
                    vec![HighlightGroup {
                        key: ALL_OUTPUTS_GROUP.to_string(),
                        unique_words: highlight(&group),
                    }]
                }
            }
        }
    }
}

/// Everything one spawned invocation needs
struct InvocationJob {
    question_id: String,
    slot: SlotKey,
    provider: SharedProvider,
    request: CompletionRequest,
}

/// Invoke with retries and exponential backoff. Never fails: errors become a
/// failed [`InvocationResult`].
async fn execute_job(
    job: InvocationJob,
    config: &RunnerConfig,
    progress: &dyn ProgressCallback,
) -> InvocationResult {
    let label = job.slot.label();
    progress.on_invocation_start(&job.question_id, &label);

    let started = Instant::now();
    let mut last_error = None;
    let mut attempts = 0;
    let mut delay = config.retry_delay_ms;

    for attempt in 0..=config.retry_count {
        if attempt > 0 {
            tracing::info!("Retry {} for {} on {}", attempt, job.question_id, label);
            sleep(Duration::from_millis(delay)).await;
            delay = next_delay(delay, config.max_retry_delay_ms);
        }
        attempts = attempt + 1;

        let attempt_started = Instant::now();
        match try_invoke(&job, config.timeout_ms).await {
            Ok(mut response) => {
                response.latency_ms = attempt_started.elapsed().as_millis() as u64;
                progress.on_invocation_complete(&job.question_id, &label, true);
                return InvocationResult::success(&job.question_id, &job.slot, response, attempts);
            }
            Err(ProviderError::RateLimited { retry_after_ms }) => {
                // No wait once the attempts are used up
                if attempt < config.retry_count {
                    tracing::warn!("Rate limited on {}, waiting {}ms", label, retry_after_ms);
                    sleep(Duration::from_millis(retry_after_ms)).await;
                }
                last_error = Some(ProviderError::RateLimited { retry_after_ms });
            }
            Err(e) if !e.is_retryable() => {
                tracing::error!("{} on {}: {}", job.question_id, label, e);
                last_error = Some(e);
                break;
            }
            Err(e) => {
                tracing::warn!("{} on {} (attempt {}): {}", job.question_id, label, attempts, e);
                last_error = Some(e);
            }
        }
    }

    let status = match &last_error {
        Some(ProviderError::Timeout { .. }) => InvocationStatus::Timeout,
        Some(ProviderError::RateLimited { .. }) => InvocationStatus::RateLimited,
        _ => InvocationStatus::Error,
    };
    let message = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());
    tracing::error!("{} on {} failed after {} attempts: {}", job.question_id, label, attempts, message);
    progress.on_invocation_complete(&job.question_id, &label, false);

    InvocationResult::failure(
        &job.question_id,
        &job.slot,
        status,
        message,
        started.elapsed().as_millis() as u64,
        attempts,
    )
}

/// Doubled backoff, capped
fn next_delay(delay: u64, max_delay: u64) -> u64 {
    delay.saturating_mul(2).min(max_delay)
}

/// Single attempt bounded by the configured timeout
async fn try_invoke(
    job: &InvocationJob,
    timeout_ms: u64,
) -> Result<CompletionResponse, ProviderError> {
    let timeout = Duration::from_millis(timeout_ms);
    match tokio::time::timeout(timeout, job.provider.complete(&job.request)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout { timeout_ms }),
    }
}

/// Progress callback for tracking a run
pub trait ProgressCallback: Send + Sync {
    fn on_invocation_start(&self, question_id: &str, slot: &str);
    fn on_invocation_complete(&self, question_id: &str, slot: &str, success: bool);
    fn on_question_complete(&self, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_invocation_start(&self, _question_id: &str, _slot: &str) {}
    fn on_invocation_complete(&self, _question_id: &str, _slot: &str, _success: bool) {}
    fn on_question_complete(&self, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_invocation_start(&self, _question_id: &str, _slot: &str) {}

    fn on_invocation_complete(&self, question_id: &str, slot: &str, success: bool) {
        let status = if success { "OK" } else { "FAILED" };
        println!("  {:<6} {} [{}]", status, question_id, slot);
    }

    fn on_question_complete(&self, completed: usize, total: usize) {
        println!("Progress: {}/{} questions complete", completed, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LLMProvider, ProviderResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times, then echoes the temperature
    struct FlakyProvider {
        failures_left: AtomicU32,
        error: fn() -> ProviderError,
        calls: AtomicU32,
    }

    impl FlakyProvider {
        fn new(failures: u32, error: fn() -> ProviderError) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicU32::new(failures),
                error,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn default_model(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err((self.error)());
            }
            Ok(CompletionResponse {
                content: format!("answer at {}", request.temperature.unwrap_or(0.0)),
                model: "flaky".to_string(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: "stop".to_string(),
                latency_ms: 0,
            })
        }

        async fn health_check(&self) -> ProviderResult<bool> {
            Ok(true)
        }
    }

    fn settings(parallel: usize) -> RunSettings {
        RunSettings {
            temperatures: vec![0.0, 0.8],
            repetitions: RepetitionPolicy { hosted: 1, local: 3 },
            system_prompt: "Be brief.".to_string(),
            highlight_scope: HighlightScope::PerModel,
            runner: RunnerConfig {
                parallel_requests: parallel,
                retry_count: 2,
                retry_delay_ms: 1,
                max_retry_delay_ms: 4,
                timeout_ms: 1_000,
            },
        }
    }

    fn handle(id: &str, class: ModelClass, provider: SharedProvider) -> ModelHandle {
        ModelHandle::new(ModelConfig::new(id, class), provider)
    }

    #[test]
    fn test_slots_follow_configuration_order() {
        let provider = FlakyProvider::new(0, || ProviderError::Parse("x".into()));
        let runner = EvaluationRunner::new(
            vec![
                handle("hosted", ModelClass::Hosted, provider.clone()),
                handle("local", ModelClass::Local, provider),
            ],
            settings(1),
        )
        .unwrap();

        let labels: Vec<String> = runner.slots().iter().map(|(_, s)| s.label()).collect();
        assert_eq!(
            labels,
            vec![
                "hosted t=0 run 1",
                "hosted t=0.8 run 1",
                "local t=0 run 1",
                "local t=0 run 2",
                "local t=0 run 3",
                "local t=0.8 run 1",
                "local t=0.8 run 2",
                "local t=0.8 run 3",
            ]
        );
    }

    #[test]
    fn test_new_rejects_empty_configuration() {
        assert!(matches!(
            EvaluationRunner::new(Vec::new(), settings(1)),
            Err(ConfigError::NoModels)
        ));

        let provider = FlakyProvider::new(0, || ProviderError::Parse("x".into()));
        let mut no_temps = settings(1);
        no_temps.temperatures.clear();
        assert!(matches!(
            EvaluationRunner::new(vec![handle("m", ModelClass::Hosted, provider.clone())], no_temps),
            Err(ConfigError::NoTemperatures)
        ));

        let zero = ModelHandle::new(
            ModelConfig::new("m", ModelClass::Local).with_repetitions(0),
            provider,
        );
        assert!(matches!(
            EvaluationRunner::new(vec![zero], settings(1)),
            Err(ConfigError::ZeroRepetitions(id)) if id == "m"
        ));
    }

    #[test]
    fn test_new_rejects_colliding_slots() {
        let provider = FlakyProvider::new(0, || ProviderError::Parse("x".into()));

        let mut repeated = settings(1);
        repeated.temperatures = vec![0.7, 0.0, 0.7];
        assert!(matches!(
            EvaluationRunner::new(vec![handle("m", ModelClass::Hosted, provider.clone())], repeated),
            Err(ConfigError::DuplicateTemperature(t)) if t == 0.7
        ));

        let twice = vec![
            handle("m", ModelClass::Hosted, provider.clone()),
            handle("m", ModelClass::Local, provider),
        ];
        assert!(matches!(
            EvaluationRunner::new(twice, settings(1)),
            Err(ConfigError::DuplicateModel(id)) if id == "m"
        ));
    }

    #[tokio::test]
    async fn test_empty_question_list_is_rejected() {
        let provider = FlakyProvider::new(0, || ProviderError::Parse("x".into()));
        let runner =
            EvaluationRunner::new(vec![handle("m", ModelClass::Hosted, provider)], settings(1)).unwrap();
        assert!(matches!(runner.run(&[]).await, Err(ConfigError::NoQuestions)));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let provider = FlakyProvider::new(2, || ProviderError::Api {
            status: 503,
            message: "busy".into(),
        });
        let mut s = settings(1);
        s.temperatures = vec![0.0];
        let runner =
            EvaluationRunner::new(vec![handle("m", ModelClass::Hosted, provider.clone())], s).unwrap();

        let outcome = runner
            .run(&[QuestionItem::new("Q-1", "Capital?", "Paris")])
            .await
            .unwrap();
        let result = &outcome.records[0].invocations[0];
        assert!(result.is_success());
        assert_eq!(result.attempts, 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_config_errors_are_not_retried() {
        let provider = FlakyProvider::new(10, || ProviderError::Config("bad key".into()));
        let mut s = settings(1);
        s.temperatures = vec![0.0];
        let runner =
            EvaluationRunner::new(vec![handle("m", ModelClass::Hosted, provider.clone())], s).unwrap();

        let outcome = runner
            .run(&[QuestionItem::new("Q-1", "Capital?", "Paris")])
            .await
            .unwrap();
        let result = &outcome.records[0].invocations[0];
        assert_eq!(result.status, InvocationStatus::Error);
        assert_eq!(result.attempts, 1);
        assert!(result.error_message.as_deref().unwrap_or("").contains("bad key"));
        assert!(outcome.records[0].scores.is_empty());
    }

    #[test]
    fn test_backoff_doubles_up_to_the_cap() {
        assert_eq!(next_delay(100, 1_000), 200);
        assert_eq!(next_delay(800, 1_000), 1_000);
        assert_eq!(next_delay(u64::MAX / 2 + 1, u64::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_rate_limit_on_last_attempt_fails_without_waiting() {
        let provider = FlakyProvider::new(10, || ProviderError::RateLimited {
            retry_after_ms: 60_000,
        });
        let mut s = settings(1);
        s.temperatures = vec![0.0];
        s.runner.retry_count = 0;
        let runner =
            EvaluationRunner::new(vec![handle("m", ModelClass::Hosted, provider.clone())], s).unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            runner.run(&[QuestionItem::new("Q-1", "Capital?", "Paris")]),
        )
        .await
        .expect("a spent rate limit is reported at once")
        .unwrap();

        let result = &outcome.records[0].invocations[0];
        assert_eq!(result.status, InvocationStatus::RateLimited);
        assert_eq!(result.attempts, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeouts_are_recorded() {
        struct Slow;

        #[async_trait]
        impl LLMProvider for Slow {
            fn name(&self) -> &str {
                "slow"
            }
            fn default_model(&self) -> &str {
                "slow"
            }
            async fn complete(&self, _: &CompletionRequest) -> ProviderResult<CompletionResponse> {
                sleep(Duration::from_secs(5)).await;
                Err(ProviderError::Parse("unreachable".into()))
            }
            async fn health_check(&self) -> ProviderResult<bool> {
                Ok(true)
            }
        }

        let mut s = settings(1);
        s.temperatures = vec![0.0];
        s.runner.retry_count = 0;
        s.runner.timeout_ms = 20;
        let runner =
            EvaluationRunner::new(vec![handle("slow", ModelClass::Hosted, Arc::new(Slow))], s).unwrap();

        let outcome = runner
            .run(&[QuestionItem::new("Q-1", "Capital?", "Paris")])
            .await
            .unwrap();
        assert_eq!(outcome.records[0].invocations[0].status, InvocationStatus::Timeout);
    }

    #[tokio::test]
    async fn test_cancelled_run_keeps_no_unstarted_questions() {
        let provider = FlakyProvider::new(0, || ProviderError::Parse("x".into()));
        let runner =
            EvaluationRunner::new(vec![handle("m", ModelClass::Hosted, provider)], settings(1)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = runner
            .run_with_cancel(&[QuestionItem::new("Q-1", "Capital?", "Paris")], cancel)
            .await
            .unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_comparison_runs_skip_scoring() {
        let provider = FlakyProvider::new(0, || ProviderError::Parse("x".into()));
        let runner = EvaluationRunner::new(vec![handle("m", ModelClass::Local, provider)], settings(1))
            .unwrap()
            .with_scoring(false);

        let item = content_item("article", "Summarize:", "  Some article text.  ");
        assert_eq!(item.question, "Summarize:\nSome article text.");

        let outcome = runner.run(&[item]).await.unwrap();
        let record = &outcome.records[0];
        assert_eq!(record.invocations.len(), 6);
        assert!(record.scores.is_empty());
        // Each output is repeated three times, so no run has a word of its own
        let group = record.highlight_group("m").unwrap();
        assert_eq!(group.len(), 6);
        assert!(group.has_no_differences());
        assert!(outcome.judge_model.is_none());
    }

    #[tokio::test]
    async fn test_per_question_scope_uses_single_group() {
        let provider = FlakyProvider::new(0, || ProviderError::Parse("x".into()));
        let mut s = settings(2);
        s.highlight_scope = HighlightScope::PerQuestion;
        let runner = EvaluationRunner::new(
            vec![
                handle("a", ModelClass::Hosted, provider.clone()),
                handle("b", ModelClass::Hosted, provider),
            ],
            s,
        )
        .unwrap();

        let outcome = runner
            .run(&[QuestionItem::new("Q-1", "Capital?", "Paris")])
            .await
            .unwrap();
        let record = &outcome.records[0];
        assert_eq!(record.highlights.len(), 1);
        assert_eq!(record.highlights[0].key, ALL_OUTPUTS_GROUP);
        assert_eq!(record.scores.len(), 4);
    }
}
