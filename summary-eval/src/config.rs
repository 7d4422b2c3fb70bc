//! Configuration management for summary-eval
//!
//! Loads model, evaluation and judge settings from TOML files and validates
//! them before any model is invoked.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Models under evaluation, in report order
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where a model runs. Drives both the provider used and the repetition policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    /// Remote API (OpenAI-compatible chat completions)
    Hosted,
    /// Local inference server (Ollama)
    Local,
}

impl ModelClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelClass::Hosted => "hosted",
            ModelClass::Local => "local",
        }
    }
}

impl std::fmt::Display for ModelClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Model-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    pub class: ModelClass,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Overrides the class repetition count for this model
    #[serde(default)]
    pub repetitions: Option<u32>,
}

impl ModelConfig {
    pub fn new(id: impl Into<String>, class: ModelClass) -> Self {
        Self {
            id: id.into(),
            display_name: String::new(),
            class,
            max_tokens: default_max_tokens(),
            repetitions: None,
        }
    }

    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = Some(repetitions);
        self
    }

    /// Name shown in reports
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }
}

/// Evaluation settings shared by every question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Sampling temperatures, each applied to every model
    #[serde(default = "default_temperatures")]
    pub temperatures: Vec<f32>,
    /// System prompt used for question bank runs
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// System prompt used for content comparison runs
    #[serde(default = "default_content_system_prompt")]
    pub content_system_prompt: String,
    /// Instruction prepended to content in comparison runs
    #[serde(default = "default_content_prompt")]
    pub content_prompt: String,
    #[serde(default = "default_question_bank")]
    pub question_bank: String,
    #[serde(default)]
    pub repetitions: RepetitionPolicy,
    #[serde(default)]
    pub highlight_scope: HighlightScope,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            temperatures: default_temperatures(),
            system_prompt: default_system_prompt(),
            content_system_prompt: default_content_system_prompt(),
            content_prompt: default_content_prompt(),
            question_bank: default_question_bank(),
            repetitions: RepetitionPolicy::default(),
            highlight_scope: HighlightScope::default(),
        }
    }
}

/// How many times each model runs per (question, temperature).
///
/// Hosted models are billed per call and mostly deterministic, so they run
/// once; local models run several times to expose run-to-run variation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepetitionPolicy {
    #[serde(default = "default_hosted_repetitions")]
    pub hosted: u32,
    #[serde(default = "default_local_repetitions")]
    pub local: u32,
}

impl RepetitionPolicy {
    pub fn repetitions_for(&self, model: &ModelConfig) -> u32 {
        model.repetitions.unwrap_or(match model.class {
            ModelClass::Hosted => self.hosted,
            ModelClass::Local => self.local,
        })
    }
}

impl Default for RepetitionPolicy {
    fn default() -> Self {
        Self {
            hosted: default_hosted_repetitions(),
            local: default_local_repetitions(),
        }
    }
}

/// Which outputs are compared against each other when highlighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightScope {
    /// A model's own runs across temperatures and repetitions
    #[default]
    PerModel,
    /// Every successful output for the question
    PerQuestion,
}

/// Judge model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_judge_model")]
    pub model: String,
    #[serde(default = "default_judge_class")]
    pub class: ModelClass,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_judge_max_tokens")]
    pub max_tokens: u32,
}

impl JudgeConfig {
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            id: self.model.clone(),
            display_name: String::new(),
            class: self.class,
            max_tokens: self.max_tokens,
            repetitions: Some(1),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_judge_model(),
            class: default_judge_class(),
            temperature: 0.0,
            max_tokens: default_judge_max_tokens(),
        }
    }
}

/// Invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Concurrent invocations per question (1 = sequential)
    #[serde(default = "default_parallel_requests")]
    pub parallel_requests: usize,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallel_requests: default_parallel_requests(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_openai_api_key_env")]
    pub openai_api_key_env: String,
    /// Requests per minute allowed against the hosted API
    #[serde(default = "default_openai_rpm")]
    pub openai_rpm: u32,
    /// Falls back to `OLLAMA_HOST`, then `http://localhost:11434`
    #[serde(default)]
    pub ollama_base_url: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub ollama_keep_alive: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            openai_base_url: default_openai_base_url(),
            openai_api_key_env: default_openai_api_key_env(),
            openai_rpm: default_openai_rpm(),
            ollama_base_url: None,
            ollama_keep_alive: default_keep_alive(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub save_responses: bool,
    #[serde(default = "default_true")]
    pub write_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            save_responses: false,
            write_summary: true,
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_max_tokens() -> u32 { 1024 }
fn default_temperatures() -> Vec<f32> { vec![0.0, 0.8] }
fn default_system_prompt() -> String {
    "You are a helpful assistant. Answer the question directly and concisely.".to_string()
}
fn default_content_system_prompt() -> String { "You are a summarization assistant.".to_string() }
fn default_content_prompt() -> String {
    "Provide a one sentence summary of the text. Start the sentence with a verb like describes, explains or similar. TEXT START:".to_string()
}
fn default_question_bank() -> String { "questions/question_bank.json".to_string() }
fn default_hosted_repetitions() -> u32 { 1 }
fn default_local_repetitions() -> u32 { 3 }
fn default_judge_model() -> String { "gemma3".to_string() }
fn default_judge_class() -> ModelClass { ModelClass::Local }
fn default_judge_max_tokens() -> u32 { 512 }
fn default_parallel_requests() -> usize { 1 }
fn default_retry_count() -> u32 { 2 }
fn default_retry_delay_ms() -> u64 { 1000 }
fn default_max_retry_delay_ms() -> u64 { 30_000 }
fn default_timeout_ms() -> u64 { 120_000 }
fn default_openai_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_openai_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_openai_rpm() -> u32 { 500 }
fn default_keep_alive() -> String { "30s".to_string() }
fn default_output_dir() -> String { "results/runs".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/eval.toml",
            "../config/eval.toml",
            "summary-eval/config/eval.toml",
        ];

        for path in &config_paths {
            if let Ok(config) = Self::from_file(path) {
                tracing::info!("Loaded configuration from {}", path);
                return config;
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path.as_ref(), content)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Ok(())
    }

    /// Reject configurations that cannot produce any work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        if self.evaluation.temperatures.is_empty() {
            return Err(ConfigError::NoTemperatures);
        }
        if let Some(&t) = self
            .evaluation
            .temperatures
            .iter()
            .find(|t| !t.is_finite() || **t < 0.0 || **t > 2.0)
        {
            return Err(ConfigError::InvalidTemperature(t));
        }
        if let Some(t) = duplicate_temperature(&self.evaluation.temperatures) {
            return Err(ConfigError::DuplicateTemperature(t));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(ConfigError::DuplicateModel(model.id.clone()));
            }
            if self.evaluation.repetitions.repetitions_for(model) == 0 {
                return Err(ConfigError::ZeroRepetitions(model.id.clone()));
            }
        }
        Ok(())
    }

    /// Keep only the named models, in the order they appear in the configuration
    pub fn retain_models(&mut self, ids: &[&str]) -> Result<(), ConfigError> {
        if let Some(unknown) = ids
            .iter()
            .find(|id| !self.models.iter().any(|m| m.id == **id))
        {
            return Err(ConfigError::UnknownModel(unknown.to_string()));
        }
        self.models.retain(|m| ids.contains(&m.id.as_str()));
        Ok(())
    }

    pub fn get_model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }
}

/// First temperature listed more than once. Slots are keyed by temperature,
/// so a repeated value would make two invocations share one key.
pub fn duplicate_temperature(temperatures: &[f32]) -> Option<f32> {
    temperatures
        .iter()
        .enumerate()
        .find(|(i, t)| temperatures[..*i].contains(t))
        .map(|(_, t)| *t)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: vec![
                ModelConfig {
                    id: "gpt-4o-mini-2024-07-18".to_string(),
                    display_name: "GPT-4o mini".to_string(),
                    class: ModelClass::Hosted,
                    max_tokens: 1024,
                    repetitions: None,
                },
                ModelConfig {
                    id: "llama3.2".to_string(),
                    display_name: "Llama 3.2".to_string(),
                    class: ModelClass::Local,
                    max_tokens: 1024,
                    repetitions: None,
                },
            ],
            evaluation: EvaluationConfig::default(),
            judge: JudgeConfig::default(),
            runner: RunnerConfig::default(),
            endpoints: EndpointConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Configuration errors. All of them are fatal before the first invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("no models configured")]
    NoModels,

    #[error("no questions to evaluate")]
    NoQuestions,

    #[error("no temperatures configured")]
    NoTemperatures,

    #[error("temperature {0} is outside 0.0..=2.0")]
    InvalidTemperature(f32),

    #[error("temperature {0} is listed more than once")]
    DuplicateTemperature(f32),

    #[error("model {0} is configured with zero repetitions")]
    ZeroRepetitions(String),

    #[error("model {0} is listed more than once")]
    DuplicateModel(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),
}
