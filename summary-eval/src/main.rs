//! summary-eval CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use summary_eval::{
    analysis::Judge,
    config::{Config, ConfigError},
    providers::{create_judge_provider, create_provider, create_providers_with_config},
    questions::load_question_bank,
    reporting::{print_comparison, print_console_report, EvaluationReport, JsonSummary, RunMode},
    runner::{content_item, ConsoleProgress, EvaluationRunner, ModelHandle, RunSettings},
};

#[derive(Parser)]
#[command(name = "summary-eval")]
#[command(about = "Run prompts across local and hosted LLMs, then score and diff their outputs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the question bank across every configured model
    Run {
        /// Question bank JSON file (default: from configuration)
        #[arg(short, long)]
        questions: Option<PathBuf>,

        /// Comma-separated categories to run (default: all)
        #[arg(long)]
        categories: Option<String>,

        /// Comma-separated model ids to run (default: all configured)
        #[arg(short, long)]
        models: Option<String>,

        /// Concurrent invocations per question
        #[arg(long)]
        parallel: Option<usize>,

        /// Skip judge model scoring
        #[arg(long)]
        no_judge: bool,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save raw model outputs to individual files in the output directory
        #[arg(long)]
        save_responses: bool,
    },

    /// Run a content file through every model and highlight the differences
    Compare {
        /// Text file to summarize
        #[arg(short, long)]
        input: PathBuf,

        /// Comma-separated model ids to run (default: all configured)
        #[arg(short, long)]
        models: Option<String>,

        /// Concurrent invocations
        #[arg(long)]
        parallel: Option<usize>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the questions in the bank
    ListQuestions {
        /// Question bank JSON file (default: from configuration)
        #[arg(short, long)]
        questions: Option<PathBuf>,
    },

    /// Check that every configured model and the judge respond
    CheckModels,

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/eval.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("summary_eval=debug,info")
    } else {
        EnvFilter::new("summary_eval=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            questions,
            categories,
            models,
            parallel,
            no_judge,
            output,
            save_responses,
        } => {
            let options = RunOptions {
                questions,
                categories,
                models,
                parallel,
                no_judge,
                output,
                save_responses,
            };
            run_evaluation(config, options).await?;
        }

        Commands::Compare {
            input,
            models,
            parallel,
            output,
        } => {
            run_comparison(config, input, models, parallel, output).await?;
        }

        Commands::ListQuestions { questions } => {
            list_questions(&config, questions)?;
        }

        Commands::CheckModels => {
            check_models(&config).await?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

struct RunOptions {
    questions: Option<PathBuf>,
    categories: Option<String>,
    models: Option<String>,
    parallel: Option<usize>,
    no_judge: bool,
    output: Option<PathBuf>,
    save_responses: bool,
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => {
            let config = Config::from_file(path)?;
            tracing::info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(Config::load_or_default()),
    }
}

fn split_list(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Apply the model filter and parallelism overrides, then validate
fn apply_overrides(
    config: &mut Config,
    models: Option<String>,
    parallel: Option<usize>,
) -> Result<(), ConfigError> {
    if let Some(models) = models {
        let ids = split_list(&models);
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        config.retain_models(&ids)?;
    }
    if let Some(parallel) = parallel {
        config.runner.parallel_requests = parallel;
    }
    config.validate()
}

fn build_models(config: &Config) -> Result<Vec<ModelHandle>, Box<dyn std::error::Error>> {
    Ok(create_providers_with_config(config)?
        .into_iter()
        .map(|(model, provider)| ModelHandle::new(model, provider))
        .collect())
}

/// Cancel the run on Ctrl-C; the current question still finishes
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nInterrupted, finishing the current question...");
            token.cancel();
        }
    });
    cancel
}

async fn run_evaluation(
    mut config: Config,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    apply_overrides(&mut config, options.models, options.parallel)?;
    if options.no_judge {
        config.judge.enabled = false;
    }

    let bank_path = options
        .questions
        .unwrap_or_else(|| PathBuf::from(&config.evaluation.question_bank));
    let bank = load_question_bank(&bank_path)?;
    let categories = options.categories.as_deref().map(split_list);
    let questions = bank.select(categories.as_deref());
    if questions.is_empty() {
        return Err(ConfigError::NoQuestions.into());
    }

    let started_at = Utc::now();
    let run_id = started_at.format("%Y%m%d-%H%M%S").to_string();

    println!("=== summary-eval run {} ===", run_id);
    println!("Questions: {} (from {})", questions.len(), bank_path.display());
    println!(
        "Models: {}",
        config
            .models
            .iter()
            .map(|m| format!("{} [{}]", m.label(), m.class))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Temperatures: {:?}", config.evaluation.temperatures);
    println!();

    let mut runner = EvaluationRunner::new(build_models(&config)?, RunSettings::from_config(&config))?
        .with_progress(Arc::new(ConsoleProgress));

    match create_judge_provider(&config) {
        Ok(Some(provider)) => {
            let judge = Judge::new(provider, &config.judge)
                .with_timeout(Duration::from_millis(config.runner.timeout_ms));
            runner = runner.with_judge(judge);
        }
        Ok(None) => tracing::info!("Judge scoring disabled"),
        Err(e) => tracing::warn!("Judge unavailable, continuing without it: {}", e),
    }

    let outcome = runner.run_with_cancel(&questions, cancel_on_ctrl_c()).await?;

    let report = EvaluationReport::assemble(
        &run_id,
        RunMode::Evaluation,
        started_at,
        config.models.clone(),
        config.evaluation.temperatures.clone(),
        outcome,
    );
    print_console_report(&report);

    let save_responses = options.save_responses || config.output.save_responses;
    write_outputs(&config, options.output, &report, save_responses)?;
    Ok(())
}

async fn run_comparison(
    mut config: Config,
    input: PathBuf,
    models: Option<String>,
    parallel: Option<usize>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    apply_overrides(&mut config, models, parallel)?;

    let content = std::fs::read_to_string(&input)?;
    let id = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "content".to_string());
    let item = content_item(id, &config.evaluation.content_prompt, &content);

    let started_at = Utc::now();
    let run_id = started_at.format("%Y%m%d-%H%M%S").to_string();
    println!("=== summary-eval compare {} ===", run_id);
    println!("Input: {} ({} chars)", input.display(), content.chars().count());

    let runner = EvaluationRunner::new(build_models(&config)?, RunSettings::for_content(&config))?
        .with_scoring(false)
        .with_progress(Arc::new(ConsoleProgress));
    let outcome = runner.run_with_cancel(&[item], cancel_on_ctrl_c()).await?;

    let report = EvaluationReport::assemble(
        &run_id,
        RunMode::Comparison,
        started_at,
        config.models.clone(),
        config.evaluation.temperatures.clone(),
        outcome,
    );
    print_comparison(&report);

    write_outputs(&config, output, &report, config.output.save_responses)?;
    Ok(())
}

fn write_outputs(
    config: &Config,
    output: Option<PathBuf>,
    report: &EvaluationReport,
    save_responses: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_base = output.unwrap_or_else(|| PathBuf::from(&config.output.output_dir));
    let run_dir = output_base.join(&report.run_id);
    std::fs::create_dir_all(&run_dir)?;

    let report_path = run_dir.join("report.json");
    report.write_to_file(&report_path)?;
    println!("\nReport written to: {}", report_path.display());

    if config.output.write_summary {
        let summary_path = run_dir.join("summary.json");
        JsonSummary::from_report(report, "report.json").write_to_file(&summary_path)?;
        println!("JSON summary written to: {}", summary_path.display());
    }

    if save_responses {
        let responses_dir = run_dir.join("responses");
        let written = report.write_responses(&responses_dir)?;
        println!(
            "Model outputs written to: {} ({} files)",
            responses_dir.display(),
            written.len()
        );
    }

    Ok(())
}

fn list_questions(
    config: &Config,
    questions: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = questions.unwrap_or_else(|| PathBuf::from(&config.evaluation.question_bank));
    let bank = load_question_bank(&path)?;

    println!("Questions ({}):", bank.len());
    println!("{:-<78}", "");

    for category in bank.categories() {
        println!("{}:", category);
        for question in bank.questions_in(category) {
            let text: String = question.question.chars().take(50).collect();
            println!("  {} | {} | {}", question.id, question.difficulty, text);
        }
    }

    Ok(())
}

async fn check_models(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Checking models:");
    println!("{:-<60}", "");

    let mut targets = config.models.clone();
    if config.judge.enabled {
        targets.push(config.judge.model_config());
    }

    for (index, model) in targets.iter().enumerate() {
        let role = if index >= config.models.len() { " (judge)" } else { "" };
        let status = match create_provider(model, &config.endpoints) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => "available".to_string(),
                Ok(false) => "not available".to_string(),
                Err(e) => format!("error: {}", e),
            },
            Err(e) => format!("not configured: {}", e),
        };
        println!("  {:<32} {:<7} {}{}", model.id, model.class, status, role);
    }

    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
