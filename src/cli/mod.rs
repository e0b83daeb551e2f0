//! Command-line interface for snapflow.
//!
//! Provides commands for running the decider against the workflow
//! service, replaying saved histories offline, acting as the remote
//! executor, and inspecting configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::SwfClient;
use crate::config::{load_config, load_decoder_limits, ResolvedConfig};
use crate::core::{summarize_history, to_decision, Decider, Outcome, Pipeline, Poller};
use crate::decoder::DecodeLimits;
use crate::domain::{HistoryEvent, StepResult};
use crate::executor::{FailOn, FailureInjector, NeverFail, RandomFailure, TaskExecutor};

/// snapflow - Event-sourced workflow decider
#[derive(Parser, Debug)]
#[command(name = "snapflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .snapflow/config.yaml)
    #[arg(short, long, global = true, env = "SNAPFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pipeline file, replacing the pipeline from the config
    #[arg(short, long, global = true, env = "SNAPFLOW_PIPELINE")]
    pub pipeline: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll for decision tasks and answer them until Ctrl-C
    Decide,

    /// Print the decision for a saved history without submitting it
    Replay {
        /// Poll response, JSON array of events, or JSONL file
        #[arg(long)]
        history: PathBuf,
    },

    /// Run one task as the remote executor; the last argument is the payload
    Execute {
        /// Invocation arguments, payload last
        #[arg(required = true, num_args = 1..)]
        args: Vec<String>,

        /// Probability that a failable action reports an error
        #[arg(long, conflicts_with = "fail_on")]
        failure_rate: Option<f64>,

        /// Actions that always report an error (comma-separated)
        #[arg(long, value_delimiter = ',')]
        fail_on: Vec<String>,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Decide => {
                let config = load_config(self.config.as_deref())?;
                let pipeline = select_pipeline(&config, self.pipeline.as_deref())?;
                run_decider(config, pipeline).await
            }
            Commands::Replay { history } => {
                let config = load_config(self.config.as_deref())?;
                let pipeline = select_pipeline(&config, self.pipeline.as_deref())?;
                replay_history(pipeline, &history).await
            }
            Commands::Execute {
                args,
                failure_rate,
                fail_on,
            } => {
                // Only the decoder section matters here
                let limits = load_decoder_limits(self.config.as_deref());
                let line = executor_output(limits, &args, failure_injector(failure_rate, fail_on))?;
                println!("{}", line);
                Ok(())
            }
            Commands::Config => {
                let config = load_config(self.config.as_deref())?;
                show_config(&config)
            }
        }
    }
}

/// The pipeline from `--pipeline` if given, else the configured one
fn select_pipeline(config: &ResolvedConfig, path: Option<&Path>) -> Result<Pipeline> {
    let Some(path) = path else {
        return Ok(config.pipeline.clone());
    };

    let pipeline = Pipeline::from_file(path)?;
    pipeline
        .validate()
        .with_context(|| format!("Invalid pipeline file: {}", path.display()))?;

    Ok(pipeline)
}

/// Long-poll the service until interrupted
async fn run_decider(config: ResolvedConfig, pipeline: Pipeline) -> Result<()> {
    let service = Arc::new(SwfClient::new(
        config.service.endpoint.clone(),
        config.service.request_timeout(),
    )?);

    tracing::info!(
        endpoint = %service.endpoint(),
        pipeline = %pipeline.name,
        steps = pipeline.steps.len(),
        "Starting decider"
    );

    let poller = Poller::new(
        service,
        Decider::new(pipeline),
        config.service.poll_request(),
        config.service.execution_context,
    )
    .with_max_in_flight(config.poller.max_in_flight)
    .with_retry(config.poller.retry, config.poller.max_poll_failures);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl-C");
    };

    let stats = poller.run(shutdown).await?;

    eprintln!(
        "\n[Decider stopped: {} decided, {} failed workflows, {} unhandled, {} submit failures]",
        stats.decided, stats.failed_workflows, stats.unhandled, stats.submit_failures
    );

    Ok(())
}

/// Decide a saved history offline
async fn replay_history(pipeline: Pipeline, path: &Path) -> Result<()> {
    let events = load_history(path).await?;
    let decider = Decider::new(pipeline);

    match decider.decide(&events) {
        Outcome::Decided(action) => {
            eprintln!("[Action: {}]", action.kind());
            let decision = to_decision(&action);
            println!(
                "{}",
                serde_json::to_string_pretty(&decision).context("Failed to encode decision")?
            );
        }
        Outcome::Unhandled => {
            eprintln!("[No actionable event in {} events]", events.len());
            for line in summarize_history(&events) {
                eprintln!("  {}", line);
            }
        }
    }

    Ok(())
}

/// Whole-file shapes accepted by `replay`
#[derive(Deserialize)]
#[serde(untagged)]
enum SavedHistory {
    Task(SavedTask),
    Events(Vec<HistoryEvent>),
}

/// A saved poll response; only the history page matters
#[derive(Deserialize)]
struct SavedTask {
    events: Vec<HistoryEvent>,
}

/// Load a history page from disk.
///
/// Accepts a saved poll response, a JSON array of events, or one event per
/// line. Blank lines in JSONL files are skipped.
pub async fn load_history(path: &Path) -> Result<Vec<HistoryEvent>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;

    if let Ok(saved) = serde_json::from_str::<SavedHistory>(&content) {
        return Ok(match saved {
            SavedHistory::Task(task) => task.events,
            SavedHistory::Events(events) => events,
        });
    }

    let mut events = Vec::new();
    let mut lines = BufReader::new(content.as_bytes()).lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: HistoryEvent = serde_json::from_str(&line).with_context(|| {
            format!("Failed to parse event at {}:{}", path.display(), line_no)
        })?;
        events.push(event);
    }

    Ok(events)
}

/// Build the failure strategy from the command-line flags
fn failure_injector(failure_rate: Option<f64>, fail_on: Vec<String>) -> Box<dyn FailureInjector> {
    match failure_rate {
        Some(rate) => Box::new(RandomFailure::new(rate)),
        None if !fail_on.is_empty() => Box::new(FailOn::new(fail_on)),
        None => Box::new(NeverFail),
    }
}

/// Act as the remote executor: one payload in, one result line out.
///
/// Every failure that happens before the action runs (config, payload)
/// is reported inside the result rather than as a process error.
fn executor_output(
    limits: Result<DecodeLimits>,
    args: &[String],
    injector: Box<dyn FailureInjector>,
) -> Result<String> {
    let result = match (limits, args.last()) {
        (Err(e), _) => {
            let message = format!("{:#}", e);
            tracing::error!(error = %message, "Unable to load configuration");
            StepResult::default().with_error(message)
        }
        (Ok(_), None) => StepResult::default().with_error("no payload given"),
        (Ok(limits), Some(payload)) => TaskExecutor::from_boxed(injector)
            .with_limits(limits)
            .run(payload)
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Unable to decode payload");
                StepResult::default().with_error(e.to_string())
            }),
    };

    serde_json::to_string(&result).context("Failed to encode step result")
}

/// Show resolved configuration (debug)
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("snapflow configuration");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Service:");
    println!("  Endpoint:        {}", config.service.endpoint);
    println!("  Domain:          {}", config.service.domain);
    println!("  Task list:       {}", config.service.task_list);
    println!("  Identity:        {}", config.service.identity);
    println!("  Page size:       {}", config.service.max_page_size);
    println!("  Request timeout: {}s", config.service.request_timeout_seconds);
    println!();
    println!("Poller:");
    println!("  Max in flight:     {}", config.poller.max_in_flight);
    println!("  Max poll failures: {}", config.poller.max_poll_failures);
    println!(
        "  Retry:             {}ms initial, {}ms max, x{}",
        config.poller.retry.initial_delay_ms,
        config.poller.retry.max_delay_ms,
        config.poller.retry.backoff_multiplier
    );
    println!();
    println!("Pipeline: {} (executor: {})", config.pipeline.name, config.pipeline.executor);
    for step in &config.pipeline.steps {
        match step.delay_seconds {
            Some(delay) => println!("  {} (then wait {}s)", step.name, delay),
            None => println!("  {}", step.name),
        }
    }
    println!();
    println!(
        "Decoder limits: depth {}, keys {}",
        config.decoder.max_depth, config.decoder.max_keys
    );

    Ok(())
}
