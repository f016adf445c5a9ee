//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cleaning::AnthropicClient;
use crate::jobs::{PipelineBuilder, RunSummary};
use crate::output::{FanoutSink, JsonLogSink, ProgressSink, TracingSink};
use crate::processing::{discover_inputs, ensure_dir};
use crate::types::CleanerConfig;

/// Directory created next to the inputs for cleaned files.
pub const CLEANED_DIR_NAME: &str = "cleaned_text";

/// Directory created next to the inputs for per-file logs and the summary.
pub const LOG_DIR_NAME: &str = "processing_logs";

/// Clean large text files with a remote language model.
#[derive(Debug, Parser)]
#[command(name = "text-cleaner", version, about)]
pub struct Cli {
    /// A .txt file, or a directory containing .txt files
    pub path: PathBuf,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where cleaned files are written [default: <input folder>/cleaned_text]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Where per-file logs are written [default: <input folder>/processing_logs]
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Number of chunk calls in flight at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Maximum lines per chunk
    #[arg(long)]
    pub max_lines: Option<usize>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Load the configuration and apply command-line overrides.
    pub fn resolve_config(&self) -> Result<CleanerConfig> {
        let mut config = CleanerConfig::load(self.config.as_deref())
            .context("failed to load configuration")?;
        if let Some(max_lines) = self.max_lines {
            config = config.with_max_lines(max_lines);
        }
        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the cleaner for the given arguments and return the run summary.
pub async fn run(cli: Cli) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let config = cli.resolve_config()?;

    let (files, folder) = discover_inputs(&cli.path)?;
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| folder.join(CLEANED_DIR_NAME));
    let log_dir = cli
        .log_dir
        .clone()
        .unwrap_or_else(|| folder.join(LOG_DIR_NAME));
    ensure_dir(&output_dir).await?;
    ensure_dir(&log_dir).await?;

    info!(
        run_id = %run_id,
        files = files.len(),
        output_dir = %output_dir.display(),
        log_dir = %log_dir.display(),
        "Starting cleaning run"
    );

    let client = AnthropicClient::new(&config.api)?;
    info!(model = client.model(), "Using cleaning model");

    let json_log = Arc::new(JsonLogSink::new(log_dir.clone()));
    let progress = Arc::new(ProgressSink::new(files.len()));
    let sink = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(json_log.clone())
        .with(progress.clone());

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let scheduler = PipelineBuilder::new(config, Arc::new(client))
        .with_sink(Arc::new(sink))
        .with_cancellation(cancel.clone())
        .with_output_dir(output_dir.clone())
        .build()?;

    let started = Instant::now();
    let outcomes = scheduler.run_paths(files).await;
    json_log.flush().await;
    progress.finish("done");

    let summary = RunSummary::from_outcomes(run_id, &outcomes, started.elapsed())
        .with_locations(&output_dir, &log_dir);

    println!("{}", summary);
    if let Some(note) = summary.advisory() {
        println!("\n{}", note);
    }
    let summary_path = summary.write_to(&log_dir).await?;
    info!(path = %summary_path.display(), "Wrote run summary");

    if cancel.is_cancelled() {
        warn!(run_id = %run_id, "Run was interrupted before completion");
    }

    Ok(summary)
}

/// Cancel the run on Ctrl-C. In-flight calls finish; nothing new starts.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });
}
