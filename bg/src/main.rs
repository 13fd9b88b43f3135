//! Bulkgen - rate-limited bulk video generation
//!
//! CLI entry point for queueing generations and watching them run.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, bail};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use bulkgen::cli::{Cli, Command, OutputFormat, RunOptions, get_log_path};
use bulkgen::config::Config;
use bulkgen::domain::{GenerationRequest, WorkItem, WorkStatus};
use bulkgen::export::{ExportError, Exporter};
use bulkgen::genai::{Provider, create_client};
use bulkgen::scheduler::{Executor, QueueState, Scheduler, SchedulerEvent};
use bulkgen::storyboard::{Storyboard, prompt_lines};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Write to the log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "Bulkgen loaded config: provider={}, max-concurrent={}, rate-limit={}/{}ms",
        config.genai.provider, config.scheduler.max_concurrent, config.scheduler.rate_limit, config.scheduler.window_ms
    );

    match cli.command {
        Some(Command::Run {
            prompts,
            prompts_file,
            options,
        }) => cmd_run(&config, prompts, prompts_file.as_deref(), &options).await,
        Some(Command::Storyboard {
            topic,
            scenes,
            character,
            output,
            enqueue,
            options,
        }) => {
            let board = Storyboard::new(topic, scenes);
            let board = match character {
                Some(image) => board.with_character(image),
                None => board,
            };
            cmd_storyboard(&config, &board, output.as_deref(), enqueue, &options).await
        }
        Some(Command::Logs { follow, lines }) => cmd_logs(follow, lines),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Read prompts from a file, one per line; blank lines and `#` comments are skipped
fn read_prompts_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).context(format!("Failed to read prompts from {}", path.display()))?;
    Ok(prompt_lines(&content))
}

fn build_requests(config: &Config, prompts: Vec<String>, options: &RunOptions) -> Vec<GenerationRequest> {
    let model = options.model.clone().unwrap_or_else(|| config.genai.model.clone());
    prompts
        .into_iter()
        .map(|prompt| {
            let mut request = GenerationRequest::new(prompt)
                .with_model(model.clone())
                .with_aspect_ratio(options.aspect_ratio);
            request.input_type = options.input_type;
            request.image = options.image.clone();
            request
        })
        .collect()
}

/// Generate a video for every prompt
async fn cmd_run(
    config: &Config,
    mut prompts: Vec<String>,
    prompts_file: Option<&Path>,
    options: &RunOptions,
) -> Result<()> {
    if let Some(path) = prompts_file {
        prompts.extend(read_prompts_file(path)?);
    }
    if prompts.is_empty() {
        bail!("No prompts given. Use --prompt or --prompts-file.");
    }

    let provider = create_client(config).context("Failed to create generation provider")?;
    let requests = build_requests(config, prompts, options);
    run_batch(config, &provider, requests, options).await
}

/// Write scene prompts for a topic, then save, print or generate them
async fn cmd_storyboard(
    config: &Config,
    board: &Storyboard,
    output: Option<&Path>,
    enqueue: bool,
    options: &RunOptions,
) -> Result<()> {
    let provider = create_client(config).context("Failed to create generation provider")?;
    let prompts = board.write(provider.story_writer.as_ref()).await?;

    if let Some(path) = output {
        fs::write(path, board.prompts_file(&prompts))
            .context(format!("Failed to write prompts to {}", path.display()))?;
        info!(path = %path.display(), count = prompts.len(), "Storyboard saved");
    }

    match (&options.format, enqueue) {
        (OutputFormat::Json, false) => println!("{}", serde_json::to_string_pretty(&prompts)?),
        // Events and the summary carry the prompts
        (OutputFormat::Json, true) => {}
        (OutputFormat::Text, _) => {
            println!("{} {}", "Storyboard:".bold(), board.topic);
            for (i, prompt) in prompts.iter().enumerate() {
                println!("  {:>2}. {}", i + 1, prompt);
            }
            if let Some(path) = output {
                println!(
                    "\nWrote {} scene prompt(s) to {}. Review them, then: bg run --prompts-file {}",
                    prompts.len(),
                    path.display(),
                    path.display()
                );
            }
        }
    }

    if !enqueue {
        return Ok(());
    }

    let model = options.model.clone().unwrap_or_else(|| config.genai.model.clone());
    let requests = board.requests(&prompts, &model, options.aspect_ratio);
    run_batch(config, &provider, requests, options).await
}

/// Enqueue everything, wait for it to settle, retry, summarize and export
async fn run_batch(
    config: &Config,
    provider: &Provider,
    requests: Vec<GenerationRequest>,
    options: &RunOptions,
) -> Result<()> {
    let mut scheduler_config = config.scheduler.clone();
    if let Some(max_concurrent) = options.max_concurrent {
        scheduler_config.max_concurrent = max_concurrent;
    }

    let executor: Arc<dyn Executor> = provider.executor.clone();
    let (handle, task) = Scheduler::spawn(scheduler_config, executor).context("Invalid scheduler configuration")?;
    let events = handle.subscribe().await?;
    let printer = tokio::spawn(print_events(events, options.format.clone()));

    let ids = handle.enqueue_batch(requests).await?;
    info!(count = ids.len(), provider = provider.name, "Batch enqueued");
    if options.format == OutputFormat::Text {
        println!(
            "Queued {} item(s) with the {} provider (max {} running, {} per {}s)",
            ids.len(),
            provider.name,
            handle.state().await?.max_concurrent,
            config.scheduler.rate_limit,
            config.scheduler.window_ms / 1000
        );
    }

    let mut state = handle.wait_idle().await?;
    for round in 1..=options.retry_failed {
        if state.failed == 0 {
            break;
        }
        info!(round, failed = state.failed, "Retrying failed items");
        for item in handle.list_by_status(WorkStatus::Failed).await? {
            handle.retry(item.id).await?;
        }
        state = handle.wait_idle().await?;
    }

    let items = handle.list_all().await?;
    handle.shutdown().await?;
    task.await.context("Scheduler task failed")?;
    let _ = printer.await;

    print_summary(&items, &state, &options.format)?;

    if let Some(dir) = &options.export {
        let dir = dir.clone().unwrap_or_else(|| config.export.output_dir.clone());
        export(config, &dir, &items).await?;
    }
    Ok(())
}

/// Print lifecycle events until the scheduler goes away
async fn print_events(mut events: broadcast::Receiver<SchedulerEvent>, format: OutputFormat) {
    loop {
        match events.recv().await {
            Ok(event) => match format {
                OutputFormat::Json => match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!(error = %e, "Failed to serialize event"),
                },
                OutputFormat::Text => print_event(&event),
            },
            Err(RecvError::Lagged(missed)) => warn!(missed, "Progress output fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::Admitted { id } => println!("{} {}", "running".cyan(), id.short()),
        SchedulerEvent::Succeeded { id } => println!("{} {}", "done".green(), id.short()),
        SchedulerEvent::Failed { id, error } => println!("{} {} {}", "failed".red(), id.short(), error),
        SchedulerEvent::Retried { id } => println!("{} {}", "retry".yellow(), id.short()),
        SchedulerEvent::Enqueued { .. } | SchedulerEvent::CycleStarted | SchedulerEvent::CycleStopped => {}
    }
}

fn print_summary(items: &[WorkItem], state: &QueueState, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({ "state": state, "items": items });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!();
            for item in items {
                let status = match item.status() {
                    WorkStatus::Succeeded => "succeeded".green(),
                    WorkStatus::Failed => "failed".red(),
                    other => other.to_string().as_str().normal(),
                };
                let detail = item
                    .result()
                    .map(|a| a.uri.clone())
                    .or_else(|| item.error().map(str::to_string))
                    .unwrap_or_default();
                println!("{}  {:<10} {}", item.id.short(), status, detail);
            }
            println!(
                "\n{} succeeded, {} failed ({} admissions, {} retries)",
                state.succeeded, state.failed, state.stats.total_admitted, state.stats.total_retried
            );
        }
    }
    Ok(())
}

async fn export(config: &Config, dir: &Path, items: &[WorkItem]) -> Result<()> {
    let exporter = Exporter::new(dir, &config.export, config.genai.get_api_key());
    match exporter.export_all(items).await {
        Ok(report) => {
            for path in &report.saved {
                println!("{} {}", "saved".green(), path.display());
            }
            for (id, error) in &report.failed {
                println!("{} {} {}", "download failed".red(), id.short(), error);
            }
            Ok(())
        }
        Err(ExportError::NoSuccessfulItems) => {
            println!("{}", ExportError::NoSuccessfulItems);
            Ok(())
        }
        Err(e) => Err(e).context(format!("Failed to export to {}", dir.display())),
    }
}

/// Show logs
fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;

        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}
