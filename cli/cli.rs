use pystrip_core::{
    BatchSummary, CliArgs, Command as CoreCommand, FileOutcome, ProcessorOptions, find_files,
    process_files,
};
mod interaction;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use console::style;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

fn print_completions_cli(shell: clap_complete::Shell) {
    let mut cmd = CliArgs::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

async fn run_batch(files: Vec<PathBuf>, options: ProcessorOptions) -> Result<BatchSummary> {
    let stop = Arc::new(AtomicBool::new(false));

    let signal_stop = Arc::clone(&stop);
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                style("Stop requested; finishing the current file...").yellow()
            );
            tracing::debug!("interrupt received, stop flag set");
            signal_stop.store(true, Ordering::Relaxed);
        }
    });

    let worker_stop = Arc::clone(&stop);
    let summary =
        tokio::task::spawn_blocking(move || process_files(files, &options, &worker_stop)).await?;
    watcher.abort();
    Ok(summary)
}

fn report(summary: &BatchSummary) {
    for result in &summary.results {
        match &result.outcome {
            FileOutcome::Done(report) => {
                println!(
                    "  {} {} ({:.1}% smaller)",
                    style("✓").green(),
                    style(report.output.display()).dim(),
                    report.size_reduction_percent()
                );
            }
            FileOutcome::Skipped(err) => {
                println!("  {} Skipped: {}", style("-").dim(), style(err).dim());
            }
            FileOutcome::Failed(err) => {
                eprintln!(
                    "  {} {}: {}",
                    style("✗").red(),
                    style(result.path.display()).dim(),
                    style(err).red()
                );
            }
        }
    }
    if summary.stopped {
        println!(
            "Stopped early; {} {} not processed.",
            style(summary.unprocessed()).yellow(),
            if summary.unprocessed() == 1 { "file" } else { "files" }
        );
    }
    let seconds = summary.elapsed.as_secs();
    println!(
        "Result: {} of {} {} processed successfully, {} failed, {} skipped ({}m {}s).",
        style(summary.succeeded).green(),
        summary.total,
        if summary.total == 1 { "file" } else { "files" },
        style(summary.failed).red(),
        summary.skipped,
        seconds / 60,
        seconds % 60
    );
}

const PREVIEW_LIMIT: usize = 10;

fn preview(files: &[PathBuf]) {
    println!(
        "{} Python {} queued:",
        style(files.len()).cyan(),
        if files.len() == 1 { "file" } else { "files" }
    );
    for file in files.iter().take(PREVIEW_LIMIT) {
        println!("  {}", style(file.display()).dim());
    }
    if let Some(rest) = files.len().checked_sub(PREVIEW_LIMIT).filter(|&n| n > 0) {
        println!("  ... {} more", rest);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let CliArgs { command, main_opts: args } = CliArgs::parse();

    if let Some(CoreCommand::Completion(completion)) = command {
        print_completions_cli(completion.shell);
        return Ok(ExitCode::SUCCESS);
    }

    init_logging(args.verbose);

    let files = match find_files(&args) {
        Ok(files) => files,
        Err(err) => {
            eprintln!("{}", style(format!("Could not collect input files: {}", err)).red());
            return Ok(ExitCode::FAILURE);
        }
    };
    if files.is_empty() {
        println!("Nothing to strip: no Python files found.");
        return Ok(ExitCode::SUCCESS);
    }
    preview(&files);

    let options = args.processor_options();
    tracing::debug!(?options, "processor options");
    match interaction::confirm_processing(&files, options.overwrite, args.no_confirm) {
        Ok(true) => {}
        Ok(false) => return Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("{}", style(format!("Confirmation failed: {}", err)).red());
            return Ok(ExitCode::FAILURE);
        }
    }

    let summary = run_batch(files, options).await?;
    println!();
    report(&summary);

    Ok(if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
