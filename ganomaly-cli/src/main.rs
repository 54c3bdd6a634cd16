//! ganomaly CLI: train or evaluate the adversarial anomaly classifier.
//!
//! The operating mode comes from the `train_or_predict` parameter, not from a
//! subcommand. Parameters are read from the environment (and a `.env` file),
//! optionally layered over a JSON params file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use ganomaly_core::config::load_config;
use ganomaly_core::{History, Mode};
use ganomaly_ml::Run;

/// Train or evaluate a GAN anomaly classifier with a classical or quantum decoder
#[derive(Parser, Debug)]
#[command(name = "ganomaly", version, about, long_about = None)]
struct Cli {
    /// JSON file with a flat object of parameter overrides
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Directory for the structured `log.log` file
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    show_config: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors to stderr
    #[arg(short, long)]
    quiet: bool,
}

fn stderr_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Human-readable stderr + JSON file logging
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(stderr_filter(cli.verbose, cli.quiet)));

    let _ = std::fs::create_dir_all(&cli.log_dir);
    let file_appender = tracing_appender::rolling::never(&cli.log_dir, "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // The single error boundary: anything below may fail, nothing below catches.
    let code = match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "Run failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    };
    info!("Run of the GAN classifier has ended");
    println!("Run of the GAN classifier has ended");
    code
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli.params.as_deref()).context("Configuration error")?;
    if cli.show_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    info!(
        method = %config.method,
        mode = %config.train_or_predict,
        seed = config.seed,
        model_dir = %config.model_dir,
        "Configuration resolved"
    );

    let prepared = Run::prepare(&config).context("Could not set up the run")?;
    println!("The following models will be used:");
    println!("{}", prepared.summary());

    let outcome = prepared.execute()?;
    match outcome.mode {
        Mode::Train => {
            println!(
                "Trained for {} steps ({} validation records)",
                outcome.history.training_records().count(),
                outcome.history.validation_records().count()
            );
            print_last(&outcome.history);
            if let Some(path) = &outcome.checkpoint_path {
                println!("Checkpoint: {}", path.display());
            }
            println!("Training history: {}", outcome.results_path.display());
        }
        Mode::Predict => {
            print_last(&outcome.history);
            println!("Test results: {}", outcome.results_path.display());
        }
    }
    for path in &outcome.artifacts {
        println!("Artifact: {}", path.display());
    }
    Ok(())
}

fn print_last(history: &History) {
    if let Some(record) = history.last() {
        println!("{} record at step {}:", phase_label(record), record.step);
        for (key, value) in &record.metrics {
            println!("  {key:<24} {value:.6}");
        }
    }
}

fn phase_label(record: &ganomaly_core::HistoryRecord) -> &'static str {
    match record.phase {
        ganomaly_core::Phase::Train => "Training",
        ganomaly_core::Phase::Validation => "Validation",
        ganomaly_core::Phase::Test => "Test",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from(["ganomaly", "-p", "input/params.json", "-vv"]).unwrap();
        assert_eq!(cli.params, Some(PathBuf::from("input/params.json")));
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
        assert_eq!(cli.log_dir, PathBuf::from("."));
    }

    #[test]
    fn test_stderr_filter() {
        assert_eq!(stderr_filter(0, true), "error");
        assert_eq!(stderr_filter(0, false), "info");
        assert_eq!(stderr_filter(1, false), "debug");
        assert_eq!(stderr_filter(3, true), "trace");
    }
}
