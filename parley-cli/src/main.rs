//! Parley CLI - command-line frontend for the whitelisted chat relay.
//!
//! Runs single messages through the relay and exposes the whitelist and
//! memory administration commands.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::prelude::*;

use commands::{Commands, handle_command};
use parley_core::Config;
use parley_core::config::Rotation;

/// Parley - whitelisted chat relay for an OpenAI-compatible completion service
#[derive(Parser)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a custom config file (overrides default search locations)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Default tracing directives enabling info-level logs for this crate and parley-core.
const DEFAULT_DIRECTIVES: &[&str] = &["parley_cli=info", "parley_core=info"];

/// Build the default `EnvFilter`: RUST_LOG (if set) plus our default directives.
fn default_env_filter() -> Result<tracing_subscriber::EnvFilter> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in DEFAULT_DIRECTIVES {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr so command output on stdout stays clean. With a
/// `[logging]` section a rolling file layer is added; the returned guard
/// flushes it and must be held until exit.
fn init_tracing(config: &Config) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(lc) = config.logging.as_ref() else {
        tracing_subscriber::fmt()
            .with_env_filter(default_env_filter()?)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    if let Err(e) = std::fs::create_dir_all(&lc.directory) {
        eprintln!(
            "Warning: Failed to create log directory '{}': {}. Logging to stderr only.",
            lc.directory, e
        );
        tracing_subscriber::fmt()
            .with_env_filter(default_env_filter()?)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let rotation = match lc.rotation {
        Rotation::Daily => tracing_appender::rolling::Rotation::DAILY,
        Rotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
        Rotation::Never => tracing_appender::rolling::Rotation::NEVER,
    };

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix("parley")
        .filename_suffix("log")
        .max_log_files(lc.max_files)
        .build(&lc.directory)
        .context("Failed to create rolling file appender")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(default_env_filter()?)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: tracing setup depends on the [logging] section.
    let config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    let _guard = init_tracing(&config)?;
    tracing::debug!(database = ?config.database_url(), "Starting parley");

    handle_command(args.command, &config).await
}
