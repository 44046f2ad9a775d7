mod backend;
mod commands;
mod config;
mod dispatcher;
mod error;
mod events;
mod prompts;
mod session;
mod ui;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info_span, Instrument};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::session::SessionManager;

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(version)]
#[command(about = "Chat with an LLM over your document index", long_about = None)]
struct Cli {
    /// Backend to talk to: openai, anthropic, flanxl or flanxxl
    backend: String,

    /// Config file to use instead of ~/.ragchat/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Answer this question and exit (repeatable)
    #[arg(long, value_name = "QUESTION")]
    ask: Vec<String>,
}

const LOG_ENV: &str = "RAGCHAT_LOG";

/// Logs go to a file while the TUI owns the terminal, to stderr otherwise.
fn init_logging(config: &Config, interactive: bool) -> Result<Option<WorkerGuard>> {
    if !interactive {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let log_path = config.log_path();
    let log_dir = log_path
        .parent()
        .context("Log path has no parent directory")?;
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let file_name = log_path
        .file_name()
        .context("Log path has no file name")?;

    let appender = tracing_appender::rolling::never(log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let interactive = cli.ask.is_empty();
    let _log_guard = init_logging(&config, interactive)?;

    let show_sources = config.ui.show_sources;
    let mut manager = SessionManager::new(config);
    let session = match manager.initialize(&cli.backend) {
        Ok(session) => session,
        Err(err) => {
            error!(backend = %cli.backend, error = %err, "failed to start session");
            return Err(err).context("Failed to start chat session");
        }
    };

    let span = info_span!(
        "session",
        id = %session.session_id(),
        backend = %session.backend()
    );

    if interactive {
        ui::run(session, show_sources).instrument(span).await
    } else {
        commands::ask(session, &cli.ask).instrument(span).await
    }
}
