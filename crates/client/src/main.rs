//! Chatbot Client
//!
//! Terminal chat client for the newline-delimited chatbot protocol.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use client::config::Config;
use client::console::{self, notice, ConsoleOutput, LineInput, TerminalOutput};
use client::session::{connect, SessionOptions};
use protocol::Endpoint;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Chatbot Client - chat with a chatbot server from the terminal.
#[derive(Parser, Debug)]
#[command(name = "chatbot-client")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Server address (IP address or hostname)
    #[arg(value_name = "ADDRESS")]
    pub address_arg: Option<String>,

    /// Server port
    #[arg(value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port_arg: Option<u16>,

    /// Server address; takes precedence over the positional ADDRESS
    #[arg(short, long, value_name = "ADDRESS")]
    pub address: Option<String>,

    /// Server port; takes precedence over the positional PORT
    #[arg(short, long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Ask for the address and port on the console
    #[arg(short, long)]
    pub interactive: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not clear the screen on start-up
    #[arg(long)]
    pub no_clear: bool,

    /// Seconds to wait for each reply (0 = wait forever)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };
    let overrides = config.apply_env_overrides();
    config.validate()?;

    let _log_guard = init_tracing(&config, cli.verbose)?;
    for applied in &overrides.applied {
        tracing::info!("Override from environment: {}", applied);
    }
    for rejected in &overrides.rejected {
        tracing::warn!("Ignoring environment override {}", rejected);
    }
    tracing::debug!("Configuration: {:?}", config);

    let mut input = LineInput::stdin();
    let mut output = TerminalOutput::stdout();

    if config.console.clear_screen && !cli.no_clear {
        if let Err(e) = console::clear_screen() {
            tracing::warn!("Failed to clear screen: {}", e);
        }
    }

    let endpoint = if cli.interactive {
        let default = resolve_endpoint(&cli, &config)?;
        match console::prompt_endpoint(&mut input, &mut output, &default)
            .await
            .context("Failed to read from console")?
        {
            Some(endpoint) => endpoint,
            None => return Ok(ExitCode::SUCCESS),
        }
    } else {
        resolve_endpoint(&cli, &config)?
    };

    let options = SessionOptions {
        reply_timeout: match cli.timeout {
            Some(secs) => (secs > 0).then(|| Duration::from_secs(secs)),
            None => config.reply_timeout(),
        },
    };

    let session = match connect(&endpoint, config.connect_timeout(), options).await {
        Ok(session) => session,
        Err(e) => {
            tracing::debug!("{:?}", e);
            output.show(&notice::connect_failed(&e));
            return Ok(ExitCode::FAILURE);
        }
    };

    let summary = session.run(&mut input, &mut output).await;
    tracing::debug!(
        turns = summary.turns,
        clean = summary.end.is_clean(),
        "Client exiting"
    );

    Ok(ExitCode::SUCCESS)
}

/// Pick the endpoint from flags, then positionals, then configuration.
fn resolve_endpoint(cli: &Cli, config: &Config) -> anyhow::Result<Endpoint> {
    let host = cli
        .address
        .as_deref()
        .or(cli.address_arg.as_deref())
        .unwrap_or(&config.server.address);
    let port = cli.port.or(cli.port_arg).unwrap_or(config.server.port);

    Endpoint::new(host, port).with_context(|| format!("Invalid server address: {}", host))
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr unless a log file is configured, since stdout carries
/// the conversation. The returned guard must live until exit so buffered
/// file output is flushed.
fn init_tracing(config: &Config, verbose: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log.level.to_lowercase()))
    };

    let Some(path) = &config.log.file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}
