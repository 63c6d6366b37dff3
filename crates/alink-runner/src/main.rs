//! alink: serial command adapter for a model railway command station.
//!
//! Serves the binary protocol on stdin/stdout. Process logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use alink_diagnostics::{describe_metrics, install_panic_hook};
use alink_runner::{AdapterConfig, Engine, EngineError, IdleStrategy, Shutdown};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "alink", version, about = "Serial command adapter for a model railway command station")]
struct Cli {
    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override how idle time is shared with scheduled work
    #[arg(long, value_enum)]
    idle_strategy: Option<IdleStrategy>,

    /// Override the idle period in milliseconds
    #[arg(long)]
    idle_period_ms: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<AdapterConfig, EngineError> {
    let mut config = match &cli.config {
        Some(path) => AdapterConfig::load(path)?,
        None => AdapterConfig::default(),
    };
    if let Some(strategy) = cli.idle_strategy {
        config.idle_strategy = strategy;
    }
    if let Some(period) = cli.idle_period_ms {
        config.scheduler_period_ms = period;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(unix)]
fn run(cli: &Cli) -> Result<Shutdown, EngineError> {
    let config = load_config(cli)?;
    tracing::debug!(?config, "Loaded config");

    let transport = alink_runner::StdioTransport::new()?;
    let mut engine = Engine::new(&config, transport)?;
    engine.run()
}

#[cfg(not(unix))]
fn run(_cli: &Cli) -> Result<Shutdown, EngineError> {
    Err(alink_runner::TransportError::Io(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "the stdio link requires a unix platform",
    ))
    .into())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    install_panic_hook();
    describe_metrics();

    match run(&cli) {
        Ok(shutdown) => {
            tracing::info!(?shutdown, "alink stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("alink failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
