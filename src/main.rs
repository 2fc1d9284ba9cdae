use clap::Parser;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warden::config::WardenConfig;
use warden::error::{Result, WardenError};
use warden::output;
use warden::process::Supervisor;

/// Warden - keepalive supervisor for a webhook worker service
#[derive(Parser)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker executable (required unless --config is given)
    command: Option<PathBuf>,

    /// Port the worker binds to
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum consecutive failed restart attempts
    #[arg(long)]
    max_restarts: Option<u32>,

    /// Seconds between periodic health probes
    #[arg(long)]
    check_interval: Option<u64>,

    /// Arguments passed to the worker
    #[arg(last = true)]
    worker_args: Vec<String>,
}

fn load_config(args: &Args) -> Result<WardenConfig> {
    let mut config = match &args.config {
        Some(path) => WardenConfig::from_file(path)?,
        None => {
            let command = args.command.clone().ok_or_else(|| {
                WardenError::ConfigError(
                    "Either a worker command or --config is required".to_string(),
                )
            })?;
            WardenConfig::for_command(command, args.worker_args.clone())
        }
    };

    config.apply_env_overrides()?;

    if let Some(port) = args.port {
        config.worker.port = port;
    }
    if let Some(max_restarts) = args.max_restarts {
        config.supervisor.max_restarts = max_restarts;
    }
    if let Some(check_interval) = args.check_interval {
        config.supervisor.check_interval_secs = check_interval;
    }

    config.validate()?;
    Ok(config)
}

/// SIGINT and SIGTERM both flip the shutdown flag; the handler task only
/// sends on the channel, the supervisor does the actual teardown.
fn setup_signal_handlers() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
            }
        }

        let _ = tx.send(true);
    });

    rx
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let shutdown_rx = setup_signal_handlers();
    let (relay_tx, _printer) = output::stdout_printer();

    let mut supervisor = Supervisor::new(config, relay_tx, shutdown_rx);
    supervisor.run().await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}
