use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console_mux::InputMode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::prelude::*;

mod config;
mod simulator;
mod tui;

use crate::config::{FileConfig, RouteWatchConfig};
use crate::simulator::SimulatorConfig;

#[derive(Parser)]
#[command(name = "routewatch")]
#[command(about = "Live operator console for a routed network")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.routewatch)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the console (the default)
    Console(ConsoleArgs),

    /// Serve a simulated network for the console to connect to
    Simulate(SimulateArgs),
}

#[derive(Parser, Default)]
struct ConsoleArgs {
    /// Backend host[:port], replacing the origin's host
    #[arg(long)]
    host: Option<String>,

    /// Origin the channel URL is derived from (https selects wss)
    #[arg(long)]
    origin: Option<String>,

    /// How typed input is sent
    #[arg(long, value_enum)]
    input_mode: Option<InputMode>,
}

#[derive(Parser)]
struct SimulateArgs {
    /// Address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// Number of simulated nodes
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Milliseconds between liveness changes
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Publish per-node routing tables instead of graphs
    #[arg(long)]
    legacy: bool,
}

impl ConsoleArgs {
    fn apply(self, fc: &mut FileConfig) {
        if let Some(origin) = self.origin {
            fc.endpoint.origin = origin;
        }
        if self.host.is_some() {
            fc.endpoint.host = self.host;
        }
        if let Some(mode) = self.input_mode {
            fc.input.mode = mode;
        }
    }
}

impl SimulateArgs {
    fn into_config(self, fc: &FileConfig) -> SimulatorConfig {
        SimulatorConfig {
            bind: self.bind.unwrap_or_else(|| fc.simulator.bind.clone()),
            nodes: self.nodes.unwrap_or(fc.simulator.nodes),
            tick: Duration::from_millis(self.tick_ms.unwrap_or(fc.simulator.tick_ms).max(1)),
            legacy: self.legacy,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RouteWatchConfig::new(cli.data_dir.clone())?;
    let mut fc = config.load()?;

    match cli.command {
        Some(Commands::Simulate(args)) => {
            init_logging(cli.debug, None)?;
            simulator::run(args.into_config(&fc)).await
        }
        Some(Commands::Console(args)) => {
            args.apply(&mut fc);
            run_console(&config, &fc, cli.debug).await
        }
        None => run_console(&config, &fc, cli.debug).await,
    }
}

async fn run_console(config: &RouteWatchConfig, fc: &FileConfig, debug: bool) -> Result<()> {
    // The console owns the screen, so logs go to a file.
    init_logging(debug, Some(&config.console_log_path()))?;
    info!(
        origin = %fc.endpoint.origin,
        host = ?fc.endpoint.host,
        mode = fc.input.mode.as_str(),
        "Starting routewatch console"
    );
    tui::run(fc).await
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let default_directive = if debug {
        "routewatch=debug,console_mux=debug,info"
    } else {
        "routewatch=info,console_mux=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::sync::Mutex::new(file))
                        .with_ansi(false),
                )
                .with(env_filter)
                .try_init()
                .context("Failed to initialize logging")?;
        }
        None => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(env_filter)
                .try_init()
                .context("Failed to initialize logging")?;
        }
    }
    Ok(())
}
