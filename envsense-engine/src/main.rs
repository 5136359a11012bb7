//! EnvSense Fusion Engine - Main entry point
//!
//! `run` starts a session fed by JSON-lines observations on stdin and prints
//! engine events as JSON lines on stdout. The other subcommands inspect or
//! edit the persisted logs and settings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use envsense_common::events::{EventBus, LogStream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use envsense_engine::clock::SystemClock;
use envsense_engine::config::{DataPaths, EngineConfig};
use envsense_engine::producers::script::Observation;
use envsense_engine::sinks::{CsvFileLog, Feature, LogSink, SettingsStore, TomlSettingsStore, TracingAlertSink};
use envsense_engine::{EngineDeps, FusionEngine, Producers, Session, SharedState};

/// Command-line arguments for envsense-engine
#[derive(Parser, Debug)]
#[command(name = "envsense-engine")]
#[command(about = "Environment fusion and mismatch engine")]
#[command(version)]
struct Args {
    /// Path to config.toml
    #[arg(short, long, env = "ENVSENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Data folder for logs and settings
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a session fed by JSON-lines observations on stdin (default)
    Run,
    /// Print a log stream (header excluded)
    Dump { stream: String },
    /// Delete a log stream
    Clear { stream: String },
    /// Persist the manual environment; omit the name to clear it
    SetManual { name: Option<String> },
    /// Turn a feature on or off
    Toggle { feature: String, state: Switch },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Logs go to stderr; stdout carries event output
    let default_filter = format!(
        "envsense_engine={level},envsense_common={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let data_dir = config.resolve_data_dir(args.data_dir.as_deref());
    let paths = DataPaths::new(&data_dir);
    info!("Data folder: {}", data_dir.display());

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config, paths).await,
        Command::Dump { stream } => {
            let log = CsvFileLog::new(paths);
            for line in log.read_back(parse_stream(&stream)?)? {
                println!("{}", line);
            }
            Ok(())
        }
        Command::Clear { stream } => {
            let stream = parse_stream(&stream)?;
            CsvFileLog::new(paths).clear(stream)?;
            info!("Cleared {} log", stream);
            Ok(())
        }
        Command::SetManual { name } => {
            let settings = TomlSettingsStore::open(paths.settings_file())?;
            settings.set_manual_selection(name.as_deref())?;
            info!("Manual environment set to {:?}", name);
            Ok(())
        }
        Command::Toggle { feature, state } => {
            let feature = Feature::from_name(&feature).ok_or_else(|| anyhow!("Unknown feature: {}", feature))?;
            let settings = TomlSettingsStore::open(paths.settings_file())?;
            settings.set_feature(feature, matches!(state, Switch::On))?;
            info!("{} = {}", feature.key(), matches!(state, Switch::On));
            Ok(())
        }
    }
}

fn parse_stream(name: &str) -> Result<LogStream> {
    LogStream::from_name(name).ok_or_else(|| anyhow!("Unknown log stream: {} (automatic, manual, combined)", name))
}

async fn run(config: EngineConfig, paths: DataPaths) -> Result<()> {
    let settings = TomlSettingsStore::open(paths.settings_file()).context("Failed to open settings")?;
    let events = Arc::new(EventBus::new(config.event_bus_capacity));

    let engine = Arc::new(FusionEngine::new(
        config,
        EngineDeps {
            state: Arc::new(SharedState::new()),
            log: Arc::new(CsvFileLog::new(paths)),
            alerts: Arc::new(TracingAlertSink),
            settings: Arc::new(settings),
            events: events.clone(),
            clock: Arc::new(SystemClock),
        },
    ));

    let session = Session::start(engine.clone(), Producers::default()).await;

    // Event printer
    let mut rx = events.subscribe();
    let cancel = session.cancellation_token();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => println!("{}", json),
                        Err(e) => warn!("Failed to serialize event: {}", e),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event printer lagged, {} event(s) dropped", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => match Observation::parse(&line) {
                    Ok(Some(observation)) => observation.apply(&engine).await,
                    Ok(None) => {}
                    Err(e) => warn!("{}", e),
                },
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    break;
                }
            },
        }
    }

    session.shutdown().await;
    if let Err(e) = printer.await {
        warn!("Event printer ended abnormally: {}", e);
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
