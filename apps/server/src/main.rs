//! AGS Server - standalone headless daemon for AGS.
//!
//! Reads rooms and settings from a YAML config file, live device state from a
//! YAML state file, and logs the device commands the engine decides on.

mod config;
mod signals;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ags_core::{
    bootstrap_services, BootstrappedServices, EventEmitter, LoggingCommandSink,
    LoggingEventEmitter,
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::signals::FileSignalSource;

/// AGS Server - headless multi-room audio orchestration.
#[derive(Parser, Debug)]
#[command(name = "ags-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "AGS_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Live device state file (overrides config file).
    #[arg(short = 's', long, env = "AGS_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// How often to re-read the state file, in milliseconds.
    #[arg(long, default_value_t = 1000, env = "AGS_STATE_POLL_MS")]
    state_poll_ms: u64,

    /// Run one cycle, print a diagnostics report as JSON and exit.
    #[arg(long)]
    diagnostics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("AGS Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(state_file) = args.state_file {
        config.state_file = Some(state_file);
    }

    let topology = config.topology()?;
    log::info!(
        "Configuration: {} room(s), {} source(s), state_file={}",
        topology.rooms().len(),
        topology.sources().len(),
        config
            .state_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    let signals = Arc::new(
        FileSignalSource::open(config.state_file.as_deref())
            .context("Failed to read state file")?,
    );

    let services = bootstrap_services(
        topology,
        config.settings.clone(),
        Arc::clone(&signals) as Arc<dyn ags_core::SignalSource>,
        Arc::new(LoggingCommandSink),
    )
    .context("Failed to bootstrap services")?;
    services
        .event_bridge
        .set_external_emitter(Arc::new(LoggingEventEmitter) as Arc<dyn EventEmitter>);

    log::info!("Services bootstrapped successfully");

    apply_controls(&services, &signals);

    if args.diagnostics {
        services.orchestrator.refresh();
        let report = services.orchestrator.run_diagnostics();
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        return Ok(());
    }

    services.start_background_tasks();
    spawn_state_watcher(
        services.clone(),
        Arc::clone(&signals),
        Duration::from_millis(args.state_poll_ms.max(1)),
        services.cancel_token.clone(),
    );

    log::info!("Background tasks started");

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");
    services.shutdown().await;

    Ok(())
}

/// Pushes room switches and the manual toggle from the state file into the
/// control surface.
fn apply_controls(services: &BootstrappedServices, signals: &FileSignalSource) {
    let state = signals.snapshot();
    let orchestrator = &services.orchestrator;

    if let Some(on) = state.manual_toggle {
        if orchestrator.manual_toggle() != on {
            orchestrator.set_manual_toggle(on);
        }
    }
    if let Some(active_rooms) = state.active_rooms {
        for room in orchestrator.topology().rooms() {
            let wanted = active_rooms.contains(&room.name);
            if orchestrator.room_switch(&room.name) == wanted {
                continue;
            }
            if let Err(e) = orchestrator.set_room_active(&room.name, wanted) {
                log::warn!("Failed to switch room '{}': {}", room.name, e);
            }
        }
        for name in active_rooms
            .iter()
            .filter(|name| orchestrator.topology().room(name).is_none())
        {
            log::warn!("State file names unknown room '{}'", name);
        }
    }
}

/// Re-reads the state file periodically and wakes the sync loop on change.
fn spawn_state_watcher(
    services: BootstrappedServices,
    signals: Arc<FileSignalSource>,
    period: Duration,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match signals.reload() {
                Ok(true) => {
                    log::debug!("State file changed");
                    apply_controls(&services, &signals);
                    services.orchestrator.notify_changed();
                }
                Ok(false) => {}
                Err(e) => log::warn!("{:#}", e),
            }
        }
    });
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
