//! # lcg-sim
//!
//! Drives the live control gateway with in-memory devices: connects a fleet,
//! routes a burst of control frames, reconnects one device to show lifetime
//! replacement, then shuts everything down gracefully.

#![deny(unsafe_code)]

mod simulation;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use lcg_settings::GatewaySettings;
use tracing::{info, warn};

use crate::simulation::Simulation;

/// How long to wait for connections to become active.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Live control gateway simulator.
#[derive(Parser, Debug)]
#[command(name = "lcg-sim", about = "Live control gateway simulator")]
struct Cli {
    /// Number of simulated devices.
    #[arg(long, default_value = "3")]
    devices: usize,

    /// Shockers registered per device.
    #[arg(long, default_value = "2")]
    shockers: usize,

    /// Control frames to route in the burst.
    #[arg(long, default_value = "20")]
    frames: usize,

    /// Settings file (defaults to `~/.livecontrol/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level filter (overrides settings if specified).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Milliseconds to keep connections open before shutting down.
    #[arg(long, default_value = "200")]
    hold_ms: u64,
}

fn resolve_settings(path: Option<&Path>) -> Result<GatewaySettings> {
    let path = path.map_or_else(lcg_settings::settings_path, Path::to_path_buf);
    lcg_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = resolve_settings(args.settings.as_deref())?;
    let level = args.log_level.as_deref().unwrap_or(&settings.logging.level);
    if args.json_logs {
        lcg_core::logging::init_json_subscriber(level);
    } else {
        lcg_core::logging::init_subscriber(level);
    }

    let sim = Simulation::new(&settings);
    let devices = sim.provision(args.devices, args.shockers);
    let mut handles: Vec<_> = devices.iter().map(|d| sim.connect(d)).collect();
    if !sim.wait_connected(&devices, CONNECT_TIMEOUT).await {
        bail!("devices did not connect within {CONNECT_TIMEOUT:?}");
    }
    info!(
        devices = devices.len(),
        connections = sim.registry.connection_count(),
        "fleet connected"
    );

    let tally = sim.run_burst(&devices, args.frames);
    info!(
        delivered = tally.delivered,
        device_not_found = tally.device_not_found,
        endpoint_not_found = tally.endpoint_not_found,
        rejected = tally.rejected,
        "frame burst routed"
    );

    if let Some(first) = devices.first() {
        match sim.reconnect(first, CONNECT_TIMEOUT).await {
            Some(handle) => handles.push(handle),
            None => warn!(device_id = %first.id, "reconnect did not take over in time"),
        }
        let followup = sim.run_burst(std::slice::from_ref(first), 1);
        info!(delivered = followup.delivered, "frame routed after reconnect");
    }

    tokio::time::sleep(Duration::from_millis(args.hold_ms)).await;

    let report = sim
        .shutdown
        .graceful_shutdown(&sim.registry, handles, settings.gateway.shutdown_timeout())
        .await;
    let transmitted: u64 = devices.iter().map(simulation::SimulatedDevice::transmitted).sum();
    info!(
        disposed = report.disposed,
        completed = report.completed,
        aborted = report.aborted,
        transmitted,
        "simulation finished"
    );
    Ok(())
}
