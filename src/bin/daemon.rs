// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! gpu-fanctl-daemon: discovers supported GPUs, runs one curve-driven control
//! loop per device, and hands fans back to automatic control on shutdown.

use clap::Parser;
use gpu_fanctl::config::{self, Config};
use gpu_fanctl::control::{self, DeviceExit, LoopSettings, ShutdownSignals};
use gpu_fanctl::device::ControlledDevice;
use gpu_fanctl::hwmon::{self, SensorActuatorPort};
use tokio::sync::watch;
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "gpu-fanctl-daemon", about = "GPU fan curve daemon for hwmon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the tick period, in milliseconds.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,

    /// Print supported devices and exit.
    #[arg(short, long)]
    list: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = config::resolve_config_path(cli.config.as_deref());
    let mut cfg = config::load_config(&config_path).unwrap_or_else(|e| {
        log::warn!("Could not load config: {e}, using defaults");
        Config::default()
    });
    if let Some(ms) = cli.interval_ms {
        cfg.daemon.poll_interval_ms = ms;
    }

    // Installed before any fan is switched to manual, so a signal can never
    // kill the process with a device still engaged.
    let mut signals = ShutdownSignals::register()?;

    let ports = hwmon::discover_supported(&cfg.hwmon.drm_root, &cfg.hwmon.accepted_name);

    if cli.list {
        for port in &ports {
            println!("{}\t{}", port.id(), port.path().display());
        }
        return Ok(());
    }

    if ports.is_empty() {
        log::warn!("There are no supported devices");
    }

    let settings = LoopSettings::from_config(&cfg.daemon);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    for port in ports {
        let id = port.id();
        match ControlledDevice::new(port, &cfg.control) {
            Ok(device) => {
                tasks.spawn(control::run_device(device, settings, shutdown_rx.clone()));
            }
            Err(e) => log::error!("[{id}] Failed to initialize device: {e}"),
        }
    }

    log::info!("Controlling {} device(s)", tasks.len());

    signals.recv().await;
    log::info!("Received shutdown signal");
    shutdown_tx.send_replace(true);

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(DeviceExit::Shutdown) => {}
            Ok(exit) => log::debug!("Device task had already stopped: {exit:?}"),
            Err(e) => log::error!("Device task aborted: {e}"),
        }
    }

    log::info!("Daemon shutting down");
    Ok(())
}
