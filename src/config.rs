// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Configuration file handling.
//!
//! Loads daemon, discovery and control settings from TOML.
//! Default path: `/etc/gpu-fanctl/config.toml`

use crate::curve::CurveConfig;
use crate::hwmon;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gpu-fanctl/config.toml";

/// Default tick period in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default number of temperature samples in the smoothing window.
pub const DEFAULT_WINDOW_LENGTH: usize = 30;

/// Failed ticks in a row before a device is given up on.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub hwmon: HwmonConfig,

    #[serde(default)]
    pub control: ControlConfig,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// Tick period for every device, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Whether to restore fans to automatic on daemon exit.
    #[serde(default = "default_true")]
    pub restore_on_exit: bool,

    /// Consecutive failed ticks after which a device task stops.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            restore_on_exit: true,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// Where to look for devices and which ones to accept.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HwmonConfig {
    #[serde(default = "default_drm_root")]
    pub drm_root: PathBuf,

    /// hwmon `name` a device must report to be controlled.
    #[serde(default = "default_accepted_name")]
    pub accepted_name: String,
}

impl Default for HwmonConfig {
    fn default() -> Self {
        Self {
            drm_root: default_drm_root(),
            accepted_name: default_accepted_name(),
        }
    }
}

/// Per-device control parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ControlConfig {
    #[serde(default = "default_window_length")]
    pub window_length: usize,

    #[serde(default)]
    pub curve: CurveConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            window_length: DEFAULT_WINDOW_LENGTH,
            curve: CurveConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load config from a TOML file, or return the default if the file doesn't exist.
pub fn load_config(path: &Path) -> io::Result<Config> {
    if !path.exists() {
        log::info!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)?;
    let config = parse_config(&contents)?;

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Parse config from TOML text.
pub fn parse_config(contents: &str) -> io::Result<Config> {
    toml::from_str(contents).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse config: {e}"),
        )
    })
}

/// Resolve the config file path from CLI arg or default.
pub fn resolve_config_path(cli_path: Option<&str>) -> PathBuf {
    cli_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_true() -> bool {
    true
}

fn default_max_failures() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_FAILURES
}

fn default_drm_root() -> PathBuf {
    PathBuf::from(hwmon::DRM_ROOT)
}

fn default_accepted_name() -> String {
    hwmon::SUPPORTED_DEVICE_NAME.to_string()
}

fn default_window_length() -> usize {
    DEFAULT_WINDOW_LENGTH
}
