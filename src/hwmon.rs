// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! hwmon sysfs discovery and control.
//!
//! Scans `/sys/class/drm/card*/device/hwmon/hwmon*` for GPU hwmon entries
//! and exposes each one through [`SensorActuatorPort`], the boundary the
//! control core reads temperatures from and writes PWM values to.

use crate::error::{FanError, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default DRM class directory scanned for GPU cards.
pub const DRM_ROOT: &str = "/sys/class/drm";

/// hwmon driver name of the GPUs this daemon controls.
pub const SUPPORTED_DEVICE_NAME: &str = "amdgpu";

const NAME_EP: &str = "name";
const TEMP_EP: &str = "temp1_input";
const PWM_EP: &str = "pwm1";
const PWM_ENABLE_EP: &str = "pwm1_enable";
const PWM_MIN_EP: &str = "pwm1_min";
const PWM_MAX_EP: &str = "pwm1_max";

// ---------------------------------------------------------------------------
// Port interface
// ---------------------------------------------------------------------------

/// PWM control mode, encoded as the `pwmN_enable` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmMode {
    Manual = 1,
    Automatic = 2,
}

impl PwmMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PwmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmMode::Manual => write!(f, "manual"),
            PwmMode::Automatic => write!(f, "automatic"),
        }
    }
}

/// Temperature source and PWM sink for one fan controller.
pub trait SensorActuatorPort {
    /// Short identifier used in log lines.
    fn id(&self) -> String;

    /// Driver name reported by the device.
    fn name(&self) -> Result<String>;

    fn pwm_min(&self) -> Result<u32>;

    fn pwm_max(&self) -> Result<u32>;

    /// Current temperature in degrees Celsius.
    fn temperature(&self) -> Result<f64>;

    /// Write a duty value already clamped to `[pwm_min, pwm_max]`.
    fn set_duty(&mut self, duty: u32) -> Result<()>;

    fn set_mode(&mut self, mode: PwmMode) -> Result<()>;
}

// ---------------------------------------------------------------------------
// sysfs implementation
// ---------------------------------------------------------------------------

/// A single hwmon directory, e.g. `/sys/class/drm/card0/device/hwmon/hwmon3`.
#[derive(Debug, Clone)]
pub struct HwmonPort {
    dir: PathBuf,
}

impl HwmonPort {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn read_ep(&self, ep: &str) -> Result<String> {
        let path = self.dir.join(ep);
        fs::read_to_string(&path)
            .map(|s| s.trim().to_string())
            .map_err(|source| FanError::PortRead { path, source })
    }

    fn parse_ep<T: std::str::FromStr>(&self, ep: &str) -> Result<T> {
        let value = self.read_ep(ep)?;
        value.parse::<T>().map_err(|_| FanError::Parse {
            path: self.dir.join(ep),
            value,
        })
    }

    fn write_ep(&self, ep: &str, value: impl fmt::Display) -> Result<()> {
        let path = self.dir.join(ep);
        fs::write(&path, format!("{value}")).map_err(|source| FanError::PortWrite { path, source })
    }
}

impl SensorActuatorPort for HwmonPort {
    fn id(&self) -> String {
        // card0/device/hwmon/hwmon3 -> card0/hwmon3
        let hwmon = self.dir.file_name().map(|s| s.to_string_lossy().to_string());
        let card = self
            .dir
            .ancestors()
            .nth(3)
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().to_string());
        match (card, hwmon) {
            (Some(card), Some(hwmon)) => format!("{card}/{hwmon}"),
            _ => self.dir.display().to_string(),
        }
    }

    fn name(&self) -> Result<String> {
        self.read_ep(NAME_EP)
    }

    fn pwm_min(&self) -> Result<u32> {
        self.parse_ep(PWM_MIN_EP)
    }

    fn pwm_max(&self) -> Result<u32> {
        self.parse_ep(PWM_MAX_EP)
    }

    fn temperature(&self) -> Result<f64> {
        let millic: f64 = self.parse_ep(TEMP_EP)?;
        Ok(millic / 1000.0)
    }

    fn set_duty(&mut self, duty: u32) -> Result<()> {
        self.write_ep(PWM_EP, duty)
    }

    fn set_mode(&mut self, mode: PwmMode) -> Result<()> {
        self.write_ep(PWM_ENABLE_EP, mode.code())?;
        log::info!("[{}] PWM mode changed to {mode}", self.id());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Whether a device reporting `name` should be controlled.
pub fn is_supported(name: &str, accepted: &str) -> bool {
    name == accepted
}

/// List every `card<N>/device/hwmon/hwmon<M>` directory under `drm_root`.
///
/// Enumeration errors yield an empty list.
pub fn list_hwmon(drm_root: &Path) -> Vec<HwmonPort> {
    let Ok(cards) = fs::read_dir(drm_root) else {
        log::warn!("Cannot read {}, no devices found", drm_root.display());
        return Vec::new();
    };

    let mut dirs = Vec::new();
    for card in cards.flatten() {
        let card_name = card.file_name().to_string_lossy().to_string();
        // Skips connector entries such as card0-DP-1.
        if !is_numbered(&card_name, "card") {
            continue;
        }

        let Ok(hwmons) = fs::read_dir(card.path().join("device").join("hwmon")) else {
            continue;
        };
        for hwmon in hwmons.flatten() {
            if is_numbered(&hwmon.file_name().to_string_lossy(), "hwmon") {
                dirs.push(hwmon.path());
            }
        }
    }

    dirs.sort();
    dirs.into_iter().map(HwmonPort::new).collect()
}

/// Scan `drm_root` and keep only devices named `accepted`.
pub fn discover_supported(drm_root: &Path, accepted: &str) -> Vec<HwmonPort> {
    let mut supported = Vec::new();

    for port in list_hwmon(drm_root) {
        let name = match port.name() {
            Ok(name) => name,
            Err(e) => {
                log::warn!("Skipping {}: {e}", port.id());
                continue;
            }
        };

        if is_supported(&name, accepted) {
            log::info!("Found supported device: {name} ({})", port.id());
            supported.push(port);
        } else {
            log::info!("Found unsupported device: {name} ({})", port.id());
        }
    }

    supported
}

fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

// ---------------------------------------------------------------------------
// In-memory port for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Everything a [`FakePort`] has been asked to do, plus its scripted readings.
    #[derive(Debug, Default)]
    pub struct FakeState {
        pub temps: VecDeque<f64>,
        /// Returned once `temps` runs dry.
        pub last_temp: f64,
        pub fail_reads: bool,
        pub panic_on_duty: bool,
        pub duties: Vec<u32>,
        pub modes: Vec<PwmMode>,
    }

    /// Cloneable handle; clones share state so tests can inspect a port
    /// after it has been moved into a device or task.
    #[derive(Debug, Clone)]
    pub struct FakePort {
        pub name: String,
        pub pwm_min: u32,
        pub pwm_max: u32,
        pub state: Arc<Mutex<FakeState>>,
    }

    impl FakePort {
        pub fn new(pwm_min: u32, pwm_max: u32, temp: f64) -> Self {
            Self {
                name: SUPPORTED_DEVICE_NAME.to_string(),
                pwm_min,
                pwm_max,
                state: Arc::new(Mutex::new(FakeState {
                    last_temp: temp,
                    ..FakeState::default()
                })),
            }
        }

        pub fn queue_temps(&self, temps: &[f64]) {
            self.state.lock().unwrap().temps.extend(temps);
        }

        pub fn duties(&self) -> Vec<u32> {
            self.state.lock().unwrap().duties.clone()
        }

        pub fn modes(&self) -> Vec<PwmMode> {
            self.state.lock().unwrap().modes.clone()
        }

        pub fn set_fail_reads(&self, fail: bool) {
            self.state.lock().unwrap().fail_reads = fail;
        }
    }

    impl SensorActuatorPort for FakePort {
        fn id(&self) -> String {
            "fake0".to_string()
        }

        fn name(&self) -> Result<String> {
            Ok(self.name.clone())
        }

        fn pwm_min(&self) -> Result<u32> {
            Ok(self.pwm_min)
        }

        fn pwm_max(&self) -> Result<u32> {
            Ok(self.pwm_max)
        }

        fn temperature(&self) -> Result<f64> {
            let mut st = self.state.lock().unwrap();
            if st.fail_reads {
                return Err(FanError::PortRead {
                    path: PathBuf::from("fake0").join(TEMP_EP),
                    source: io::Error::other("sensor unavailable"),
                });
            }
            if let Some(t) = st.temps.pop_front() {
                st.last_temp = t;
            }
            Ok(st.last_temp)
        }

        fn set_duty(&mut self, duty: u32) -> Result<()> {
            let mut st = self.state.lock().unwrap();
            if st.panic_on_duty {
                // Unlock first so the mutex is not poisoned for later inspection.
                drop(st);
                panic!("injected panic while writing duty {duty}");
            }
            st.duties.push(duty);
            Ok(())
        }

        fn set_mode(&mut self, mode: PwmMode) -> Result<()> {
            self.state.lock().unwrap().modes.push(mode);
            Ok(())
        }
    }
}
