// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Per-device control loop.
//!
//! Every supported device runs [`run_device`] in its own task. The task owns
//! its device outright; the only thing shared with the rest of the daemon is
//! the shutdown flag, which is checked between ticks.

use crate::config::DaemonConfig;
use crate::device::ControlledDevice;
use crate::hwmon::SensorActuatorPort;
use std::io;
use std::ops::{Deref, DerefMut};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::watch;
use tokio::time::{self, Duration, MissedTickBehavior};

/// Shortest tick period a device loop will run with.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Loop parameters shared by all device tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub period: Duration,
    pub restore_on_exit: bool,
    /// 0 disables the limit.
    pub max_consecutive_failures: u32,
}

impl LoopSettings {
    /// Periods below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn from_config(cfg: &DaemonConfig) -> Self {
        let mut period = Duration::from_millis(cfg.poll_interval_ms);
        if period < MIN_POLL_INTERVAL {
            log::warn!(
                "poll_interval_ms = {} is too short, using {}ms",
                cfg.poll_interval_ms,
                MIN_POLL_INTERVAL.as_millis()
            );
            period = MIN_POLL_INTERVAL;
        }
        Self {
            period,
            restore_on_exit: cfg.restore_on_exit,
            max_consecutive_failures: cfg.max_consecutive_failures,
        }
    }
}

/// SIGINT/SIGTERM listeners.
///
/// Register these before any device is engaged: once registered, the
/// signals no longer terminate the process, so teardown always gets to run.
pub struct ShutdownSignals {
    interrupt: Signal,
    terminate: Signal,
}

impl ShutdownSignals {
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Resolve on the next SIGINT or SIGTERM.
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {}
            _ = self.terminate.recv() => {}
        }
    }
}

/// Why a device task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceExit {
    Shutdown,
    /// Manual mode could not be enabled.
    EngageFailed,
    TooManyFailures,
}

/// Keeps a device in manual mode for its lifetime and releases it on drop,
/// including when the owning task unwinds.
struct ManualControl<'a, P: SensorActuatorPort> {
    device: &'a mut ControlledDevice<P>,
    restore: bool,
}

impl<'a, P: SensorActuatorPort> ManualControl<'a, P> {
    fn engage(device: &'a mut ControlledDevice<P>, restore: bool) -> crate::error::Result<Self> {
        device.engage()?;
        Ok(Self { device, restore })
    }
}

impl<P: SensorActuatorPort> Deref for ManualControl<'_, P> {
    type Target = ControlledDevice<P>;

    fn deref(&self) -> &Self::Target {
        self.device
    }
}

impl<P: SensorActuatorPort> DerefMut for ManualControl<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.device
    }
}

impl<P: SensorActuatorPort> Drop for ManualControl<'_, P> {
    fn drop(&mut self) {
        if !self.restore {
            return;
        }
        match self.device.release() {
            Ok(()) => log::info!("[{}] Restored automatic fan control", self.device.id()),
            Err(e) => log::warn!(
                "[{}] Failed to restore automatic control: {e}",
                self.device.id()
            ),
        }
    }
}

/// Tick `device` every `settings.period` until shutdown is signalled or the
/// device keeps failing.
///
/// A tick in progress always completes before shutdown is observed.
pub async fn run_device<P: SensorActuatorPort>(
    mut device: ControlledDevice<P>,
    settings: LoopSettings,
    mut shutdown: watch::Receiver<bool>,
) -> DeviceExit {
    let id = device.id().to_string();

    let mut guard = match ManualControl::engage(&mut device, settings.restore_on_exit) {
        Ok(guard) => guard,
        Err(e) => {
            log::error!("[{id}] Failed to enable manual PWM mode: {e}");
            return DeviceExit::EngageFailed;
        }
    };
    log::info!("[{id}] Control loop started");

    let mut interval = time::interval(settings.period.max(MIN_POLL_INTERVAL));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures: u32 = 0;

    let exit = loop {
        if *shutdown.borrow_and_update() {
            break DeviceExit::Shutdown;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                // A dropped sender counts as shutdown.
                if changed.is_err() {
                    break DeviceExit::Shutdown;
                }
                continue;
            }
            _ = interval.tick() => {}
        }

        match guard.tick() {
            Ok(report) => {
                failures = 0;
                log::debug!(
                    "[{id}] current temperature: {:.1}; average: {:.2}; fan: {:.1}% (duty {})",
                    report.temperature,
                    report.average,
                    report.percent,
                    report.duty
                );
            }
            Err(e) => {
                failures += 1;
                log::warn!("[{id}] Tick failed ({failures} in a row): {e}");
                if settings.max_consecutive_failures > 0
                    && failures >= settings.max_consecutive_failures
                {
                    log::error!("[{id}] Giving up after {failures} consecutive failures");
                    break DeviceExit::TooManyFailures;
                }
            }
        }
    };

    drop(guard);
    log::info!("[{id}] Control loop finished");
    exit
}
