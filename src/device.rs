// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! A single controlled fan and its per-tick update.
//!
//! Each tick reads the temperature, pushes it into the sample window, maps
//! the smoothed value through the fan curve and writes the resulting duty.

use crate::config::ControlConfig;
use crate::curve::FanCurve;
use crate::error::{FanError, Result};
use crate::hwmon::{PwmMode, SensorActuatorPort};
use crate::timeseries::WeightedSampleWindow;

/// Whether the daemon currently owns the fan's PWM output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Manual mode requested, ticks drive the duty value.
    Active,
    /// Hardware (automatic) control.
    Released,
}

/// Values computed during one tick, for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub temperature: f64,
    pub average: f64,
    pub percent: f64,
    pub duty: u32,
}

pub struct ControlledDevice<P> {
    port: P,
    id: String,
    pwm_min: u32,
    pwm_max: u32,
    window: WeightedSampleWindow,
    curve: FanCurve,
    state: ControlState,
}

impl<P: SensorActuatorPort> ControlledDevice<P> {
    /// Query duty bounds and a seed temperature from `port`.
    ///
    /// Does not touch the PWM mode; call [`engage`](Self::engage) before ticking.
    pub fn new(port: P, cfg: &ControlConfig) -> Result<Self> {
        let curve = cfg.curve.build()?;
        let pwm_min = port.pwm_min()?;
        let pwm_max = port.pwm_max()?;
        if pwm_min > pwm_max {
            return Err(FanError::InvalidDutyRange {
                min: pwm_min,
                max: pwm_max,
            });
        }

        let seed = finite(port.temperature()?)?;
        let window = WeightedSampleWindow::new(cfg.window_length, seed)?;

        Ok(Self {
            id: port.id(),
            port,
            pwm_min,
            pwm_max,
            window,
            curve,
            state: ControlState::Released,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn pwm_range(&self) -> (u32, u32) {
        (self.pwm_min, self.pwm_max)
    }

    pub fn window(&self) -> &WeightedSampleWindow {
        &self.window
    }

    /// Switch the fan to manual PWM so written duty values take effect.
    pub fn engage(&mut self) -> Result<()> {
        self.port.set_mode(PwmMode::Manual)?;
        self.state = ControlState::Active;
        Ok(())
    }

    /// Hand the fan back to automatic control. No-op unless active.
    pub fn release(&mut self) -> Result<()> {
        if self.state == ControlState::Released {
            return Ok(());
        }
        // Marked released first so a failed write is not retried from Drop paths.
        self.state = ControlState::Released;
        self.port.set_mode(PwmMode::Automatic)
    }

    /// Run one control step.
    ///
    /// Non-finite readings are rejected before they reach the window.
    pub fn tick(&mut self) -> Result<TickReport> {
        let temperature = finite(self.port.temperature()?)?;
        self.window.push(temperature);

        let average = self.window.average();
        let percent = self.curve.evaluate(average);
        let duty = percent_to_duty(self.pwm_min, self.pwm_max, percent);
        self.port.set_duty(duty)?;

        Ok(TickReport {
            temperature,
            average,
            percent,
            duty,
        })
    }
}

/// Scale `percent` onto the duty span and clamp into `[pwm_min, pwm_max]`.
///
/// `pwm_min` bounds the result but is not added as an offset, so on hardware
/// with a non-zero minimum the low end of the curve saturates at `pwm_min`.
/// A NaN percent maps to `pwm_max`.
///
/// Callers must ensure `pwm_min <= pwm_max`; [`ControlledDevice::new`] does.
pub(crate) fn percent_to_duty(pwm_min: u32, pwm_max: u32, percent: f64) -> u32 {
    debug_assert!(pwm_min <= pwm_max);
    if percent.is_nan() {
        return pwm_max;
    }
    let span = f64::from(pwm_max.saturating_sub(pwm_min));
    let duty = (span * percent / 100.0).round();
    duty.clamp(f64::from(pwm_min), f64::from(pwm_max)) as u32
}

fn finite(temp: f64) -> Result<f64> {
    if temp.is_finite() {
        Ok(temp)
    } else {
        Err(FanError::NonFiniteReading(temp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveConfig;
    use crate::hwmon::fake::FakePort;

    fn control(window_length: usize) -> ControlConfig {
        ControlConfig {
            window_length,
            curve: CurveConfig::default(),
        }
    }

    #[test]
    fn test_percent_to_duty() {
        assert_eq!(percent_to_duty(0, 255, 50.0), 128);
        assert_eq!(percent_to_duty(0, 255, 0.0), 0);
        assert_eq!(percent_to_duty(0, 255, 100.0), 255);
        assert_eq!(percent_to_duty(0, 255, 150.0), 255);
        assert_eq!(percent_to_duty(0, 255, -20.0), 0);
    }

    #[test]
    fn test_percent_to_duty_respects_nonzero_min() {
        assert_eq!(percent_to_duty(10, 200, 0.0), 10);
        assert_eq!(percent_to_duty(10, 200, 3.0), 10);
        assert_eq!(percent_to_duty(10, 200, 50.0), 95);
        assert_eq!(percent_to_duty(10, 200, 100.0), 190);
        assert_eq!(percent_to_duty(10, 200, 150.0), 200);
        assert_eq!(percent_to_duty(42, 42, 70.0), 42);
    }

    #[test]
    fn test_percent_to_duty_non_finite_stays_in_bounds() {
        assert_eq!(percent_to_duty(10, 200, f64::NAN), 200);
        assert_eq!(percent_to_duty(10, 200, f64::INFINITY), 200);
        assert_eq!(percent_to_duty(10, 200, f64::NEG_INFINITY), 10);
    }

    #[test]
    fn test_infinite_curve_bound_rejected_before_any_write() {
        let cfg: ControlConfig = toml::from_str("window_length = 3\n[curve]\nmax_temp_c = inf").unwrap();
        let port = FakePort::new(10, 200, 70.0);

        assert!(matches!(
            ControlledDevice::new(port.clone(), &cfg),
            Err(FanError::NonFiniteCurveBound { .. })
        ));
        assert!(port.duties().is_empty());
    }

    #[test]
    fn test_new_seeds_window() {
        let port = FakePort::new(0, 255, 63.5);
        let device = ControlledDevice::new(port.clone(), &control(30)).unwrap();

        assert_eq!(device.pwm_range(), (0, 255));
        assert_eq!(device.window().len(), 30);
        assert!(device.window().samples().all(|s| s == 63.5));
        assert_eq!(device.state(), ControlState::Released);
        // Construction does not write anything.
        assert!(port.modes().is_empty());
        assert!(port.duties().is_empty());
    }

    #[test]
    fn test_new_rejects_bad_input() {
        let inverted = FakePort::new(200, 10, 50.0);
        assert!(matches!(
            ControlledDevice::new(inverted, &control(30)),
            Err(FanError::InvalidDutyRange { min: 200, max: 10 })
        ));

        let nan_seed = FakePort::new(0, 255, f64::NAN);
        assert!(matches!(
            ControlledDevice::new(nan_seed, &control(30)),
            Err(FanError::NonFiniteReading(_))
        ));

        let port = FakePort::new(0, 255, 50.0);
        assert!(matches!(
            ControlledDevice::new(port, &control(0)),
            Err(FanError::InvalidCapacity)
        ));

        let port = FakePort::new(0, 255, 50.0);
        let mut cfg = control(30);
        cfg.curve.max_temp_c = cfg.curve.min_temp_c;
        assert!(matches!(
            ControlledDevice::new(port, &cfg),
            Err(FanError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn test_ticks_rise_toward_upper_clamp() {
        let port = FakePort::new(10, 200, 70.0);
        let mut device = ControlledDevice::new(port.clone(), &control(3)).unwrap();
        device.engage().unwrap();
        port.queue_temps(&[70.0, 75.0, 80.0]);

        let reports: Vec<TickReport> = (0..3).map(|_| device.tick().unwrap()).collect();
        let duties = port.duties();

        assert_eq!(duties.len(), 3);
        assert!(duties.windows(2).all(|w| w[0] <= w[1]), "{duties:?}");
        assert!(reports.windows(2).all(|w| w[0].average < w[1].average));
        for (report, duty) in reports.iter().zip(&duties) {
            assert_eq!(report.duty, *duty);
            assert!((10..=200).contains(duty));
        }
        // First tick: uniform 70 window, curve at 70C is 77.33%.
        assert_eq!(duties[0], percent_to_duty(10, 200, 32.0 + 68.0 * 20.0 / 30.0));
    }

    #[test]
    fn test_tick_rejects_non_finite_reading() {
        let port = FakePort::new(0, 255, 60.0);
        let mut device = ControlledDevice::new(port.clone(), &control(5)).unwrap();
        port.queue_temps(&[f64::NAN, f64::INFINITY, 61.0]);

        assert!(matches!(device.tick(), Err(FanError::NonFiniteReading(_))));
        assert!(matches!(device.tick(), Err(FanError::NonFiniteReading(_))));
        assert!(device.window().samples().all(|s| s == 60.0));
        assert!(port.duties().is_empty());

        let report = device.tick().unwrap();
        assert!(report.average.is_finite());
        assert_eq!(port.duties().len(), 1);
    }

    #[test]
    fn test_tick_propagates_read_failure() {
        let port = FakePort::new(0, 255, 60.0);
        let mut device = ControlledDevice::new(port.clone(), &control(5)).unwrap();
        port.set_fail_reads(true);

        assert!(matches!(device.tick(), Err(FanError::PortRead { .. })));
        assert!(port.duties().is_empty());
    }

    #[test]
    fn test_release_runs_once() {
        let port = FakePort::new(0, 255, 60.0);
        let mut device = ControlledDevice::new(port.clone(), &control(5)).unwrap();

        // Nothing to restore before engaging.
        device.release().unwrap();
        assert!(port.modes().is_empty());

        device.engage().unwrap();
        assert_eq!(device.state(), ControlState::Active);
        device.release().unwrap();
        device.release().unwrap();

        assert_eq!(port.modes(), vec![PwmMode::Manual, PwmMode::Automatic]);
        assert_eq!(device.state(), ControlState::Released);
    }
}
