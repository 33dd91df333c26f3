// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Fan curve definition.
//!
//! A curve maps a temperature to a target fan speed in percent. It is a
//! single line between `(min_temp, min_percent)` and `(max_temp, max_percent)`;
//! temperatures outside that domain are clamped to its ends.

use crate::error::{FanError, Result};
use serde::Deserialize;

/// Default lower end of the curve domain, in degrees Celsius.
pub const DEFAULT_MIN_TEMP_C: f64 = 50.0;
/// Default upper end of the curve domain, in degrees Celsius.
pub const DEFAULT_MAX_TEMP_C: f64 = 80.0;
/// Fan speed at or below the lower end, in percent.
pub const DEFAULT_MIN_PERCENT: f64 = 32.0;
/// Fan speed at or above the upper end, in percent.
pub const DEFAULT_MAX_PERCENT: f64 = 100.0;

/// Curve endpoints as they appear in the config file.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct CurveConfig {
    #[serde(default = "default_min_temp")]
    pub min_temp_c: f64,
    #[serde(default = "default_max_temp")]
    pub max_temp_c: f64,
    #[serde(default = "default_min_percent")]
    pub min_percent: f64,
    #[serde(default = "default_max_percent")]
    pub max_percent: f64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            min_temp_c: DEFAULT_MIN_TEMP_C,
            max_temp_c: DEFAULT_MAX_TEMP_C,
            min_percent: DEFAULT_MIN_PERCENT,
            max_percent: DEFAULT_MAX_PERCENT,
        }
    }
}

impl CurveConfig {
    pub fn build(&self) -> Result<FanCurve> {
        FanCurve::new(
            self.min_temp_c,
            self.max_temp_c,
            self.min_percent,
            self.max_percent,
        )
    }
}

/// Linear temperature-to-percent mapping, clamped outside `[min_temp, max_temp]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanCurve {
    min_temp: f64,
    max_temp: f64,
    slope: f64,
    intercept: f64,
}

impl FanCurve {
    /// Build the line through both endpoints.
    ///
    /// An inverted percent range is accepted and yields a falling curve.
    pub fn new(min_temp: f64, max_temp: f64, min_percent: f64, max_percent: f64) -> Result<Self> {
        for (name, value) in [
            ("min_temp_c", min_temp),
            ("max_temp_c", max_temp),
            ("min_percent", min_percent),
            ("max_percent", max_percent),
        ] {
            if !value.is_finite() {
                return Err(FanError::NonFiniteCurveBound { name, value });
            }
        }
        if max_temp <= min_temp {
            return Err(FanError::InvalidDomain {
                min: min_temp,
                max: max_temp,
            });
        }

        let slope = (max_percent - min_percent) / (max_temp - min_temp);
        let intercept = max_percent - slope * max_temp;

        Ok(Self {
            min_temp,
            max_temp,
            slope,
            intercept,
        })
    }

    /// Target fan speed in percent for `temp_c`.
    pub fn evaluate(&self, temp_c: f64) -> f64 {
        let t = temp_c.clamp(self.min_temp, self.max_temp);
        self.slope * t + self.intercept
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Default for FanCurve {
    fn default() -> Self {
        let slope = (DEFAULT_MAX_PERCENT - DEFAULT_MIN_PERCENT) / (DEFAULT_MAX_TEMP_C - DEFAULT_MIN_TEMP_C);
        Self {
            min_temp: DEFAULT_MIN_TEMP_C,
            max_temp: DEFAULT_MAX_TEMP_C,
            slope,
            intercept: DEFAULT_MAX_PERCENT - slope * DEFAULT_MAX_TEMP_C,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_min_temp() -> f64 {
    DEFAULT_MIN_TEMP_C
}

fn default_max_temp() -> f64 {
    DEFAULT_MAX_TEMP_C
}

fn default_min_percent() -> f64 {
    DEFAULT_MIN_PERCENT
}

fn default_max_percent() -> f64 {
    DEFAULT_MAX_PERCENT
}
