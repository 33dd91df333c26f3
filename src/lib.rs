// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! GPU fan control over hwmon sysfs.
//!
//! Temperatures are smoothed with an exponentially weighted sample window,
//! mapped through a linear fan curve, and written back as PWM duty values.

pub mod config;
pub mod control;
pub mod curve;
pub mod device;
pub mod error;
pub mod hwmon;
pub mod timeseries;

pub use error::{FanError, Result};
