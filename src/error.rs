// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Error types for the fan control core and its hwmon boundary.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, FanError>;

#[derive(Error, Debug)]
pub enum FanError {
    /// Sample window constructed with zero capacity.
    #[error("sample window length must be at least 1")]
    InvalidCapacity,

    /// Fan curve constructed with an empty or inverted temperature domain.
    #[error("invalid curve domain: max temperature {max}°C must exceed min temperature {min}°C")]
    InvalidDomain { min: f64, max: f64 },

    /// Curve endpoint was NaN or infinite.
    #[error("curve bound {name} must be finite, got {value}")]
    NonFiniteCurveBound { name: &'static str, value: f64 },

    /// Hardware reported a minimum duty above its maximum.
    #[error("invalid duty range: pwm_min {min} exceeds pwm_max {max}")]
    InvalidDutyRange { min: u32, max: u32 },

    #[error("failed to read {}: {source}", path.display())]
    PortRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    PortWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Endpoint content could not be parsed as a number.
    #[error("unexpected value {value:?} in {}", path.display())]
    Parse { path: PathBuf, value: String },

    /// Temperature reading was NaN or infinite.
    #[error("non-finite temperature reading: {0}")]
    NonFiniteReading(f64),
}
