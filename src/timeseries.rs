// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Fixed-length exponentially weighted sample window.
//!
//! Holds the last N temperature readings together with a weight per slot.
//! Weights follow an EWMA with `alpha = 2 / (N + 1)`: the slot `k` samples
//! behind the newest one carries `(1 - alpha)^k`. They are not normalized;
//! [`WeightedSampleWindow::average`] divides by their sum instead.

use crate::error::{FanError, Result};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct WeightedSampleWindow {
    /// Oldest at the front, newest at the back. Always exactly `weights.len()` entries.
    samples: VecDeque<f64>,
    /// Same ordering as `samples`, so the last weight is the largest.
    weights: Vec<f64>,
    weight_sum: f64,
}

impl WeightedSampleWindow {
    /// Create a window of `length` slots, every one seeded with `initial`.
    pub fn new(length: usize, initial: f64) -> Result<Self> {
        if length < 1 {
            return Err(FanError::InvalidCapacity);
        }

        let weights = generate_weights(length);
        let weight_sum = weights.iter().sum();

        Ok(Self {
            samples: std::iter::repeat_n(initial, length).collect(),
            weights,
            weight_sum,
        })
    }

    /// Drop the oldest sample and append `value` as the newest.
    pub fn push(&mut self, value: f64) {
        self.samples.pop_front();
        self.samples.push_back(value);
    }

    /// Weighted mean of the current samples.
    pub fn average(&self) -> f64 {
        weighted_sum(self.samples.iter().copied(), &self.weights) / self.weight_sum
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Never true; a window always holds at least one sample.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Samples from oldest to newest.
    pub fn samples(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

fn generate_weights(length: usize) -> Vec<f64> {
    let alpha = 2.0 / (length as f64 + 1.0);
    (0..length)
        .rev()
        .map(|age| (1.0 - alpha).powi(age as i32))
        .collect()
}

fn weighted_sum(samples: impl Iterator<Item = f64>, weights: &[f64]) -> f64 {
    samples.zip(weights).map(|(s, w)| s * w).sum()
}
