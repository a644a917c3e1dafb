//! Release-velocity estimation for drag gestures

use std::collections::VecDeque;

use super::geometry::Offset;

/// Pointer samples older than this (relative to the newest) are ignored
const HORIZON_MS: u64 = 100;
/// A gap this long between samples means the pointer stopped moving
const ASSUME_STOPPED_MS: u64 = 40;
const HISTORY_SIZE: usize = 20;

#[derive(Clone, Copy, Debug)]
struct Sample {
    time_ms: u64,
    position: Offset,
}

/// Bounded history of timestamped pointer positions for one drag.
///
/// Velocity is the least-squares slope of position over time across the
/// samples inside the horizon window, in pixels per second.
#[derive(Debug, Default)]
pub struct VelocityTracker {
    samples: VecDeque<Sample>,
}

impl VelocityTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_SIZE),
        }
    }

    /// Record a pointer position. Samples must arrive in time order; an
    /// out-of-order sample restarts the history.
    pub fn add_position(&mut self, time_ms: u64, position: Offset) {
        if !position.is_finite() {
            log::warn!("VelocityTracker: ignoring non-finite position {position:?}");
            return;
        }
        if let Some(last) = self.samples.back() {
            if time_ms < last.time_ms {
                self.samples.clear();
            }
        }
        if self.samples.len() == HISTORY_SIZE {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { time_ms, position });
    }

    /// Drop all samples
    pub fn reset_tracking(&mut self) {
        self.samples.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Estimate the current velocity and clear the history
    pub fn calculate_velocity(&mut self) -> Offset {
        let velocity = self.estimate();
        self.samples.clear();
        velocity
    }

    fn estimate(&self) -> Offset {
        let Some(newest) = self.samples.back() else {
            return Offset::ZERO;
        };

        let mut window: Vec<&Sample> = Vec::with_capacity(self.samples.len());
        let mut previous_time = newest.time_ms;
        for sample in self.samples.iter().rev() {
            let age = newest.time_ms - sample.time_ms;
            let gap = previous_time - sample.time_ms;
            if age > HORIZON_MS || gap > ASSUME_STOPPED_MS {
                break;
            }
            window.push(sample);
            previous_time = sample.time_ms;
        }

        if window.len() < 2 {
            return Offset::ZERO;
        }

        // Times in seconds relative to the newest sample (all <= 0)
        let times: Vec<f32> = window
            .iter()
            .map(|s| -((newest.time_ms - s.time_ms) as f32) / 1000.0)
            .collect();
        let xs: Vec<f32> = window.iter().map(|s| s.position.x).collect();
        let ys: Vec<f32> = window.iter().map(|s| s.position.y).collect();

        Offset::new(slope(&times, &xs), slope(&times, &ys))
    }
}

fn slope(times: &[f32], values: &[f32]) -> f32 {
    let n = times.len() as f32;
    let mean_t = times.iter().sum::<f32>() / n;
    let mean_v = values.iter().sum::<f32>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (t, v) in times.iter().zip(values) {
        covariance += (t - mean_t) * (v - mean_v);
        variance += (t - mean_t) * (t - mean_t);
    }

    if variance <= f32::EPSILON {
        0.0
    } else {
        covariance / variance
    }
}
