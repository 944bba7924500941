//! Display smoothing for power, speed and cadence.
//!
//! A short finite impulse filter over the most recent readings. Only the
//! filtered display mode reads it; aggregation and export never do.

use std::collections::VecDeque;

/// Default weights, newest sample first.
pub const DEFAULT_WEIGHTS: [f64; 3] = [3.0, 2.0, 1.0];

/// Weighted moving average over the last few readings.
#[derive(Debug, Clone)]
pub struct WeightedSmoother {
    /// Recent values, oldest at the front
    buffer: VecDeque<f64>,
    /// Weights, newest sample first
    weights: Vec<f64>,
}

impl WeightedSmoother {
    /// Create a smoother with the given weights (newest sample first).
    pub fn new(weights: &[f64]) -> Self {
        Self {
            buffer: VecDeque::with_capacity(weights.len()),
            weights: weights.to_vec(),
        }
    }

    /// Add a reading, dropping the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        self.buffer.push_back(value);
        while self.buffer.len() > self.weights.len() {
            self.buffer.pop_front();
        }
    }

    /// Weighted average of the buffered readings, 0 when empty.
    pub fn value(&self) -> f64 {
        let (sum, weight_sum) = self
            .buffer
            .iter()
            .rev()
            .zip(self.weights.iter())
            .fold((0.0, 0.0), |(sum, weight_sum), (value, weight)| {
                (sum + weight * value, weight_sum + weight)
            });

        if weight_sum == 0.0 {
            0.0
        } else {
            sum / weight_sum
        }
    }

    /// Forget all readings.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of buffered readings.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for WeightedSmoother {
    fn default() -> Self {
        Self::new(&DEFAULT_WEIGHTS)
    }
}
