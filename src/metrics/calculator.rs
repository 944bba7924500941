//! Windowed aggregation over the session time series.
//!
//! Averages are time-weighted: each sample counts for the interval until the
//! next sample. Intervals longer than [`MAX_SAMPLE_GAP_SECS`] are a dropout and
//! count as one second.

use crate::recording::session::SessionStore;
use crate::recording::types::{RideSample, Scope};

/// Longest interval taken at face value.
pub const MAX_SAMPLE_GAP_SECS: f64 = 3.0;

/// Interval substituted for a dropout.
const DROPOUT_INTERVAL_SECS: f64 = 1.0;

/// Result of walking a window of one column.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadThrough {
    /// First non-null value, 0 if none
    pub start: f64,
    /// Last non-null value, 0 if none
    pub end: f64,
    /// Time-weighted sum (value x seconds)
    pub sum: f64,
    /// Seconds covered by `sum`, 1 when the window covers no time
    pub total_dt: f64,
}

impl ReadThrough {
    pub fn average(&self) -> f64 {
        self.sum / self.total_dt
    }

    /// Growth of an accumulating column over the window.
    pub fn delta(&self) -> f64 {
        self.end - self.start
    }
}

/// Walk `values[start_index..=end_index]`, weighting each value by the time to
/// the next sample. Out-of-range indices are clipped.
pub fn read_through(
    values: &[Option<f64>],
    elapsed_ms: &[i64],
    start_index: usize,
    end_index: usize,
) -> ReadThrough {
    let len = values.len().min(elapsed_ms.len());
    let mut result = ReadThrough::default();
    if len == 0 || start_index >= len {
        result.total_dt = 1.0;
        return result;
    }
    let end_index = end_index.min(len - 1);

    let mut start = None;
    let mut end = None;

    for i in start_index..=end_index {
        let Some(value) = values[i] else {
            continue;
        };
        start.get_or_insert(value);
        end = Some(value);

        if i + 1 > end_index {
            continue;
        }
        let mut dt = (elapsed_ms[i + 1] - elapsed_ms[i]) as f64 / 1000.0;
        if dt <= 0.0 {
            continue;
        }
        if dt > MAX_SAMPLE_GAP_SECS {
            dt = DROPOUT_INTERVAL_SECS;
        }
        result.sum += dt * value;
        result.total_dt += dt;
    }

    result.start = start.unwrap_or(0.0);
    result.end = end.unwrap_or(0.0);
    if result.total_dt <= 0.0 {
        result.total_dt = 1.0;
    }
    result
}

/// Maximum and time-weighted average of an instantaneous metric.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregate {
    pub max: f64,
    pub avg: f64,
}

/// Growth and hourly rate of an accumulating metric.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulation {
    pub accumulated: f64,
    pub per_hour: f64,
}

/// Read-only aggregate view over a [`SessionStore`].
pub struct WindowedAggregator<'a> {
    store: &'a SessionStore,
}

impl<'a> WindowedAggregator<'a> {
    pub fn new(store: &'a SessionStore) -> Self {
        Self { store }
    }

    fn walk<F>(&self, scope: Scope, column: F) -> ReadThrough
    where
        F: Fn(&RideSample) -> Option<f64>,
    {
        let rows = self.store.rows(scope);
        let values: Vec<Option<f64>> = rows.iter().map(&column).collect();
        let elapsed: Vec<i64> = rows.iter().map(|s| s.elapsed_ms).collect();
        read_through(&values, &elapsed, 0, rows.len().saturating_sub(1))
    }

    pub fn power(&self, scope: Scope) -> Aggregate {
        Aggregate {
            max: self.store.max(scope).power,
            avg: self.walk(scope, |s| Some(s.power)).average(),
        }
    }

    pub fn speed(&self, scope: Scope) -> Aggregate {
        Aggregate {
            max: self.store.max(scope).speed,
            avg: self.walk(scope, |s| s.speed).average(),
        }
    }

    pub fn cadence(&self, scope: Scope) -> Aggregate {
        Aggregate {
            max: self.store.max(scope).cadence,
            avg: self.walk(scope, |s| s.cadence).average(),
        }
    }

    pub fn heart_rate(&self, scope: Scope) -> Aggregate {
        Aggregate {
            max: self.store.max(scope).heart_rate,
            avg: self.walk(scope, |s| s.heart_rate).average(),
        }
    }

    /// Distance in meters and meters per hour.
    pub fn distance(&self, scope: Scope) -> Accumulation {
        accumulation(self.walk(scope, |s| s.accumulated_distance))
    }

    /// Energy in kJ and kJ per hour.
    pub fn energy(&self, scope: Scope) -> Accumulation {
        accumulation(self.walk(scope, |s| s.accumulated_energy))
    }
}

fn accumulation(walk: ReadThrough) -> Accumulation {
    let accumulated = walk.delta();
    Accumulation {
        accumulated,
        per_hour: accumulated / walk.total_dt * 3600.0,
    }
}
