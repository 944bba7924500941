//! Append-only session time series with lap marks and running maxima.

use crate::recording::types::{MaxValues, Reading, RideSample, Scope, SessionSnapshot};
use chrono::{DateTime, Utc};

/// Time series of one riding session.
///
/// Rows are only appended between `start` and `stop`. Lap marks are kept in
/// elapsed milliseconds; the first mark is always 0.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sampling: bool,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    lap_marks_ms: Vec<i64>,
    lap_start_index: usize,
    samples: Vec<RideSample>,
    total_max: MaxValues,
    lap_max: MaxValues,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sampling: false,
            start_time: None,
            end_time: None,
            lap_marks_ms: vec![0],
            lap_start_index: 0,
            samples: Vec::new(),
            total_max: MaxValues::default(),
            lap_max: MaxValues::default(),
        }
    }

    /// Start the session clock. Ignored once started.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_some() {
            return;
        }
        self.start_time = Some(now);
        self.end_time = None;
        self.sampling = true;
        tracing::info!("Session started at {}", now);
    }

    /// Stop the session clock. Ignored before start and once stopped.
    pub fn stop(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_none() || self.end_time.is_some() {
            return;
        }
        self.end_time = Some(now);
        self.sampling = false;
        tracing::info!(samples = self.samples.len(), "Session stopped at {}", now);
    }

    /// Mark a lap boundary at `now`. Ignored before start and after stop.
    pub fn lap(&mut self, now: DateTime<Utc>) {
        if self.start_time.is_none() || self.end_time.is_some() {
            return;
        }
        let elapsed = self.elapsed_ms(now);
        self.lap_marks_ms.push(elapsed);
        self.lap_start_index = self.samples.len();
        self.lap_max = MaxValues::default();
        tracing::info!(
            lap = self.lap_marks_ms.len(),
            elapsed_ms = elapsed,
            "Lap marked"
        );
    }

    /// Append one row. Returns `false` when the session is not sampling or
    /// the reading has no power.
    pub fn sample(&mut self, reading: &Reading, now: DateTime<Utc>) -> bool {
        if !self.sampling {
            return false;
        }
        let Some(power) = reading.power else {
            return false;
        };

        let row = RideSample {
            elapsed_ms: self.elapsed_ms(now),
            power,
            cadence: reading.cadence,
            speed: reading.speed,
            accumulated_distance: reading.accumulated_distance,
            accumulated_energy: reading.accumulated_energy,
            heart_rate: reading.heart_rate,
            accumulated_heart_beats: reading.accumulated_heart_beats,
        };

        self.total_max.update(&row);
        self.lap_max.update(&row);
        self.samples.push(row);
        true
    }

    /// Clear everything back to a fresh store.
    pub fn restart(&mut self) {
        *self = Self::new();
        tracing::info!("Session data cleared");
    }

    /// Milliseconds between session start and `now`, 0 before start.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        self.start_time
            .map(|start| (now - start).num_milliseconds())
            .unwrap_or(0)
    }

    /// Session length from start to stop.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    /// Lap marks in elapsed milliseconds.
    pub fn lap_marks_ms(&self) -> &[i64] {
        &self.lap_marks_ms
    }

    /// Lap marks in elapsed seconds.
    pub fn laps(&self) -> Vec<f64> {
        self.lap_marks_ms
            .iter()
            .map(|&ms| ms as f64 / 1000.0)
            .collect()
    }

    /// First row of the current lap.
    pub fn lap_start_index(&self) -> usize {
        self.lap_start_index
    }

    pub fn samples(&self) -> &[RideSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Running maxima for a scope.
    pub fn max(&self, scope: Scope) -> MaxValues {
        match scope {
            Scope::Total => self.total_max,
            Scope::Lap => self.lap_max,
        }
    }

    /// Rows covered by a scope.
    pub fn rows(&self, scope: Scope) -> &[RideSample] {
        match scope {
            Scope::Total => &self.samples,
            Scope::Lap => &self.samples[self.lap_start_index..],
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            start_time: self.start_time,
            end_time: self.end_time,
            laps: self.laps(),
            time: self.samples.iter().map(|s| s.elapsed_ms).collect(),
            power: self.samples.iter().map(|s| s.power).collect(),
            cadence: self.samples.iter().map(|s| s.cadence).collect(),
            speed: self.samples.iter().map(|s| s.speed).collect(),
            accumulated_distance: self.samples.iter().map(|s| s.accumulated_distance).collect(),
            accumulated_energy: self.samples.iter().map(|s| s.accumulated_energy).collect(),
            heart_rate: self.samples.iter().map(|s| s.heart_rate).collect(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
