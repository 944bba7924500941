//! Recording types for session capture and export.

use crate::metrics::calculator::{Accumulation, Aggregate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of the ride recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingStatus {
    /// Session not started
    #[default]
    Idle,
    /// Sampling on every tick
    Recording,
    /// Clock running, ticks not sampled
    Paused,
    /// Session stopped, ready for export
    Finished,
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingStatus::Idle => write!(f, "Idle"),
            RecordingStatus::Recording => write!(f, "Recording"),
            RecordingStatus::Paused => write!(f, "Paused"),
            RecordingStatus::Finished => write!(f, "Finished"),
        }
    }
}

/// Index range an aggregate covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every stored sample
    Total,
    /// Samples since the last lap mark
    Lap,
}

/// Values handed to the session store on a sampling tick.
///
/// A reading without power is not stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    pub power: Option<f64>,
    pub cadence: Option<f64>,
    pub speed: Option<f64>,
    pub accumulated_distance: Option<f64>,
    pub accumulated_energy: Option<f64>,
    pub heart_rate: Option<f64>,
    pub accumulated_heart_beats: Option<f64>,
}

/// One stored row of the session time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RideSample {
    /// Milliseconds since session start
    pub elapsed_ms: i64,
    /// Power in watts
    pub power: f64,
    /// Cadence in RPM
    pub cadence: Option<f64>,
    /// Speed in km/h
    pub speed: Option<f64>,
    /// Accumulated distance in meters
    pub accumulated_distance: Option<f64>,
    /// Accumulated energy in kJ
    pub accumulated_energy: Option<f64>,
    /// Heart rate in BPM
    pub heart_rate: Option<f64>,
    /// Accumulated heart beats
    pub accumulated_heart_beats: Option<f64>,
}

/// Running maxima for one scope. Zero means nothing recorded yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MaxValues {
    pub power: f64,
    pub speed: f64,
    pub cadence: f64,
    pub heart_rate: f64,
}

impl MaxValues {
    /// Raise each maximum a non-zero reading exceeds.
    pub fn update(&mut self, sample: &RideSample) {
        raise(&mut self.power, Some(sample.power));
        raise(&mut self.speed, sample.speed);
        raise(&mut self.cadence, sample.cadence);
        raise(&mut self.heart_rate, sample.heart_rate);
    }
}

fn raise(max: &mut f64, value: Option<f64>) {
    if let Some(value) = value {
        if value != 0.0 && value > *max {
            *max = value;
        }
    }
}

/// Session contents in a serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Lap marks in elapsed seconds, first is always 0
    pub laps: Vec<f64>,
    /// Elapsed milliseconds per sample
    pub time: Vec<i64>,
    pub power: Vec<f64>,
    pub cadence: Vec<Option<f64>>,
    pub speed: Vec<Option<f64>>,
    pub accumulated_distance: Vec<Option<f64>>,
    pub accumulated_energy: Vec<Option<f64>>,
    pub heart_rate: Vec<Option<f64>>,
}

/// Live sensor values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentReadings {
    pub power: f64,
    pub speed: f64,
    pub cadence: f64,
    pub heart_rate: Option<u16>,
    pub power_available: bool,
    pub speed_available: bool,
    pub cadence_available: bool,
    pub heart_rate_connected: bool,
}

/// Aggregates over one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateGroup {
    pub power: Aggregate,
    pub speed: Aggregate,
    pub cadence: Aggregate,
    pub heart_rate: Aggregate,
    pub distance: Accumulation,
    pub energy: Accumulation,
}

/// Everything a display needs in one read.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: RecordingStatus,
    pub current: CurrentReadings,
    pub lap: AggregateGroup,
    pub total: AggregateGroup,
}

/// Errors from the ride recorder.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecorderError {
    /// Session not started
    #[error("Not currently recording")]
    NotRecording,

    /// Session already stopped
    #[error("Session already stopped")]
    AlreadyStopped,
}

/// Errors during session export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Session never started
    #[error("Session was never started")]
    NotStarted,

    /// Session started but never stopped
    #[error("Unterminated session: stop the session before exporting")]
    NotStopped,

    /// No samples to export
    #[error("Session has no data to export")]
    NoData,

    /// Stored samples do not line up with lap boundaries
    #[error("Session data corrupted: {0}")]
    CorruptSession(String),

    /// XML generation error
    #[error("XML error: {0}")]
    XmlError(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
