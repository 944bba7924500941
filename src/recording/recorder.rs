//! Ride recorder: owns the decoders and the session store.
//!
//! Notifications update decoder state as they arrive. The session store is
//! only written on `tick`, at most once per bike notification. The same tick
//! runs the silence watchdog for both sources.

use crate::metrics::calculator::WindowedAggregator;
use crate::recording::session::SessionStore;
use crate::recording::types::{
    AggregateGroup, CurrentReadings, Reading, RecorderError, RecordingStatus, Scope, SessionStats,
};
use crate::sensors::heart_rate::HeartRateDecoder;
use crate::sensors::power::{DisplayMode, PowerMeterDecoder};
use crate::sensors::types::{ConnectionState, SensorEvent, SensorType};
use chrono::{DateTime, Utc};

/// Bike silence after which the power meter is treated as gone.
pub const BIKE_WATCHDOG_MS: i64 = 60_000;

/// Heart rate silence after which the strap is treated as gone.
pub const HEART_RATE_WATCHDOG_MS: i64 = 6_000;

/// Records one session from one bike and one heart rate strap.
#[derive(Debug, Clone)]
pub struct RideRecorder {
    status: RecordingStatus,
    bike: PowerMeterDecoder,
    heart_rate: HeartRateDecoder,
    bike_connected: bool,
    heart_rate_connected: bool,
    session: SessionStore,
    /// Bike notification time of the last stored row
    last_sampled_bike_ms: Option<i64>,
}

impl RideRecorder {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            status: RecordingStatus::Idle,
            bike: PowerMeterDecoder::with_mode(mode),
            heart_rate: HeartRateDecoder::new(),
            bike_connected: false,
            heart_rate_connected: false,
            session: SessionStore::new(),
            last_sampled_bike_ms: None,
        }
    }

    /// Start the session.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), RecorderError> {
        match self.status {
            RecordingStatus::Idle => {
                self.session.start(now);
                self.status = RecordingStatus::Recording;
                tracing::info!("Started recording");
                Ok(())
            }
            RecordingStatus::Recording | RecordingStatus::Paused => Ok(()),
            RecordingStatus::Finished => Err(RecorderError::AlreadyStopped),
        }
    }

    /// Pause recording. The session clock keeps running.
    pub fn pause(&mut self) -> Result<(), RecorderError> {
        if self.status != RecordingStatus::Recording {
            return Err(RecorderError::NotRecording);
        }
        self.status = RecordingStatus::Paused;
        tracing::info!("Paused recording");
        Ok(())
    }

    /// Resume recording.
    pub fn resume(&mut self) -> Result<(), RecorderError> {
        match self.status {
            RecordingStatus::Paused => {
                self.status = RecordingStatus::Recording;
                tracing::info!("Resumed recording");
                Ok(())
            }
            RecordingStatus::Recording => Ok(()),
            _ => Err(RecorderError::NotRecording),
        }
    }

    /// Mark a lap boundary.
    pub fn lap(&mut self, now: DateTime<Utc>) -> Result<(), RecorderError> {
        match self.status {
            RecordingStatus::Recording | RecordingStatus::Paused => {
                self.session.lap(now);
                Ok(())
            }
            RecordingStatus::Finished => Err(RecorderError::AlreadyStopped),
            RecordingStatus::Idle => Err(RecorderError::NotRecording),
        }
    }

    /// Stop the session; it can then be exported.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<(), RecorderError> {
        match self.status {
            RecordingStatus::Idle => Err(RecorderError::NotRecording),
            RecordingStatus::Finished => Err(RecorderError::AlreadyStopped),
            RecordingStatus::Recording | RecordingStatus::Paused => {
                self.session.stop(now);
                self.status = RecordingStatus::Finished;
                tracing::info!(samples = self.session.len(), "Finished recording");
                Ok(())
            }
        }
    }

    /// Discard the session and get ready for a new one. Sensor connections
    /// are left alone.
    pub fn new_session(&mut self) {
        self.session.restart();
        self.heart_rate.reset_accumulator();
        self.last_sampled_bike_ms = None;
        self.status = RecordingStatus::Idle;
    }

    /// Route a transport event to the matching handler.
    pub fn handle_event(&mut self, event: &SensorEvent) {
        match event {
            SensorEvent::Notification {
                sensor_type,
                data,
                received_at,
            } => match sensor_type {
                SensorType::PowerMeter => self.handle_power_notification(data, *received_at),
                SensorType::HeartRate => self.handle_heart_rate_notification(data, *received_at),
            },
            SensorEvent::ConnectionChanged {
                sensor_type,
                state: ConnectionState::Disconnected,
                ..
            } => self.handle_disconnect(*sensor_type),
            SensorEvent::ConnectionChanged {
                sensor_type,
                state: ConnectionState::Connected,
                ..
            } => self.set_connected(*sensor_type, true),
            SensorEvent::Error(message) => tracing::warn!("Sensor error: {}", message),
            _ => {}
        }
    }

    pub fn handle_power_notification(&mut self, data: &[u8], now: DateTime<Utc>) {
        self.bike_connected = true;
        self.bike.decode(data, now.timestamp_millis());
    }

    pub fn handle_heart_rate_notification(&mut self, data: &[u8], now: DateTime<Utc>) {
        self.heart_rate_connected = true;
        self.heart_rate.decode(data, now.timestamp_millis());
    }

    /// Reset the source's decoder. Session history is kept.
    pub fn handle_disconnect(&mut self, sensor_type: SensorType) {
        match sensor_type {
            SensorType::PowerMeter => self.bike.on_disconnect(),
            SensorType::HeartRate => self.heart_rate.on_disconnect(),
        }
        self.set_connected(sensor_type, false);
        tracing::info!("{} disconnected", sensor_type);
    }

    fn set_connected(&mut self, sensor_type: SensorType, connected: bool) {
        match sensor_type {
            SensorType::PowerMeter => self.bike_connected = connected,
            SensorType::HeartRate => self.heart_rate_connected = connected,
        }
    }

    /// Periodic sampling and watchdog. Returns whether a row was stored.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let sampled = self.sample(now);
        self.run_watchdog(now.timestamp_millis());
        sampled
    }

    fn sample(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != RecordingStatus::Recording || !self.bike_connected {
            return false;
        }
        let Some(bike_ms) = self.bike.timestamp_ms() else {
            return false;
        };
        if self.last_sampled_bike_ms == Some(bike_ms) {
            return false;
        }

        let stored = self.session.sample(&self.current_reading(), now);
        self.last_sampled_bike_ms = Some(bike_ms);
        stored
    }

    fn current_reading(&self) -> Reading {
        let bike = &self.bike;
        let (heart_rate, beats) = if self.heart_rate_connected {
            (
                self.heart_rate.heart_rate().map(f64::from),
                Some(self.heart_rate.accumulated_heart_beats() as f64),
            )
        } else {
            (None, None)
        };

        // Rows always hold unsmoothed values
        Reading {
            power: bike.power_available().then(|| bike.raw_power()),
            cadence: bike.cadence_available().then(|| bike.raw_cadence()),
            speed: bike.speed_available().then(|| bike.raw_speed()),
            accumulated_distance: bike
                .speed_available()
                .then(|| bike.accumulated_distance_m()),
            accumulated_energy: bike
                .power_available()
                .then(|| bike.accumulated_energy_kj()),
            heart_rate,
            accumulated_heart_beats: beats,
        }
    }

    fn run_watchdog(&mut self, now_ms: i64) {
        if let Some(last) = self.bike.timestamp_ms() {
            if now_ms > last + BIKE_WATCHDOG_MS {
                tracing::warn!(silent_ms = now_ms - last, "Power meter silent, resetting");
                self.handle_disconnect(SensorType::PowerMeter);
            }
        }
        if let Some(last) = self.heart_rate.timestamp_ms() {
            if now_ms > last + HEART_RATE_WATCHDOG_MS {
                tracing::warn!(silent_ms = now_ms - last, "Heart rate strap silent, resetting");
                self.handle_disconnect(SensorType::HeartRate);
            }
        }
    }

    /// Current readings plus lap and total aggregates.
    pub fn stats(&self) -> SessionStats {
        let aggregator = WindowedAggregator::new(&self.session);
        let group = |scope| AggregateGroup {
            power: aggregator.power(scope),
            speed: aggregator.speed(scope),
            cadence: aggregator.cadence(scope),
            heart_rate: aggregator.heart_rate(scope),
            distance: aggregator.distance(scope),
            energy: aggregator.energy(scope),
        };

        SessionStats {
            start: self.session.start_time(),
            end: self.session.end_time(),
            status: self.status,
            current: CurrentReadings {
                power: self.bike.power(),
                speed: self.bike.speed(),
                cadence: self.bike.cadence(),
                heart_rate: self.heart_rate.heart_rate(),
                power_available: self.bike.power_available(),
                speed_available: self.bike.speed_available(),
                cadence_available: self.bike.cadence_available(),
                heart_rate_connected: self.heart_rate_connected,
            },
            lap: group(Scope::Lap),
            total: group(Scope::Total),
        }
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn bike(&self) -> &PowerMeterDecoder {
        &self.bike
    }

    pub fn heart_rate(&self) -> &HeartRateDecoder {
        &self.heart_rate
    }

    pub fn is_bike_connected(&self) -> bool {
        self.bike_connected
    }

    pub fn is_heart_rate_connected(&self) -> bool {
        self.heart_rate_connected
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.bike.set_mode(mode);
    }
}

impl Default for RideRecorder {
    fn default() -> Self {
        Self::new(DisplayMode::Raw)
    }
}
