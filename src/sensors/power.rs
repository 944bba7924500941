//! Cycling Power Service (0x1818) measurement decoding.
//!
//! Turns raw Cycling Power Measurement notifications into power, speed,
//! cadence, accumulated distance and accumulated energy. Wheel and crank
//! revolution data go through one [`RevolutionRateEstimator`] each.

use crate::metrics::smoothing::WeightedSmoother;
use crate::sensors::flags::{decode_flags, FeatureFlag, FeatureFlagSet, HEADER_LEN};
use crate::sensors::revolution::{
    wheel_distance_m, wheel_speed_kmh, RevolutionRateEstimator, CRANK_TIME_RESOLUTION_HZ,
    WHEEL_TIME_RESOLUTION_HZ,
};
use crate::sensors::types::SensorError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cycling Power Service UUID (0x1818)
pub const CYCLING_POWER_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_1818_0000_1000_8000_0080_5f9b_34fb);

/// Cycling Power Measurement UUID (0x2A63)
pub const CYCLING_POWER_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a63_0000_1000_8000_0080_5f9b_34fb);

/// Notification gaps longer than this are a dropout, not an integration step.
pub const ENERGY_GAP_SECS: f64 = 3.0;

/// How readings are presented to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Latest decoded value
    #[default]
    Raw,
    /// Weighted average of the last few values
    Filtered,
}

/// Fields read from a single Cycling Power Measurement notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CyclingPowerMeasurement {
    /// Decoded flag field
    pub flags: FeatureFlagSet,
    /// Instantaneous power in watts
    pub instantaneous_power: i16,
    /// Cumulative wheel revolutions
    pub wheel_revolutions: Option<u32>,
    /// Last wheel event time (1/2048 s)
    pub last_wheel_event_time: Option<u16>,
    /// Cumulative crank revolutions
    pub crank_revolutions: Option<u16>,
    /// Last crank event time (1/1024 s)
    pub last_crank_event_time: Option<u16>,
    /// Accumulated energy in kJ
    pub accumulated_energy_kj: Option<u16>,
}

/// Parse a Cycling Power Measurement notification.
///
/// Optional fields that do not fit in the payload are left unset; the header
/// fields are still returned.
pub fn parse_cycling_power_measurement(data: &[u8]) -> Result<CyclingPowerMeasurement, SensorError> {
    if data.len() < HEADER_LEN {
        return Err(SensorError::ParseError(format!(
            "cycling power payload has {} bytes, need at least {}",
            data.len(),
            HEADER_LEN
        )));
    }

    let flags = decode_flags(data[0], data[1]);
    if data.len() < flags.payload_len() {
        tracing::debug!(
            len = data.len(),
            announced = flags.payload_len(),
            "Cycling power payload shorter than its flags announce"
        );
    }
    let mut result = CyclingPowerMeasurement {
        flags,
        instantaneous_power: i16::from_le_bytes([data[2], data[3]]),
        ..Default::default()
    };

    if let Some(field) = optional_field(data, &flags, FeatureFlag::WheelRevolutionData) {
        result.wheel_revolutions = Some(u32::from_le_bytes([field[0], field[1], field[2], field[3]]));
        result.last_wheel_event_time = Some(u16::from_le_bytes([field[4], field[5]]));
    }

    if let Some(field) = optional_field(data, &flags, FeatureFlag::CrankRevolutionData) {
        result.crank_revolutions = Some(u16::from_le_bytes([field[0], field[1]]));
        result.last_crank_event_time = Some(u16::from_le_bytes([field[2], field[3]]));
    }

    if let Some(field) = optional_field(data, &flags, FeatureFlag::AccumulatedEnergy) {
        result.accumulated_energy_kj = Some(u16::from_le_bytes([field[0], field[1]]));
    }

    Ok(result)
}

fn optional_field<'a>(data: &'a [u8], flags: &FeatureFlagSet, flag: FeatureFlag) -> Option<&'a [u8]> {
    let offset = flags.payload_offset(flag)?;
    data.get(offset..offset + flag.field_size())
}

/// One decoded power meter reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerSample {
    /// Notification time in ms
    pub timestamp_ms: i64,
    /// Power in watts
    pub power: f64,
    /// Speed in km/h
    pub speed_kmh: f64,
    /// Cadence in RPM
    pub cadence_rpm: f64,
    /// Distance from the cumulative wheel counter, meters
    pub accumulated_distance_m: f64,
    /// Accumulated energy, kJ
    pub accumulated_energy_kj: f64,
}

/// Stateful decoder for one Cycling Power peripheral.
#[derive(Debug, Clone)]
pub struct PowerMeterDecoder {
    mode: DisplayMode,
    power_available: bool,
    speed_available: bool,
    cadence_available: bool,
    notification_timestamp_ms: Option<i64>,
    power: f64,
    speed: f64,
    cadence: f64,
    accumulated_energy_kj: f64,
    accumulated_distance_m: f64,
    wheel: RevolutionRateEstimator,
    crank: RevolutionRateEstimator,
    power_smoother: WeightedSmoother,
    speed_smoother: WeightedSmoother,
    cadence_smoother: WeightedSmoother,
}

impl PowerMeterDecoder {
    /// Create a decoder with no history.
    pub fn new() -> Self {
        Self {
            mode: DisplayMode::Raw,
            power_available: false,
            speed_available: false,
            cadence_available: false,
            notification_timestamp_ms: None,
            power: 0.0,
            speed: 0.0,
            cadence: 0.0,
            accumulated_energy_kj: 0.0,
            accumulated_distance_m: 0.0,
            wheel: RevolutionRateEstimator::wheel(),
            crank: RevolutionRateEstimator::crank(),
            power_smoother: WeightedSmoother::default(),
            speed_smoother: WeightedSmoother::default(),
            cadence_smoother: WeightedSmoother::default(),
        }
    }

    /// Create a decoder presenting readings in the given mode.
    pub fn with_mode(mode: DisplayMode) -> Self {
        Self {
            mode,
            ..Self::new()
        }
    }

    /// Decode one notification received at `now_ms`.
    ///
    /// A payload shorter than the fixed header leaves the decoder untouched and
    /// yields a zero reading. A payload that only truncates optional fields
    /// still applies power and integrates energy; the missing fields keep
    /// their previous values.
    pub fn decode(&mut self, data: &[u8], now_ms: i64) -> PowerSample {
        let measurement = match parse_cycling_power_measurement(data) {
            Ok(measurement) => measurement,
            Err(e) => {
                tracing::warn!("Dropping cycling power notification: {}", e);
                return PowerSample {
                    timestamp_ms: now_ms,
                    ..Default::default()
                };
            }
        };

        let dt = self.seconds_since_last_notification(now_ms);

        // Energy is integrated with the power held over the elapsed interval
        if let Some(energy) = measurement.accumulated_energy_kj {
            self.accumulated_energy_kj = energy as f64;
        } else if self.power_available {
            self.accumulated_energy_kj += dt * self.power / 1000.0;
        }

        self.power_available = true;
        self.power = measurement.instantaneous_power as f64;
        self.power_smoother.push(self.power);
        let under_load = self.power != 0.0;

        if let (Some(revs), Some(time)) = (
            measurement.wheel_revolutions,
            measurement.last_wheel_event_time,
        ) {
            self.speed_available = true;
            let rpm = self
                .wheel
                .observe(revs, time, WHEEL_TIME_RESOLUTION_HZ, under_load);
            self.speed = wheel_speed_kmh(rpm);
            self.speed_smoother.push(self.speed);
            self.accumulated_distance_m = wheel_distance_m(revs);
        }

        if let (Some(revs), Some(time)) = (
            measurement.crank_revolutions,
            measurement.last_crank_event_time,
        ) {
            self.cadence_available = true;
            self.cadence = self
                .crank
                .observe(revs as u32, time, CRANK_TIME_RESOLUTION_HZ, under_load);
            self.cadence_smoother.push(self.cadence);
        }

        self.notification_timestamp_ms = Some(now_ms);
        self.current()
    }

    fn seconds_since_last_notification(&self, now_ms: i64) -> f64 {
        let Some(previous) = self.notification_timestamp_ms else {
            return 0.0;
        };
        let dt = (now_ms - previous) as f64 / 1000.0;
        if dt > ENERGY_GAP_SECS {
            tracing::debug!(dt, "Power notification gap, energy not integrated");
            0.0
        } else {
            dt.max(0.0)
        }
    }

    /// Reset after the peripheral went away.
    ///
    /// Accumulated distance and energy are deliberately kept: a reconnect
    /// continues the same totals, so per-lap differences never go negative.
    pub fn on_disconnect(&mut self) {
        self.power_available = false;
        self.speed_available = false;
        self.cadence_available = false;
        self.notification_timestamp_ms = None;
        self.power = 0.0;
        self.speed = 0.0;
        self.cadence = 0.0;
        self.wheel.reset();
        self.crank.reset();
        self.power_smoother.reset();
        self.speed_smoother.reset();
        self.cadence_smoother.reset();
        tracing::info!("Power meter state reset");
    }

    /// Current reading in the active display mode. For display only; stored
    /// rows use the `raw_*` accessors.
    pub fn current(&self) -> PowerSample {
        PowerSample {
            timestamp_ms: self.notification_timestamp_ms.unwrap_or_default(),
            power: self.power(),
            speed_kmh: self.speed(),
            cadence_rpm: self.cadence(),
            accumulated_distance_m: self.accumulated_distance_m,
            accumulated_energy_kj: self.accumulated_energy_kj,
        }
    }

    /// Power in watts, smoothed in [`DisplayMode::Filtered`].
    pub fn power(&self) -> f64 {
        match self.mode {
            DisplayMode::Raw => self.power,
            DisplayMode::Filtered => self.power_smoother.value(),
        }
    }

    /// Speed in km/h, smoothed in [`DisplayMode::Filtered`].
    pub fn speed(&self) -> f64 {
        match self.mode {
            DisplayMode::Raw => self.speed,
            DisplayMode::Filtered => self.speed_smoother.value(),
        }
    }

    /// Cadence in RPM, smoothed in [`DisplayMode::Filtered`].
    pub fn cadence(&self) -> f64 {
        match self.mode {
            DisplayMode::Raw => self.cadence,
            DisplayMode::Filtered => self.cadence_smoother.value(),
        }
    }

    /// Last decoded power in watts, whatever the display mode.
    pub fn raw_power(&self) -> f64 {
        self.power
    }

    /// Last decoded speed in km/h, whatever the display mode.
    pub fn raw_speed(&self) -> f64 {
        self.speed
    }

    /// Last decoded cadence in RPM, whatever the display mode.
    pub fn raw_cadence(&self) -> f64 {
        self.cadence
    }

    /// Accumulated energy in kJ.
    pub fn accumulated_energy_kj(&self) -> f64 {
        self.accumulated_energy_kj
    }

    /// Accumulated distance in meters.
    pub fn accumulated_distance_m(&self) -> f64 {
        self.accumulated_distance_m
    }

    /// A power reading has arrived since the last disconnect.
    pub fn power_available(&self) -> bool {
        self.power_available
    }

    /// Wheel revolution data has arrived since the last disconnect.
    pub fn speed_available(&self) -> bool {
        self.speed_available
    }

    /// Crank revolution data has arrived since the last disconnect.
    pub fn cadence_available(&self) -> bool {
        self.cadence_available
    }

    /// Time of the last accepted notification in ms.
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.notification_timestamp_ms
    }

    /// Active display mode.
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Switch display mode. Smoothing history is kept.
    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
    }
}

impl Default for PowerMeterDecoder {
    fn default() -> Self {
        Self::new()
    }
}
