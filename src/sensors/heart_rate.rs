//! Heart Rate Service (0x180D) measurement decoding.

use crate::sensors::types::SensorError;
use uuid::Uuid;

/// Heart Rate Service UUID (0x180D)
pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180d_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Measurement UUID (0x2A37)
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a37_0000_1000_8000_0080_5f9b_34fb);

/// Intervals at or above this are dropped from beat integration.
pub const HEART_RATE_GAP_SECS: f64 = 6.0;

/// Flags bit 0: heart rate value is a u16.
const FORMAT_UINT16: u8 = 0x01;

/// Parse the heart rate value from a measurement notification.
pub fn parse_heart_rate_measurement(data: &[u8]) -> Result<u16, SensorError> {
    let flags = *data
        .first()
        .ok_or_else(|| SensorError::ParseError("empty heart rate payload".to_string()))?;

    if flags & FORMAT_UINT16 != 0 {
        match data.get(1..3) {
            Some(bytes) => Ok(u16::from_le_bytes([bytes[0], bytes[1]])),
            None => Err(SensorError::ParseError(format!(
                "16-bit heart rate payload has {} bytes",
                data.len()
            ))),
        }
    } else {
        data.get(1).map(|&bpm| bpm as u16).ok_or_else(|| {
            SensorError::ParseError(format!("heart rate payload has {} bytes", data.len()))
        })
    }
}

/// One decoded heart rate reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeartRateSample {
    pub timestamp_ms: i64,
    pub heart_rate_bpm: Option<u16>,
    pub accumulated_heart_beats: u64,
}

/// Stateful decoder for one heart rate strap.
///
/// Beats are integrated as `dt / 60 * bpm` using the rate held over the
/// interval, and only for intervals strictly between 0 and 6 seconds.
#[derive(Debug, Clone, Default)]
pub struct HeartRateDecoder {
    heart_rate: Option<u16>,
    accumulated_heart_beats: f64,
    notification_timestamp_ms: Option<i64>,
}

impl HeartRateDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one notification received at `now_ms`.
    pub fn decode(&mut self, data: &[u8], now_ms: i64) -> HeartRateSample {
        let bpm = match parse_heart_rate_measurement(data) {
            Ok(bpm) => bpm,
            Err(e) => {
                tracing::warn!("Dropping heart rate notification: {}", e);
                return HeartRateSample {
                    timestamp_ms: now_ms,
                    ..Default::default()
                };
            }
        };

        if let (Some(previous), Some(held)) = (self.notification_timestamp_ms, self.heart_rate) {
            let dt = (now_ms - previous) as f64 / 1000.0;
            if dt > 0.0 && dt < HEART_RATE_GAP_SECS {
                self.accumulated_heart_beats += dt / 60.0 * held as f64;
            } else {
                tracing::debug!(dt, "Heart rate tick dropped from beat count");
            }
        }

        self.notification_timestamp_ms = Some(now_ms);
        self.heart_rate = Some(bpm);

        HeartRateSample {
            timestamp_ms: now_ms,
            heart_rate_bpm: self.heart_rate,
            accumulated_heart_beats: self.accumulated_heart_beats(),
        }
    }

    /// Latest heart rate, `None` until the first notification after a connect.
    pub fn heart_rate(&self) -> Option<u16> {
        self.heart_rate
    }

    /// Whole beats counted so far.
    pub fn accumulated_heart_beats(&self) -> u64 {
        self.accumulated_heart_beats.floor() as u64
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        self.notification_timestamp_ms
    }

    /// Forget the current reading. The beat count survives reconnects.
    pub fn on_disconnect(&mut self) {
        self.heart_rate = None;
        self.notification_timestamp_ms = None;
        tracing::info!("Heart rate state reset");
    }

    pub fn reset_accumulator(&mut self) {
        self.accumulated_heart_beats = 0.0;
    }
}
