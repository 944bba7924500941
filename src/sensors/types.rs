//! Transport-facing types: which source a notification came from, connection
//! state, and the events the BLE layer hands to the recorder.

use crate::sensors::heart_rate::{HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID};
use crate::sensors::power::{CYCLING_POWER_MEASUREMENT_UUID, CYCLING_POWER_SERVICE_UUID};
use chrono::{DateTime, Utc};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Notification source feeding a session. One of each at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    /// Cycling Power Service (0x1818)
    PowerMeter,
    /// Heart Rate Service (0x180D)
    HeartRate,
}

impl SensorType {
    /// GATT service advertised by this kind of peripheral.
    pub fn service_uuid(self) -> Uuid {
        match self {
            SensorType::PowerMeter => CYCLING_POWER_SERVICE_UUID,
            SensorType::HeartRate => HEART_RATE_SERVICE_UUID,
        }
    }

    /// Characteristic carrying the measurement notifications.
    pub fn measurement_uuid(self) -> Uuid {
        match self {
            SensorType::PowerMeter => CYCLING_POWER_MEASUREMENT_UUID,
            SensorType::HeartRate => HEART_RATE_MEASUREMENT_UUID,
        }
    }

    /// Source owning a measurement characteristic.
    pub fn from_measurement(uuid: Uuid) -> Option<Self> {
        [SensorType::PowerMeter, SensorType::HeartRate]
            .into_iter()
            .find(|sensor_type| sensor_type.measurement_uuid() == uuid)
    }

    /// Classify a peripheral by its advertised services. A power meter that
    /// also advertises heart rate is treated as a power meter.
    pub fn from_services(services: &[Uuid]) -> Option<Self> {
        [SensorType::PowerMeter, SensorType::HeartRate]
            .into_iter()
            .find(|sensor_type| services.contains(&sensor_type.service_uuid()))
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorType::PowerMeter => write!(f, "power meter"),
            SensorType::HeartRate => write!(f, "heart rate strap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// A peripheral seen while scanning.
#[derive(Debug, Clone)]
pub struct DiscoveredSensor {
    /// Platform peripheral id, stable for the lifetime of the adapter
    pub device_id: String,
    /// Advertised local name
    pub name: String,
    pub sensor_type: SensorType,
    pub rssi: Option<i16>,
    pub last_seen: Instant,
}

/// Events emitted by the BLE layer, in delivery order.
#[derive(Debug, Clone)]
pub enum SensorEvent {
    Discovered(DiscoveredSensor),
    ConnectionChanged {
        sensor_type: SensorType,
        device_id: String,
        state: ConnectionState,
    },
    /// Raw measurement bytes, stamped on arrival
    Notification {
        sensor_type: SensorType,
        data: Vec<u8>,
        received_at: DateTime<Utc>,
    },
    ScanStarted,
    ScanStopped,
    /// Transport problem that did not end a connection
    Error(String),
}

/// Timeouts for the BLE layer.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// How long to wait for a matching peripheral to show up
    pub discovery_timeout_secs: u64,
    /// How long a single connect attempt may take
    pub connection_timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: 30,
            connection_timeout_secs: 10,
        }
    }
}

/// Errors from the BLE layer and from measurement parsing.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("No Bluetooth adapter available")]
    AdapterNotFound,

    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("No {0} found")]
    SensorNotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection attempt timed out")]
    ConnectionTimeout,

    #[error("Could not subscribe to measurements: {0}")]
    SubscriptionFailed(String),

    /// Measurement payload could not be decoded
    #[error("Malformed measurement: {0}")]
    ParseError(String),

    #[error("BLE error: {0}")]
    BleError(String),
}
