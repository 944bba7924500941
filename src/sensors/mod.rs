//! Sensor module: BLE transport and notification decoding.

pub mod flags;
pub mod heart_rate;
pub mod manager;
pub mod power;
pub mod revolution;
pub mod types;

pub use flags::{decode_flags, FeatureFlag, FeatureFlagSet};
pub use heart_rate::{HeartRateDecoder, HeartRateSample};
pub use manager::SensorManager;
pub use power::{DisplayMode, PowerMeterDecoder, PowerSample};
pub use revolution::{RevolutionRateEstimator, RevolutionState, Shaft};
pub use types::{ConnectionState, DiscoveredSensor, SensorConfig, SensorError, SensorEvent, SensorType};
