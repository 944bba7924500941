//! PowerTrack - BLE cycling power and heart rate session recorder
//!
//! Decodes Cycling Power Measurement and Heart Rate Measurement notifications,
//! records them into a lap-aware session time series, aggregates lap and total
//! statistics and exports finished sessions to TCX.

pub mod metrics;
pub mod recording;
pub mod sensors;
pub mod storage;

// Re-export commonly used types
pub use metrics::calculator::WindowedAggregator;
pub use recording::recorder::RideRecorder;
pub use recording::runner::{SessionCommand, SessionRunner};
pub use recording::session::SessionStore;
pub use sensors::manager::SensorManager;
pub use storage::config::AppConfig;
