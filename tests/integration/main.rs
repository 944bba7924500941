//! Integration test modules.

mod sensor_mock;
