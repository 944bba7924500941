//! Application configuration loaded from TOML.

use crate::recording::runner::DEFAULT_SAMPLE_PERIOD;
use crate::sensors::power::DisplayMode;
use crate::sensors::types::SensorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Sensor settings
    pub sensors: SensorSettings,
    /// Recording settings
    pub recording: RecordingSettings,
    /// Export settings
    pub export: ExportSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            sensors: SensorSettings::default(),
            recording: RecordingSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

impl AppConfig {
    /// Directory exports are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.export
            .output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.clone())
    }
}

/// Sensor-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Discovery timeout in seconds
    pub discovery_timeout_secs: u64,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Only connect to a power meter whose name contains this
    pub bike_name_filter: Option<String>,
    /// Look for a heart rate strap
    pub heart_rate_enabled: bool,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: 30,
            connection_timeout_secs: 10,
            bike_name_filter: None,
            heart_rate_enabled: true,
        }
    }
}

impl SensorSettings {
    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            discovery_timeout_secs: self.discovery_timeout_secs,
            connection_timeout_secs: self.connection_timeout_secs,
        }
    }
}

/// Recording-related settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Sampling tick period in milliseconds
    pub sample_period_ms: u64,
    /// How live readings are presented and sampled
    pub display_mode: DisplayMode,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            sample_period_ms: DEFAULT_SAMPLE_PERIOD.as_millis() as u64,
            display_mode: DisplayMode::Filtered,
        }
    }
}

impl RecordingSettings {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms.max(1))
    }
}

/// Export-related settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Where exports go, defaults to the data directory
    pub output_dir: Option<PathBuf>,
    /// Also write the raw session as JSON
    pub write_json: bool,
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "powertrack", "PowerTrack")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from(&get_config_path())?;
    config.data_dir = get_data_dir();
    Ok(config)
}

/// Load configuration from a file, falling back to defaults when it is absent.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to a file, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
