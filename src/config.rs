use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmartGidConfig {
    pub sensor: SensorConfig,
    pub camera: CameraConfig,
    pub backend: BackendConfig,
    pub wizard: WizardConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SensorConfig {
    /// Base URL of the RFID/weight/height ESP32
    #[serde(default = "default_sensor_address")]
    pub address: String,

    /// Pause between two polls of `/get-data`
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout for a single poll request
    #[serde(default = "default_sensor_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Overall time budget for acquiring a reading
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Base URL of the ESP32-CAM
    #[serde(default = "default_camera_address")]
    pub address: String,

    /// Timeout for a single `/capture` request
    #[serde(default = "default_camera_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Number of photos in one registration
    #[serde(default = "default_shot_count")]
    pub shot_count: usize,

    /// Pause after each photo while the goat is turned
    #[serde(default = "default_reposition_ms")]
    pub reposition_ms: u64,

    /// Pause before re-attempting a failed photo
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Attempts per photo before giving up (0 retries forever)
    #[serde(default = "default_max_attempts_per_shot")]
    pub max_attempts_per_shot: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BackendConfig {
    /// Base URL of the goat registry REST API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    #[serde(default = "default_backend_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Source of random goat names for the details form
    #[serde(default = "default_name_suggestion_url")]
    pub name_suggestion_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WizardConfig {
    /// Farm account that owns registered goats
    #[serde(default)]
    pub owner_id: String,

    /// Seconds the completion screen stays up
    #[serde(default = "default_complete_countdown_seconds")]
    pub complete_countdown_seconds: u64,

    /// Where the in-progress draft is checkpointed, if anywhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl SensorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }
}

impl CameraConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reposition_delay(&self) -> Duration {
        Duration::from_millis(self.reposition_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// `None` means a failed shot is retried until it succeeds
    pub fn attempt_limit(&self) -> Option<u32> {
        (self.max_attempts_per_shot > 0).then_some(self.max_attempts_per_shot)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl WizardConfig {
    pub fn complete_countdown(&self) -> Duration {
        Duration::from_secs(self.complete_countdown_seconds)
    }
}

impl SmartGidConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("smart-gid.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("sensor.address", default_sensor_address())?
            .set_default("sensor.poll_interval_ms", default_poll_interval_ms())?
            .set_default(
                "sensor.request_timeout_ms",
                default_sensor_request_timeout_ms(),
            )?
            .set_default("sensor.deadline_seconds", default_deadline_seconds())?
            .set_default("camera.address", default_camera_address())?
            .set_default(
                "camera.request_timeout_ms",
                default_camera_request_timeout_ms(),
            )?
            .set_default("camera.shot_count", default_shot_count() as u64)?
            .set_default("camera.reposition_ms", default_reposition_ms())?
            .set_default("camera.retry_backoff_ms", default_retry_backoff_ms())?
            .set_default(
                "camera.max_attempts_per_shot",
                default_max_attempts_per_shot(),
            )?
            .set_default("backend.base_url", default_backend_url())?
            .set_default("backend.request_timeout_ms", default_backend_timeout_ms())?
            .set_default("backend.name_suggestion_url", default_name_suggestion_url())?
            .set_default("wizard.owner_id", "")?
            .set_default(
                "wizard.complete_countdown_seconds",
                default_complete_countdown_seconds(),
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as u64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // SMARTGID_SENSOR__ADDRESS=http://... overrides sensor.address
            .add_source(
                Environment::with_prefix("SMARTGID")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SmartGidConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.address.is_empty() || self.camera.address.is_empty() {
            return Err(ConfigError::Message(
                "Sensor and camera addresses must be set".to_string(),
            ));
        }

        if self.sensor.request_timeout_ms == 0 || self.sensor.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Sensor poll interval and request timeout must be greater than 0".to_string(),
            ));
        }

        if self.sensor.deadline() <= self.sensor.poll_interval() {
            return Err(ConfigError::Message(
                "Sensor deadline must be longer than the poll interval".to_string(),
            ));
        }

        if self.camera.shot_count == 0 {
            return Err(ConfigError::Message(
                "Camera shot_count must be greater than 0".to_string(),
            ));
        }

        if self.camera.request_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Camera request timeout must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as a TOML document
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for SmartGidConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig {
                address: default_sensor_address(),
                poll_interval_ms: default_poll_interval_ms(),
                request_timeout_ms: default_sensor_request_timeout_ms(),
                deadline_seconds: default_deadline_seconds(),
            },
            camera: CameraConfig {
                address: default_camera_address(),
                request_timeout_ms: default_camera_request_timeout_ms(),
                shot_count: default_shot_count(),
                reposition_ms: default_reposition_ms(),
                retry_backoff_ms: default_retry_backoff_ms(),
                max_attempts_per_shot: default_max_attempts_per_shot(),
            },
            backend: BackendConfig {
                base_url: default_backend_url(),
                request_timeout_ms: default_backend_timeout_ms(),
                name_suggestion_url: default_name_suggestion_url(),
            },
            wizard: WizardConfig {
                owner_id: String::new(),
                complete_countdown_seconds: default_complete_countdown_seconds(),
                draft_path: None,
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_sensor_address() -> String {
    "http://192.168.1.106".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_sensor_request_timeout_ms() -> u64 {
    2000
}
fn default_deadline_seconds() -> u64 {
    20
}

fn default_camera_address() -> String {
    "http://10.15.33.35".to_string()
}
fn default_camera_request_timeout_ms() -> u64 {
    10_000
}
fn default_shot_count() -> usize {
    4
}
fn default_reposition_ms() -> u64 {
    1500
}
fn default_retry_backoff_ms() -> u64 {
    2000
}
fn default_max_attempts_per_shot() -> u32 {
    5
}

fn default_backend_url() -> String {
    "http://10.10.108.187:5000".to_string()
}
fn default_backend_timeout_ms() -> u64 {
    15_000
}
fn default_name_suggestion_url() -> String {
    "https://randomuser.me/api/?inc=name&nat=us,gb".to_string()
}

fn default_complete_countdown_seconds() -> u64 {
    10
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SmartGidConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensor.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.sensor.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.sensor.deadline(), Duration::from_secs(20));
        assert_eq!(config.camera.shot_count, 4);
        assert_eq!(config.camera.attempt_limit(), Some(5));
    }

    #[test]
    fn test_unbounded_attempts() {
        let mut config = SmartGidConfig::default();
        config.camera.max_attempts_per_shot = 0;
        assert_eq!(config.camera.attempt_limit(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SmartGidConfig::default();

        config.sensor.deadline_seconds = 1;
        config.sensor.poll_interval_ms = 1000;
        assert!(config.validate().is_err());

        config.sensor.deadline_seconds = 20;
        config.camera.shot_count = 0;
        assert!(config.validate().is_err());

        config.camera.shot_count = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[sensor]\naddress = \"http://10.0.0.9\"\ndeadline_seconds = 30\n\n[wizard]\nowner_id = \"farm-7\""
        )
        .unwrap();

        let config = SmartGidConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.sensor.address, "http://10.0.0.9");
        assert_eq!(config.sensor.deadline_seconds, 30);
        assert_eq!(config.sensor.poll_interval_ms, 1000);
        assert_eq!(config.wizard.owner_id, "farm-7");
        assert_eq!(config.camera.shot_count, 4);
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = SmartGidConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[sensor]"));
        let parsed: SmartGidConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
