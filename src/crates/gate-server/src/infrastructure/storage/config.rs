//! TOML-based configuration for the gate service.
//!
//! The file path comes from `--config` (or `GATE_CONFIG`); a missing file is
//! not an error and yields the defaults.  A handful of `GATE_*` environment
//! variables then override individual values, which is convenient for
//! containers and for keeping the shared secret out of the file.
//!
//! ```toml
//! [broker]
//! address = "127.0.0.1"
//! port = 1883
//!
//! [security]
//! shared_secret = "PARKING_SECRET_KEY"
//! replay_window = 0
//!
//! [parking]
//! max_capacity = 10
//! storage_path = "records.csv"
//!
//! [weather]
//! city = "Lyon"
//! api_key = ""
//!
//! [status]
//! interval_secs = 30
//!
//! [topics]
//! command = "parking/cmd"
//! response = "parking/resp"
//! status = "parking/weather"
//!
//! [service]
//! log_level = "info"
//! ```
//!
//! Every section and field is optional: `#[serde(default)]` fills in
//! whatever the file leaves out.
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `GATE_BROKER_ADDRESS` | `broker.address` |
//! | `GATE_BROKER_PORT` | `broker.port` |
//! | `GATE_SHARED_SECRET` | `security.shared_secret` |
//! | `GATE_MAX_CAPACITY` | `parking.max_capacity` |
//! | `GATE_STORAGE_PATH` | `parking.storage_path` |
//! | `GATE_WEATHER_API_KEY` | `weather.api_key` |
//! | `GATE_CITY` | `weather.city` |

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use gate_core::SharedSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::application::status::StatusSettings;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("no shared secret configured (set security.shared_secret or GATE_SHARED_SECRET)")]
    MissingSecret,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    pub broker: BrokerConfig,
    pub security: SecurityConfig,
    pub parking: ParkingConfig,
    pub weather: WeatherConfig,
    pub status: StatusConfig,
    pub topics: TopicsConfig,
    pub service: ServiceConfig,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    pub address: String,
    pub port: u16,
    /// MQTT client identifier; must be unique per broker.
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Pause before polling the event loop again after a connection error.
    pub reconnect_backoff_secs: u64,
}

/// Shared-secret and replay settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Key shared with the edge device.  Never logged.
    pub shared_secret: String,
    /// How many recent nonces to remember; `0` accepts resent frames.
    pub replay_window: usize,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("shared_secret", &"<redacted>")
            .field("replay_window", &self.replay_window)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParkingConfig {
    /// Number of places shown as the denominator on the status line.
    pub max_capacity: u32,
    /// Path of the record file.
    pub storage_path: PathBuf,
}

/// OpenWeatherMap settings.  An empty `api_key` disables lookups.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WeatherConfig {
    pub city: String,
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("city", &self.city)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StatusConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopicsConfig {
    pub command: String,
    pub response: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    pub log_level: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 1883,
            client_id: format!("gate-server-{}", Uuid::new_v4().simple()),
            keep_alive_secs: 60,
            reconnect_backoff_secs: 5,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            shared_secret: String::new(),
            replay_window: 0,
        }
    }
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10,
            storage_path: PathBuf::from("records.csv"),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            city: "Lyon".to_string(),
            api_key: String::new(),
            base_url: "http://api.openweathermap.org".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            command: "parking/cmd".to_string(),
            response: "parking/resp".to_string(),
            status: "parking/weather".to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads the configuration at `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GateConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

impl GateConfig {
    /// Applies `GATE_*` overrides read through `lookup`.
    ///
    /// Taking the lookup as a function keeps tests independent of the
    /// process environment; the binary passes `|k| std::env::var(k).ok()`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a numeric variable does not
    /// parse.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("GATE_BROKER_ADDRESS") {
            self.broker.address = v;
        }
        if let Some(v) = lookup("GATE_BROKER_PORT") {
            self.broker.port = parse_env("GATE_BROKER_PORT", v)?;
        }
        if let Some(v) = lookup("GATE_SHARED_SECRET") {
            self.security.shared_secret = v;
        }
        if let Some(v) = lookup("GATE_MAX_CAPACITY") {
            self.parking.max_capacity = parse_env("GATE_MAX_CAPACITY", v)?;
        }
        if let Some(v) = lookup("GATE_STORAGE_PATH") {
            self.parking.storage_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("GATE_WEATHER_API_KEY") {
            self.weather.api_key = v;
        }
        if let Some(v) = lookup("GATE_CITY") {
            self.weather.city = v;
        }
        Ok(())
    }

    /// Checks values the service cannot run without.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingSecret`] for an empty shared secret, otherwise
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.shared_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        let non_zero = [
            ("broker.port", u64::from(self.broker.port)),
            ("broker.keep_alive_secs", self.broker.keep_alive_secs),
            ("status.interval_secs", self.status.interval_secs),
            ("weather.timeout_secs", self.weather.timeout_secs),
        ];
        if let Some((field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
        }
        let topics = [
            ("topics.command", &self.topics.command),
            ("topics.response", &self.topics.response),
            ("topics.status", &self.topics.status),
        ];
        if let Some((field, _)) = topics.iter().find(|(_, topic)| topic.is_empty()) {
            return Err(ConfigError::Invalid(format!("{field} must not be empty")));
        }
        if self.broker.client_id.is_empty() {
            return Err(ConfigError::Invalid("broker.client_id must not be empty".into()));
        }
        Ok(())
    }

    pub fn shared_secret(&self) -> SharedSecret {
        SharedSecret::from(self.security.shared_secret.as_str())
    }

    pub fn status_settings(&self) -> StatusSettings {
        StatusSettings {
            max_capacity: self.parking.max_capacity,
            city: self.weather.city.clone(),
            interval: Duration::from_secs(self.status.interval_secs),
            weather_timeout: Duration::from_secs(self.weather.timeout_secs),
            topic: self.topics.status.clone(),
        }
    }
}

fn parse_env<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid() -> GateConfig {
        let mut cfg = GateConfig::default();
        cfg.security.shared_secret = "K".into();
        cfg
    }

    // ── defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_defaults_match_documented_values() {
        // Arrange / Act
        let cfg = GateConfig::default();

        // Assert
        assert_eq!(cfg.broker.address, "127.0.0.1");
        assert_eq!(cfg.broker.port, 1883);
        assert_eq!(cfg.parking.max_capacity, 10);
        assert_eq!(cfg.parking.storage_path, PathBuf::from("records.csv"));
        assert_eq!(cfg.weather.city, "Lyon");
        assert_eq!(cfg.status.interval_secs, 30);
        assert_eq!(cfg.weather.timeout_secs, 5);
        assert_eq!(cfg.security.replay_window, 0);
        assert_eq!(cfg.topics.command, "parking/cmd");
        assert_eq!(cfg.topics.response, "parking/resp");
        assert_eq!(cfg.topics.status, "parking/weather");
        assert_eq!(cfg.service.log_level, "info");
    }

    #[test]
    fn test_default_client_ids_are_unique() {
        assert_ne!(BrokerConfig::default().client_id, BrokerConfig::default().client_id);
    }

    // ── parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let cfg: GateConfig = toml::from_str(
            r#"
            [parking]
            max_capacity = 42

            [security]
            shared_secret = "S3CRET"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.parking.max_capacity, 42);
        assert_eq!(cfg.parking.storage_path, PathBuf::from("records.csv"));
        assert_eq!(cfg.security.shared_secret, "S3CRET");
        assert_eq!(cfg.broker.port, 1883);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut cfg = valid();
        cfg.weather.city = "Grenoble".into();
        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: GateConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("gate-{}.toml", Uuid::new_v4()));
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.parking.max_capacity, 10);
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let path = std::env::temp_dir().join(format!("gate-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "[broker\nport = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_file(path).ok();
    }

    // ── environment overrides ─────────────────────────────────────────────────

    #[test]
    fn test_env_overrides_replace_file_values() {
        // Arrange
        let mut cfg = GateConfig::default();
        let lookup = env(&[
            ("GATE_BROKER_ADDRESS", "broker.local"),
            ("GATE_BROKER_PORT", "8883"),
            ("GATE_SHARED_SECRET", "from-env"),
            ("GATE_MAX_CAPACITY", "25"),
            ("GATE_STORAGE_PATH", "/var/lib/gate/records.csv"),
            ("GATE_WEATHER_API_KEY", "abc"),
            ("GATE_CITY", "Paris"),
        ]);

        // Act
        cfg.apply_env_overrides(lookup).unwrap();

        // Assert
        assert_eq!(cfg.broker.address, "broker.local");
        assert_eq!(cfg.broker.port, 8883);
        assert_eq!(cfg.security.shared_secret, "from-env");
        assert_eq!(cfg.parking.max_capacity, 25);
        assert_eq!(
            cfg.parking.storage_path,
            PathBuf::from("/var/lib/gate/records.csv")
        );
        assert_eq!(cfg.weather.api_key, "abc");
        assert_eq!(cfg.weather.city, "Paris");
    }

    #[test]
    fn test_non_numeric_port_override_is_rejected() {
        let mut cfg = GateConfig::default();
        let err = cfg
            .apply_env_overrides(env(&[("GATE_BROKER_PORT", "mqtt")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "GATE_BROKER_PORT",
                ..
            }
        ));
    }

    // ── validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_validate_requires_shared_secret() {
        assert!(matches!(
            GateConfig::default().validate(),
            Err(ConfigError::MissingSecret)
        ));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut cfg = valid();
        cfg.status.interval_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("status.interval_secs"), "{err}");
    }

    #[test]
    fn test_validate_rejects_empty_topic() {
        let mut cfg = valid();
        cfg.topics.response.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let mut cfg = valid();
        cfg.security.shared_secret = "TOP-SECRET".into();
        cfg.weather.api_key = "KEY-123".into();
        let text = format!("{cfg:?}");
        assert!(!text.contains("TOP-SECRET"));
        assert!(!text.contains("KEY-123"));
    }

    #[test]
    fn test_status_settings_follow_config() {
        let settings = valid().status_settings();
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert_eq!(settings.weather_timeout, Duration::from_secs(5));
        assert_eq!(settings.topic, "parking/weather");
        assert_eq!(settings.city, "Lyon");
    }
}
