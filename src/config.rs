//! Application-level configuration loading: lifecycle policy and store selection.

use std::{env, fs, io::ErrorKind, path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MATCH_LIFECYCLE_CONFIG_PATH";
/// Environment variable selecting the storage backend.
const STORE_BACKEND_ENV: &str = "STORE_BACKEND";

/// Time after kick-off at which a live match is expired.
pub const DEFAULT_EXPIRY_THRESHOLD: Duration = Duration::from_secs(90 * 60);
/// Cadence of the scheduler tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);
/// Collection holding the match documents.
pub const DEFAULT_COLLECTION: &str = "matches";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    tick_interval: Duration,
    expiry_threshold: Duration,
    collection: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        tick_interval_secs = app_config.tick_interval.as_secs(),
                        expiry_threshold_minutes = app_config.expiry_threshold.as_secs() / 60,
                        collection = %app_config.collection,
                        "loaded lifecycle configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON configuration document. Absent keys keep their default value.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Cadence of the scheduler tick.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Elapsed time since kick-off after which a live match expires.
    pub fn expiry_threshold(&self) -> Duration {
        self.expiry_threshold
    }

    /// Name of the collection holding match documents.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Replace the expiry threshold.
    pub fn with_expiry_threshold(mut self, threshold: Duration) -> Self {
        self.expiry_threshold = threshold;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            expiry_threshold: DEFAULT_EXPIRY_THRESHOLD,
            collection: DEFAULT_COLLECTION.to_owned(),
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    tick_interval_secs: Option<Duration>,
    expiry_threshold_minutes: Option<u64>,
    collection: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();

        let tick_interval = match value.tick_interval_secs {
            Some(interval) if interval.is_zero() => {
                warn!("tick interval must be positive; using default");
                defaults.tick_interval
            }
            Some(interval) => interval,
            None => defaults.tick_interval,
        };

        let expiry_threshold = match value.expiry_threshold_minutes {
            Some(0) => {
                warn!("expiry threshold must be positive; using default");
                defaults.expiry_threshold
            }
            Some(minutes) => Duration::from_secs(minutes.saturating_mul(60)),
            None => defaults.expiry_threshold,
        };

        let collection = value
            .collection
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.collection);

        Self {
            tick_interval,
            expiry_threshold,
            collection,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Persistence backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// MongoDB replica set (`mongo-store` feature).
    Mongo,
    /// Firestore REST API (`firestore-store` feature).
    Firestore,
    /// Process-local store, lost on restart.
    Memory,
}

impl StoreBackend {
    /// Read [`STORE_BACKEND_ENV`], defaulting to MongoDB.
    pub fn from_env() -> Self {
        match env::var(STORE_BACKEND_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                warn!(value = %value, "unknown store backend; using mongo");
                StoreBackend::Mongo
            }),
            Err(_) => StoreBackend::Mongo,
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(other.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_ninety_minute_threshold() {
        let config = AppConfig::default();
        assert_eq!(config.expiry_threshold(), Duration::from_secs(5400));
        assert_eq!(config.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.collection(), "matches");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = AppConfig::from_json(r#"{"expiry_threshold_minutes": 130}"#).unwrap();
        assert_eq!(config.expiry_threshold(), Duration::from_secs(130 * 60));
        assert_eq!(config.tick_interval(), DEFAULT_TICK_INTERVAL);
    }

    #[test]
    fn zero_values_are_replaced_by_defaults() {
        let config = AppConfig::from_json(
            r#"{"tick_interval_secs": 0, "expiry_threshold_minutes": 0, "collection": " "}"#,
        )
        .unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn tick_interval_is_read_in_seconds() {
        let config = AppConfig::from_json(r#"{"tick_interval_secs": 15}"#).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_secs(15));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(AppConfig::from_json("{not json").is_err());
    }

    #[test]
    fn store_backend_names_are_case_insensitive() {
        assert_eq!("MongoDB".parse(), Ok(StoreBackend::Mongo));
        assert_eq!(" firestore ".parse(), Ok(StoreBackend::Firestore));
        assert_eq!("memory".parse(), Ok(StoreBackend::Memory));
        assert!("cassandra".parse::<StoreBackend>().is_err());
    }
}
