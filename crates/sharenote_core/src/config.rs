//! Core configuration loaded from `sharenote.toml`.
//!
//! ```toml
//! [storage]
//! db_path = "/var/lib/sharenote/notes.sqlite3"   # omitted = in-memory
//!
//! [logging]
//! level = "info"
//! dir = "/var/log/sharenote"                     # omitted = no file logs
//!
//! [realtime]
//! heartbeat_interval_ms = 10000
//! ```
//!
//! Every section is optional; an empty file is the default configuration.

use crate::logging::{default_log_level, init_logging, normalize_level, LoggingError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file path. `None` opens a private in-memory database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute directory for rolling log files. `None` leaves logging to the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_level() -> String {
    default_log_level().to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Invalid(String),
    Logging(LoggingError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "config read failed: {err}"),
            Self::Parse(err) => write!(f, "config parse failed: {err}"),
            Self::Serialize(err) => write!(f, "config serialize failed: {err}"),
            Self::Invalid(reason) => write!(f, "invalid config: {reason}"),
            Self::Logging(err) => write!(f, "logging: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialize(value)
    }
}

impl CoreConfig {
    pub fn filename() -> &'static str {
        "sharenote.toml"
    }

    /// Config backed by the SQLite file at `path`.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.db_path = Some(path.into());
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.realtime.heartbeat_interval_ms =
            u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.logging.level)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be absolute, got `{}`",
                    dir.display()
                )));
            }
        }
        if let Some(path) = &self.storage.db_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.db_path must not be empty".to_string(),
                ));
            }
        }
        if self.realtime.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "realtime.heartbeat_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.realtime.heartbeat_interval_ms)
    }

    /// Starts file logging when `logging.dir` is set.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        let Some(dir) = &self.logging.dir else {
            return Ok(false);
        };
        let dir = dir.to_str().ok_or_else(|| {
            ConfigError::Invalid("logging.dir must be valid UTF-8".to_string())
        })?;
        init_logging(&self.logging.level, dir).map_err(ConfigError::Logging)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_toml("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(10));
        assert!(config.storage.db_path.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = CoreConfig::from_toml(
            r#"
            [storage]
            db_path = "/tmp/notes.sqlite3"

            [logging]
            level = "warn"

            [realtime]
            heartbeat_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(
            config.storage.db_path.as_deref(),
            Some(std::path::Path::new("/tmp/notes.sqlite3"))
        );
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(250));
    }

    #[test]
    fn toml_output_parses_back() {
        let config = CoreConfig::default()
            .with_db_path("/tmp/a.sqlite3")
            .with_heartbeat_interval(Duration::from_secs(3));
        let parsed = CoreConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for doc in [
            "[realtime]\nheartbeat_interval_ms = 0",
            "[logging]\nlevel = \"loud\"",
            "[logging]\ndir = \"relative/logs\"",
        ] {
            assert!(
                matches!(CoreConfig::from_toml(doc), Err(ConfigError::Invalid(_))),
                "{doc}"
            );
        }
        assert!(matches!(
            CoreConfig::from_toml("[realtime]\nheartbeat_interval_ms = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_default_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CoreConfig::filename());
        let config = CoreConfig::default().with_heartbeat_interval(Duration::from_millis(500));
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(CoreConfig::load(&path).unwrap(), config);
        assert!(matches!(
            CoreConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn init_logging_without_dir_is_a_no_op() {
        assert!(!CoreConfig::default().init_logging().unwrap());
    }
}
