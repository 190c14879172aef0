//! Runtime settings
//!
//! Defaults can be overridden from `ODIN_*` environment variables or from a
//! YAML file. Settings are validated before use.

use std::env;
use std::path::Path;

use catalogue_orm::{Database, MediaStorage};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LoggingConfig;

pub const DEFAULT_RESOURCES_TO_DB_CHUNK_SIZE: usize = 500;
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdinConfig {
    /// Number of resources persisted per bulk round trip
    pub resources_to_db_chunk_size: usize,
    /// Number of natural keys per lookup statement
    pub batch_size: usize,
    /// Base URL of stored media files
    pub media_url: String,
    /// Lazy loads of one relation before an N+1 warning is logged
    pub n1_warning_threshold: usize,
    pub logging: LoggingConfig,
}

impl Default for OdinConfig {
    fn default() -> Self {
        Self {
            resources_to_db_chunk_size: DEFAULT_RESOURCES_TO_DB_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            media_url: "/media/".to_string(),
            n1_warning_threshold: 3,
            logging: LoggingConfig::default(),
        }
    }
}

fn env_usize(name: &str, field: &str) -> Result<Option<usize>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: field.to_string(),
                value: raw,
                expected: "a positive integer".to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl OdinConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(size) = env_usize("ODIN_RESOURCES_TO_DB_CHUNK_SIZE", "resources_to_db_chunk_size")? {
            config.resources_to_db_chunk_size = size;
        }
        if let Some(size) = env_usize("ODIN_BATCH_SIZE", "batch_size")? {
            config.batch_size = size;
        }
        if let Some(threshold) = env_usize("ODIN_N1_THRESHOLD", "n1_warning_threshold")? {
            config.n1_warning_threshold = threshold;
        }
        if let Ok(media_url) = env::var("ODIN_MEDIA_URL") {
            config.media_url = media_url;
        }
        if let Ok(level) = env::var("ODIN_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("resources_to_db_chunk_size", self.resources_to_db_chunk_size),
            ("batch_size", self.batch_size),
            ("n1_warning_threshold", self.n1_warning_threshold),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    expected: "a value greater than 0".to_string(),
                });
            }
        }

        if self.media_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "media_url".to_string(),
                hint: "Set ODIN_MEDIA_URL or media_url in the settings file".to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                expected: format!("one of: {}", valid_levels.join(", ")),
            });
        }

        Ok(())
    }

    pub fn media_storage(&self) -> MediaStorage {
        MediaStorage::new(self.media_url.as_str())
    }

    /// Empty database using these settings
    pub fn database(&self) -> Database {
        Database::new()
            .with_media(self.media_storage())
            .with_lazy_load_threshold(self.n1_warning_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for name in [
            "ODIN_RESOURCES_TO_DB_CHUNK_SIZE",
            "ODIN_BATCH_SIZE",
            "ODIN_N1_THRESHOLD",
            "ODIN_MEDIA_URL",
            "ODIN_LOG_LEVEL",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_defaults() {
        let config = OdinConfig::default();
        assert_eq!(config.resources_to_db_chunk_size, 500);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.media_url, "/media/");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        env::set_var("ODIN_RESOURCES_TO_DB_CHUNK_SIZE", "50");
        env::set_var("ODIN_MEDIA_URL", "https://cdn.example.com/media/");

        let config = OdinConfig::from_env().unwrap();
        assert_eq!(config.resources_to_db_chunk_size, 50);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.media_url, "https://cdn.example.com/media/");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_garbage() {
        clear_env();
        env::set_var("ODIN_BATCH_SIZE", "lots");

        let err = OdinConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "batch_size"));

        env::set_var("ODIN_BATCH_SIZE", "0");
        assert!(OdinConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resources_to_db_chunk_size: 25").unwrap();
        writeln!(file, "media_url: /static/media/").unwrap();
        writeln!(file, "logging:").unwrap();
        writeln!(file, "  level: debug").unwrap();

        let config = OdinConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.resources_to_db_chunk_size, 25);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.database().media().base_url(), "/static/media/");
    }

    #[test]
    fn test_invalid_log_level() {
        let result = OdinConfig::from_yaml_str("logging:\n  level: loud\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
