//! Structured logging setup
//!
//! `tracing` is used throughout the crate; binaries and test harnesses call
//! [`init_logging`] once to install a subscriber.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Enable pretty printing for development
    pub pretty_print: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Custom fields to include in the initialisation entry
    pub global_fields: serde_json::Map<String, Value>,
    /// Environment filter (supports directives like "oscar_odin=debug,catalogue_orm::n1=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_print: false,
            include_location: false,
            global_fields: serde_json::Map::new(),
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// JSON output for log shipping
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            env_filter: Some("oscar_odin=info,catalogue_orm=warn".to_string()),
            ..Self::default()
        }
        .with_global_field("env", "production")
    }

    /// Verbose output including prefetch plans and bulk stages
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            pretty_print: true,
            include_location: true,
            env_filter: Some("oscar_odin=debug,catalogue_orm=debug".to_string()),
            ..Self::default()
        }
        .with_global_field("env", "development")
    }

    /// Minimal output
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            env_filter: Some("oscar_odin=error".to_string()),
            ..Self::default()
        }
    }

    pub fn with_global_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.global_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = config.env_filter.as_deref().unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(env_filter))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .json(),
            )
            .try_init()?;
    } else if config.pretty_print {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .pretty(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(io::stdout)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init()?;
    }

    if config.global_fields.is_empty() {
        tracing::info!(
            target: "oscar_odin::logging",
            "Logging initialized (level: {}, format: {})",
            config.level,
            if config.json_format { "JSON" } else { "text" }
        );
    } else {
        let mut init_msg = json!({
            "message": "Logging initialized",
            "level": config.level,
            "json_format": config.json_format,
        });
        for (key, value) in &config.global_fields {
            init_msg[key] = value.clone();
        }
        tracing::info!(target: "oscar_odin::logging", "{}", init_msg);
    }

    Ok(())
}
