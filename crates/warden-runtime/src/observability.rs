//! Tracing setup
//!
//! Libraries in this workspace only emit `tracing` events. Binaries and test
//! harnesses that want to see them call [`init_tracing`] once.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use warden_core::ConfigError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` is used when absent
    pub filter: Option<String>,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            format: LogFormat::Compact,
            filter: None,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn json() -> Self {
        LoggingConfig {
            format: LogFormat::Json,
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        match &self.filter {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|e| ConfigError::Invalid(format!("log filter {:?}: {}", directives, e))),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
        }
    }
}

/// Install the global tracing subscriber
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };
    installed.map_err(|e| ConfigError::Invalid(format!("tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_filter_rejected() {
        let config = LoggingConfig::default().with_filter("warden=notalevel");
        assert!(matches!(init_tracing(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_from_json() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"format": "json", "filter": "warden_emit=debug"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter.as_deref(), Some("warden_emit=debug"));
        assert!(config.with_target);
    }
}
