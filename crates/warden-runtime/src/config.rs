//! Host configuration
//!
//! Every field has a default matching the reference policy (production
//! mode, 50 events per second, 64 KiB events, 1 MiB saved state), so a host
//! only spells out what it changes:
//!
//! ```json
//! {
//!   "pipeline": { "mode": "development", "producerId": "arcade-7" },
//!   "gate": { "allowDevLogAfterEnd": true },
//!   "capabilities": ["storage", "audio"]
//! }
//! ```

use serde::{Deserialize, Serialize};

use warden_core::{ConfigError, ValidationMode};
use warden_emit::PipelineConfig;
use warden_session::GateConfig;

use crate::LoggingConfig;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    pub pipeline: PipelineConfig,
    pub gate: GateConfig,
    /// Capability names the guest declared
    pub capabilities: Vec<String>,
    pub logging: LoggingConfig,
}

impl HostConfig {
    pub fn development() -> Self {
        HostConfig {
            pipeline: PipelineConfig::development(),
            ..Default::default()
        }
    }

    /// Parse and check a JSON configuration document
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pipeline = &self.pipeline;
        if pipeline.window_ms == 0 {
            return Err(ConfigError::Invalid("pipeline.windowMs must be positive".into()));
        }
        if pipeline.max_event_bytes == 0 || pipeline.max_state_bytes == 0 {
            return Err(ConfigError::Invalid("size ceilings must be positive".into()));
        }
        if pipeline.producer_id.is_empty() {
            return Err(ConfigError::Invalid("pipeline.producerId must be non-empty".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn mode(&self) -> ValidationMode {
        self.pipeline.mode
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.pipeline.mode = mode;
        self
    }

    pub fn with_capabilities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = names.into_iter().map(Into::into).collect();
        self
    }
}
