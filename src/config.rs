//! Handler manifest consumed by the command line tool.
//!
//! Each entry names a protocol and carries its settings as an opaque JSON
//! value; the settings are only interpreted by the protocol's schema.

use crate::common::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Log configuration
    pub log: Option<LogConfig>,

    /// Inbound handlers to instantiate
    #[serde(default)]
    pub inbounds: Vec<HandlerConfig>,

    /// Outbound handlers to instantiate
    #[serde(default)]
    pub outbounds: Vec<HandlerConfig>,
}

/// Log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level, any `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One handler to create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Tag for this handler
    pub tag: Option<String>,

    /// Protocol name
    pub protocol: String,

    /// Protocol-specific settings
    pub settings: Option<serde_json::Value>,
}

impl HandlerConfig {
    /// Settings as raw configuration bytes; absent or null settings give an
    /// empty payload so the protocol falls back to its defaults.
    pub fn raw_settings(&self) -> CoreResult<Vec<u8>> {
        match &self.settings {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(value) => Ok(serde_json::to_vec(value)?),
        }
    }

    /// Tag, or a name derived from the protocol and position
    pub fn tag_or(&self, index: usize) -> String {
        self.tag
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.protocol, index))
    }
}

impl Config {
    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> CoreResult<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json)
    }

    /// Validate configuration
    pub fn validate(&self) -> CoreResult<()> {
        for (kind, handlers) in [("inbound", &self.inbounds), ("outbound", &self.outbounds)] {
            let mut tags = HashSet::new();
            for handler in handlers {
                if handler.protocol.trim().is_empty() {
                    return Err(CoreError::InvalidConfiguration(format!(
                        "Missing {} protocol name",
                        kind
                    )));
                }
                if let Some(ref tag) = handler.tag {
                    if !tags.insert(tag) {
                        return Err(CoreError::InvalidConfiguration(format!(
                            "Duplicate {} tag: {}",
                            kind, tag
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
