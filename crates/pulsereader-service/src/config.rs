//! Service configuration.
//!
//! A [`ServiceConfig`] is the engine configuration plus the channels to add at
//! start-up. Files are YAML (`.yaml`, `.yml`) or JSON (`.json`); unlike the
//! engine's own setters, which clamp, loaded files are validated strictly.

use pulsereader_core::{
    EngineConfig, LineId, MAX_CHANNELS, MAX_FILTER_WINDOW, MIN_FILTER_WINDOW,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};

/// One channel to add at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Hardware line number.
    pub line: LineId,
    /// Median filter window; the engine default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_window: Option<usize>,
}

impl ChannelConfig {
    /// Channel on `line` using the engine's default window.
    #[must_use]
    pub fn new(line: LineId) -> Self {
        Self {
            line,
            filter_window: None,
        }
    }

    /// Set an explicit filter window.
    #[must_use]
    pub fn with_filter_window(mut self, window: usize) -> Self {
        self.filter_window = Some(window);
        self
    }
}

/// File format of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML.
    Yaml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnsupportedFormat`] for anything but
    /// `.yaml`, `.yml` and `.json`.
    pub fn from_path(path: &Path) -> ServiceResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ServiceError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Engine settings plus start-up channels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Engine settings.
    pub engine: EngineConfig,
    /// Channels added when the service starts.
    pub channels: Vec<ChannelConfig>,
}

impl ServiceConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Engine`] for an out-of-range engine setting and
    /// [`ServiceError::Config`] for too many channels, duplicate lines or an
    /// out-of-range channel window.
    pub fn validate(&self) -> ServiceResult<()> {
        self.engine.validate()?;

        if self.channels.len() > MAX_CHANNELS {
            return Err(ServiceError::config(format!(
                "{} channels configured, at most {MAX_CHANNELS} supported",
                self.channels.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.channels.len());
        for channel in &self.channels {
            if !seen.insert(channel.line) {
                return Err(ServiceError::config(format!(
                    "line {} configured more than once",
                    channel.line
                )));
            }
            if let Some(window) = channel.filter_window
                && !(MIN_FILTER_WINDOW..=MAX_FILTER_WINDOW).contains(&window)
            {
                return Err(ServiceError::config(format!(
                    "filter_window for line {} must be between {MIN_FILTER_WINDOW} and {MAX_FILTER_WINDOW}, got {window}",
                    channel.line
                )));
            }
        }
        Ok(())
    }

    /// Window a configured channel will be added with.
    #[must_use]
    pub fn window_for(&self, channel: &ChannelConfig) -> usize {
        channel
            .filter_window
            .unwrap_or(self.engine.default_filter_window)
    }

    /// Parse and validate YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if the text does not parse, or any
    /// error from [`ServiceConfig::validate`].
    pub fn from_yaml_str(text: &str) -> ServiceResult<Self> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| ServiceError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if the text does not parse, or any
    /// error from [`ServiceConfig::validate`].
    pub fn from_json_str(text: &str) -> ServiceResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ServiceError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file, choosing the parser by extension.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnsupportedFormat`], [`ServiceError::Io`] or any
    /// parse and validation error.
    pub fn load(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let text = std::fs::read_to_string(path).map_err(|e| ServiceError::io(path, e))?;

        let config = match format {
            ConfigFormat::Yaml => Self::from_yaml_str(&text)?,
            ConfigFormat::Json => Self::from_json_str(&text)?,
        };
        debug!(path = %path.display(), channels = config.channels.len(), "Loaded configuration");
        Ok(config)
    }

    /// Render as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if serialization fails.
    pub fn to_yaml(&self) -> ServiceResult<String> {
        serde_yaml::to_string(self).map_err(|e| ServiceError::config(e.to_string()))
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if serialization fails.
    pub fn to_json(&self) -> ServiceResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ServiceError::config(e.to_string()))
    }
}
