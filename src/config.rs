//! Configuration file loading.
//!
//! Every section is optional; missing keys take their defaults.
//!
//! ```toml
//! [estimator]
//! template_threshold = 0.8
//! cascade = ["features", "template"]
//!
//! [compositor]
//! blend = { mode = "fixed", incoming = 0.7 }
//!
//! [pipeline]
//! drop_duplicate_frames = true
//! ```

use crate::composition::CompositorConfig;
use crate::estimation::EstimatorConfig;
use crate::stitcher::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
    /// The technique list is empty or misordered.
    #[error("invalid estimator cascade: {0}")]
    InvalidCascade(String),
    /// A value is out of range.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[estimator]` section.
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// `[compositor]` section.
    #[serde(default)]
    pub compositor: CompositorConfig,
    /// `[pipeline]` section.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parses and validates TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.estimator.validate()?;
        self.compositor.validate()?;
        Ok(())
    }
}
