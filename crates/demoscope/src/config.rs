//! # Parser Configuration
//!
//! Settings for a [`DemoFile`](crate::DemoFile), loadable from TOML:
//!
//! ```toml
//! scratch_capacity = 262144
//! tokenize_wrappers = true
//! warn_on_tick_regression = false
//! ```
//!
//! Missing keys take their default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DemoError, DemoResult};

/// Default capacity of the decompression scratch buffer in bytes.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 102_400;

/// Demo parser settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Size of the decompression scratch buffer (default: 102400).
    /// Compressed payloads that expand past it lose their payload.
    #[serde(default = "default_scratch_capacity")]
    pub scratch_capacity: usize,
    /// Tokenize the sub-frames of wrapper packets (default: true).
    #[serde(default = "default_true")]
    pub tokenize_wrappers: bool,
    /// Log a warning when a packet's tick goes backwards (default: true).
    #[serde(default = "default_true")]
    pub warn_on_tick_regression: bool,
}

fn default_scratch_capacity() -> usize {
    DEFAULT_SCRATCH_CAPACITY
}

fn default_true() -> bool {
    true
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            tokenize_wrappers: true,
            warn_on_tick_regression: true,
        }
    }
}

impl ParserConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// [`DemoError::Config`] if the text is not valid TOML for this type or
    /// fails [`ParserConfig::validate`].
    pub fn from_toml_str(text: &str) -> DemoResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| DemoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// [`DemoError::Io`] if the file cannot be read, otherwise as
    /// [`ParserConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> DemoResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serializes the configuration to TOML text.
    ///
    /// # Errors
    ///
    /// [`DemoError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> DemoResult<String> {
        toml::to_string(self).map_err(|e| DemoError::Config(e.to_string()))
    }

    /// Checks the settings are usable.
    ///
    /// # Errors
    ///
    /// [`DemoError::Config`] for a zero scratch capacity.
    pub fn validate(&self) -> DemoResult<()> {
        if self.scratch_capacity == 0 {
            return Err(DemoError::Config(
                "scratch_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
