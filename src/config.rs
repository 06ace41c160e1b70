// SPDX-License-Identifier: GPL-3.0-only

//! Filter configuration
//!
//! The three options the host exposes at open time. Keys match the host's
//! option names so a JSON file written by hand reads the same as the host UI.

use crate::constants::{DEFAULT_ADAPTER, DEFAULT_SHARPNESS, SHARPNESS_MAX, SHARPNESS_MIN};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Zero-based adapter index (negative values never match an adapter)
    #[serde(rename = "cas-adapter")]
    pub adapter: i64,
    /// Sharpening strength in [0, 1]
    #[serde(rename = "cas-sharpness")]
    pub sharpness: f32,
    /// Prefer the reduced-precision kernel when the device supports it
    #[serde(rename = "cas-fp16prefer")]
    pub fp16_prefer: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            adapter: DEFAULT_ADAPTER as i64,
            sharpness: DEFAULT_SHARPNESS,
            fp16_prefer: false,
        }
    }
}

impl FilterConfig {
    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: FilterConfig = serde_json::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Copy with sharpness forced into range (NaN becomes the default)
    pub fn sanitized(mut self) -> Self {
        self.sharpness = if self.sharpness.is_nan() {
            DEFAULT_SHARPNESS
        } else {
            self.sharpness.clamp(SHARPNESS_MIN, SHARPNESS_MAX)
        };
        self
    }

    /// Adapter index as an enumeration position, if it can name one
    pub fn adapter_index(&self) -> Option<usize> {
        usize::try_from(self.adapter).ok()
    }
}
