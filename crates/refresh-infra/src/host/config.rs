// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Host configuration, read from a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a [`HostConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid JSON for a [`HostConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Window and display settings the host reports to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Covers the whole screen.
    pub fullscreen: bool,
    /// A stereo pixel format is available.
    pub stereo: bool,
    /// Hardware gamma ramps are available.
    pub gamma: bool,
    /// Refresh rate in Hz.
    pub refresh_rate: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fullscreen: false,
            stereo: false,
            gamma: true,
            refresh_rate: 60,
        }
    }
}

/// Everything needed to build a [`StandardHost`](super::StandardHost).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Display settings.
    pub window: WindowConfig,
    /// Game data roots, lowest priority first. Directories are mounted along
    /// with every `.pk3` they contain; `.pk3` files are mounted directly.
    pub search_paths: Vec<PathBuf>,
    /// Where screenshots and other written files go. Also searched first.
    pub write_dir: Option<PathBuf>,
    /// Hunk budget in megabytes.
    pub hunk_megs: usize,
    /// Heap budget in megabytes.
    pub heap_megs: usize,
    /// Name of the renderer module to load.
    pub renderer: String,
    /// Frames rendered by the runtime before it exits.
    pub frames: u32,
    /// World to load, if any.
    pub map: Option<String>,
    /// `env_logger` filter.
    pub log_filter: String,
    /// Initial console variable values, applied before the renderer starts.
    pub cvars: BTreeMap<String, String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            search_paths: Vec::new(),
            write_dir: None,
            hunk_megs: 128,
            heap_megs: 64,
            renderer: "reference-gl".to_owned(),
            frames: 3,
            map: None,
            log_filter: "info".to_owned(),
            cvars: BTreeMap::new(),
        }
    }
}

impl HostConfig {
    /// Parses a configuration from JSON text. Missing keys take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Hunk budget in bytes.
    pub fn hunk_bytes(&self) -> usize {
        self.hunk_megs.saturating_mul(1024 * 1024)
    }

    /// Heap budget in bytes.
    pub fn heap_bytes(&self) -> usize {
        self.heap_megs.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = HostConfig::from_json("{}").expect("valid");
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.renderer, "reference-gl");
    }

    #[test]
    fn partial_window_section_keeps_other_defaults() {
        let config =
            HostConfig::from_json(r#"{ "window": { "stereo": true }, "hunk_megs": 2 }"#).expect("valid");
        assert!(config.window.stereo);
        assert_eq!(config.window.width, 640);
        assert_eq!(config.hunk_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            HostConfig::from_json("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }
}
