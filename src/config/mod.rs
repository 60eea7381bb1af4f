// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for SLBGM.
//!
//! This module provides the player configuration file and the watcher that
//! hot-reloads transition definitions.

pub mod watcher;

pub use watcher::{TransitionWatcher, WatchEvent};

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::timing::ANTICIPATION_MS;

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerConfig {
    /// Lead time before a segment ends at which the next one is queued
    #[serde(default = "default_anticipation_ms")]
    pub anticipation_ms: f64,
    /// Frames per decoder chunk
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,
    /// Output device settings
    #[serde(default)]
    pub audio: AudioConfig,
    /// Reload the transition file when it changes
    #[serde(default = "default_watch_transitions")]
    pub watch_transitions: bool,
    /// Debounce for transition file changes in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Default tracing filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_anticipation_ms() -> f64 {
    ANTICIPATION_MS
}
fn default_chunk_frames() -> usize {
    4096
}
fn default_watch_transitions() -> bool {
    true
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_log_filter() -> String {
    "slbgm=info".to_string()
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            anticipation_ms: default_anticipation_ms(),
            chunk_frames: default_chunk_frames(),
            audio: AudioConfig::default(),
            watch_transitions: default_watch_transitions(),
            debounce_ms: default_debounce_ms(),
            log_filter: default_log_filter(),
        }
    }
}

impl PlayerConfig {
    /// Load a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Reject values the player cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_frames == 0 {
            bail!("chunk_frames must be at least 1");
        }
        if self.audio.buffer_size == 0 {
            bail!("audio.buffer_size must be at least 1");
        }
        if self.audio.channels == 0 {
            bail!("audio.channels must be at least 1");
        }
        if !self.anticipation_ms.is_finite() || self.anticipation_ms < 0.0 {
            bail!("anticipation_ms must be a non-negative number");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = PlayerConfig::from_yaml("{}").unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.anticipation_ms, 16.0);
        assert_eq!(config.chunk_frames, 4096);
        assert_eq!(config.audio.buffer_size, 512);
        assert_eq!(config.log_filter, "slbgm=info");
    }

    #[test]
    fn test_parse_player_config() {
        let yaml = r#"
anticipation_ms: 20
chunk_frames: 1024
audio:
  sample_rate: 44100
  channels: 1
watch_transitions: false
log_filter: "slbgm=debug"
"#;
        let config = PlayerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.anticipation_ms, 20.0);
        assert_eq!(config.chunk_frames, 1024);
        assert_eq!(config.audio.sample_rate, Some(44100));
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.audio.buffer_size, 512);
        assert!(!config.watch_transitions);
        assert_eq!(config.debounce_ms, 500);
    }

    #[test]
    fn test_validation() {
        assert!(PlayerConfig::from_yaml("chunk_frames: 0").is_err());
        assert!(PlayerConfig::from_yaml("audio:\n  buffer_size: 0").is_err());
        assert!(PlayerConfig::from_yaml("anticipation_ms: -1").is_err());
        assert!(PlayerConfig::from_yaml("chunk_frames: [").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("slbgm.yaml");
        let config = PlayerConfig {
            debounce_ms: 250,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PlayerConfig::load(&path).unwrap(), config);
    }
}
