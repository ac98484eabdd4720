// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{config as paths, decoder, render};
use crate::errors::ConfigError;
use crate::grading::ColorGradeParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Presentation pacing for GPU surfaces
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PresentModePreference {
    /// Wait for vblank, never tear (always supported)
    #[default]
    Fifo,
    /// Latest frame wins at vblank
    Mailbox,
    /// Present as soon as possible, may tear
    Immediate,
}

/// Render thread and surface settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Draws swallowed after each clear before compositing starts
    pub warmup_frames: u32,
    /// Upper bound for `RenderThread::stop` waiting on GPU teardown
    pub stop_timeout_ms: u64,
    /// Prefer an integrated GPU
    pub prefer_low_power: bool,
    pub present_mode: PresentModePreference,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            warmup_frames: render::DEFAULT_WARMUP_FRAMES,
            stop_timeout_ms: render::DEFAULT_STOP_TIMEOUT.as_millis() as u64,
            prefer_low_power: false,
            present_mode: PresentModePreference::default(),
        }
    }
}

impl RenderSettings {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Decoder pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    /// Deliver frames at the stream's native rate instead of as fast as decoded
    pub sync_to_clock: bool,
    /// How long to wait for the pipeline to preroll
    pub preroll_timeout_ms: u64,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            sync_to_clock: true,
            preroll_timeout_ms: decoder::DEFAULT_PREROLL_TIMEOUT.as_millis() as u64,
        }
    }
}

impl DecoderSettings {
    pub fn preroll_timeout(&self) -> Duration {
        Duration::from_millis(self.preroll_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderSettings,
    /// Grading applied until the host replaces it
    pub grading: ColorGradeParams,
    pub decoder: DecoderSettings,
}

impl Config {
    /// Default config file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(paths::APP_DIR).join(paths::FILE_NAME))
    }

    /// Load from the default location; a missing file yields defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No platform config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `load`, falling back to defaults with a warning when the file is unusable
    pub fn load_or_default() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from_or_default(&path),
            None => Self::default(),
        }
    }

    /// `load_from`, falling back to defaults with a warning when the file is unusable
    pub fn load_from_or_default(path: &Path) -> Self {
        Self::load_from(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config, using defaults");
            Self::default()
        })
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Copy with out-of-range values pulled back into range
    pub fn validated(mut self) -> Self {
        self.grading = self.grading.sanitized();
        self.render.stop_timeout_ms = self.render.stop_timeout_ms.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"render":{"warmup_frames":2},"grading":{"hue":0.1}}"#)
                .unwrap();
        assert_eq!(config.render.warmup_frames, 2);
        assert_eq!(config.render.stop_timeout_ms, 500);
        assert_eq!(config.grading.hue, 0.1);
        assert_eq!(config.grading.gamma, 0.8);
        assert!(config.decoder.sync_to_clock);
    }

    #[test]
    fn test_present_mode_names() {
        let json = serde_json::to_string(&PresentModePreference::Mailbox).unwrap();
        assert_eq!(json, "\"Mailbox\"");
    }
}
