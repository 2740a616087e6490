//! Studio configuration
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/stemix/config.yaml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stemix_core::audio::DEFAULT_BUFFER_SIZE;
use stemix_core::config::default_cache_dir;
use stemix_core::engine::DEFAULT_VOLUME;

use crate::separation::SeparationConfig;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StudioConfig {
    /// Overrides the OS-specific cache directory
    pub cache_dir: Option<PathBuf>,
    pub audio: OutputConfig,
    pub transport: TransportConfig,
    pub separation: SeparationConfig,
    pub tracks: TrackDefaults,
}

impl StudioConfig {
    /// Cache directory in effect (configured or OS default)
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Audio output section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Open device streams; when false playback runs headless
    pub enabled: bool,
    /// Requested device buffer size in frames (None = device default)
    pub buffer_size: Option<u32>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: Some(DEFAULT_BUFFER_SIZE),
        }
    }
}

/// Transport section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How often playback position is polled for display and end detection
    pub poll_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

impl TransportConfig {
    /// Poll interval, never below 10 ms
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

/// Track defaults section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackDefaults {
    /// Volume on creation and reset, in [0, 1]
    pub default_volume: f32,
}

impl Default for TrackDefaults {
    fn default() -> Self {
        Self {
            default_volume: DEFAULT_VOLUME,
        }
    }
}

impl TrackDefaults {
    pub fn clamped_volume(&self) -> f32 {
        if self.default_volume.is_nan() {
            DEFAULT_VOLUME
        } else {
            self.default_volume.clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::separation::SeparationMethod;
    use stemix_core::config::{load_config, save_config};

    #[test]
    fn test_default_config() {
        let config = StudioConfig::default();
        assert!(config.audio.enabled);
        assert_eq!(config.transport.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.tracks.default_volume, 0.5);
        assert_eq!(config.separation.default_method, SeparationMethod::Demucs);
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "transport:\n  poll_interval_ms: 1\ntracks:\n  default_volume: 3.0\n";
        let config: StudioConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.transport.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.tracks.clamped_volume(), 1.0);
        assert!(config.audio.enabled);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let mut config = StudioConfig::default();
        config.cache_dir = Some(PathBuf::from("/tmp/stemix-cache"));
        config.audio.enabled = false;
        config.separation.default_method = SeparationMethod::Spleeter;

        save_config(&config, &path).unwrap();
        let loaded: StudioConfig = load_config(&path);

        assert_eq!(loaded, config);
        assert_eq!(loaded.resolved_cache_dir(), PathBuf::from("/tmp/stemix-cache"));
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "audio: [not, a, map").unwrap();

        let loaded: StudioConfig = load_config(&path);
        assert_eq!(loaded, StudioConfig::default());
    }
}
