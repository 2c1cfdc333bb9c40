//! Keybinding service configuration
//!
//! Stores dispatcher settings in `~/.config/chordmap/config.yaml`

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config_paths::ConfigPaths;
use crate::keymap::OperatingSystem;

/// Dispatcher settings; every field has a default so partial files are fine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeybindingConfig {
    /// Chord mode is left when no further key arrives within this time
    #[serde(default = "default_chord_timeout_ms")]
    pub chord_timeout_ms: u64,

    /// How often the host is expected to call `poll`
    #[serde(default = "default_chord_poll_interval_ms")]
    pub chord_poll_interval_ms: u64,

    /// Platform whose modifier conventions apply (defaults to the build target)
    #[serde(default)]
    pub platform: Option<OperatingSystem>,

    /// Log every dispatch decision at info level
    #[serde(default)]
    pub trace_resolution: bool,
}

fn default_chord_timeout_ms() -> u64 {
    5000
}

fn default_chord_poll_interval_ms() -> u64 {
    500
}

impl Default for KeybindingConfig {
    fn default() -> Self {
        Self {
            chord_timeout_ms: default_chord_timeout_ms(),
            chord_poll_interval_ms: default_chord_poll_interval_ms(),
            platform: None,
            trace_resolution: false,
        }
    }
}

impl KeybindingConfig {
    pub fn chord_timeout(&self) -> Duration {
        Duration::from_millis(self.chord_timeout_ms)
    }

    pub fn chord_poll_interval(&self) -> Duration {
        Duration::from_millis(self.chord_poll_interval_ms)
    }

    /// Configured platform, or the one this binary was built for
    pub fn os(&self) -> OperatingSystem {
        self.platform.unwrap_or_else(OperatingSystem::current)
    }

    /// Load config from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = ConfigPaths::discover().map(|paths| paths.config_file()) else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load config from `path`; missing or malformed files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to `path`, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_yaml::to_string(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write config to {}: {}", path.display(), e))?;

        tracing::info!("Saved config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KeybindingConfig::default();
        assert_eq!(config.chord_timeout(), Duration::from_millis(5000));
        assert_eq!(config.chord_poll_interval(), Duration::from_millis(500));
        assert!(!config.trace_resolution);
        assert_eq!(config.os(), OperatingSystem::current());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: KeybindingConfig =
            serde_yaml::from_str("chord_timeout_ms: 1000\nplatform: mac\n").unwrap();
        assert_eq!(config.chord_timeout_ms, 1000);
        assert_eq!(config.chord_poll_interval_ms, 500);
        assert_eq!(config.os(), OperatingSystem::Macintosh);
    }
}
