//! Where chordmap keeps its files
//!
//! Everything lives under one directory:
//! - Unix/macOS: `$XDG_CONFIG_HOME/chordmap/`, else `~/.config/chordmap/`
//! - Windows: `%APPDATA%\chordmap\`

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

const APP_DIR: &str = "chordmap";

/// Log file prefix; daily rotation appends `.YYYY-MM-DD`
pub const LOG_FILE_NAME: &str = "chordmap.log";

/// Paths derived from a single config root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    root: PathBuf,
}

impl ConfigPaths {
    /// Paths rooted at `root`, which need not exist yet
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The per-user config root for this platform
    pub fn discover() -> Option<Self> {
        #[cfg(target_os = "windows")]
        let base = env::var_os("APPDATA").map(PathBuf::from);

        #[cfg(not(target_os = "windows"))]
        let base = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")));

        base.map(|base| Self::at(base.join(APP_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Dispatcher settings, see [`crate::config::KeybindingConfig`]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// The user's own keymap
    pub fn keymap_file(&self) -> PathBuf {
        self.root.join("keymap.yaml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Create the logs directory (and the root) if needed
    pub fn ensure_logs_dir(&self) -> io::Result<PathBuf> {
        let logs = self.logs_dir();
        fs::create_dir_all(&logs)?;
        Ok(logs)
    }

    /// `explicit` when given, otherwise the user keymap if one has been written
    pub fn keymap_to_load(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(self.keymap_file()).filter(|path| path.is_file()),
        }
    }
}
