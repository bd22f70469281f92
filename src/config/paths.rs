//! Where settings, the calibration value and speech models live.
//!
//! | What | Linux | macOS | Windows |
//! |------|-------|-------|---------|
//! | `settings.toml`, `calibration.toml` | `~/.config/voice-command/` | `~/Library/Application Support/voice-command/` | `%APPDATA%\voice-command\` |
//! | `models/<name>/` | `~/.local/share/voice-command/` | `~/Library/Application Support/voice-command/` | `%LOCALAPPDATA%\voice-command\` |
//!
//! Directories come from the `dirs` crate; when the platform has no answer
//! the current directory is used instead.

use std::path::{Path, PathBuf};

const APP_NAME: &str = "voice-command";
const SETTINGS_FILE: &str = "settings.toml";
const CALIBRATION_FILE: &str = "calibration.toml";
const MODELS_DIR: &str = "models";

/// Resolved on-disk locations.
#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Persisted ambient RMS.
    pub calibration_file: PathBuf,
    /// Parent of the unpacked recognizer model directories.
    pub models_dir: PathBuf,
}

impl AppPaths {
    /// Model directory name used when `[model] path` is not set.
    pub const DEFAULT_MODEL: &'static str = "model-en-us";

    /// Platform locations.
    pub fn new() -> Self {
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from(".")).join(APP_NAME);
        Self::rooted(base(dirs::config_dir()), base(dirs::data_local_dir()))
    }

    /// Layout under explicit config and data directories.
    pub fn rooted(config_dir: impl AsRef<Path>, data_dir: impl AsRef<Path>) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            calibration_file: config_dir.join(CALIBRATION_FILE),
            models_dir: data_dir.as_ref().join(MODELS_DIR),
            config_dir,
        }
    }

    pub fn default_model_dir(&self) -> PathBuf {
        self.models_dir.join(Self::DEFAULT_MODEL)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
