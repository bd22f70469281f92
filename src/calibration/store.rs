//! Persistence of the calibration result.
//!
//! Only one scalar is stored: the average RMS, or `-1` when there is no
//! usable calibration.  [`FileCalibrationStore`] keeps it in a tiny TOML file
//! next to `settings.toml`:
//!
//! ```toml
//! rms = 42.17
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::CalibrationProfile;
use crate::config::AppPaths;

/// Load/save seam for the calibration profile.
pub trait CalibrationStore: Send + Sync {
    /// Returns an invalid profile when nothing has been stored yet.
    fn load(&self) -> Result<CalibrationProfile>;

    fn save(&self, profile: &CalibrationProfile) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCalibration {
    rms: f64,
}

/// TOML-file backed [`CalibrationStore`].
#[derive(Debug, Clone)]
pub struct FileCalibrationStore {
    path: PathBuf,
}

impl FileCalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location (`calibration.toml`).
    pub fn default_location() -> Self {
        Self::new(AppPaths::new().calibration_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationStore for FileCalibrationStore {
    fn load(&self) -> Result<CalibrationProfile> {
        if !self.path.exists() {
            return Ok(CalibrationProfile::invalid());
        }
        let content = std::fs::read_to_string(&self.path)?;
        let stored: StoredCalibration = toml::from_str(&content)?;
        let profile = CalibrationProfile::from_rms(stored.rms);
        log::info!("calibration: loaded RMS {}", profile.rms);
        Ok(profile)
    }

    fn save(&self, profile: &CalibrationProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rms = if profile.valid {
            profile.rms
        } else {
            CalibrationProfile::INVALID_RMS
        };
        let content = toml::to_string(&StoredCalibration { rms })?;
        std::fs::write(&self.path, content)?;
        log::info!("calibration: saved RMS {rms}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
