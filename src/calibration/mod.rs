//! Ambient-noise calibration.
//!
//! [`Calibrator`] samples the room for a bounded time and reduces the
//! non-silent blocks to a single average loudness, the
//! [`CalibrationProfile`].  The profile is persisted through a
//! [`CalibrationStore`] so it survives restarts.
//!
//! ```text
//! CaptureDevice ─▶ AudioSampler ─▶ rms_metric per block
//!                                   ├─ ≤ noise floor → dropped
//!                                   └─ > noise floor → averaged ─▶ CalibrationProfile
//! ```

pub mod calibrator;
pub mod store;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use calibrator::{CalibrationOutcome, CalibrationReport, Calibrator};
pub use store::{CalibrationStore, FileCalibrationStore};

// ---------------------------------------------------------------------------
// CalibrationProfile
// ---------------------------------------------------------------------------

/// Result of a calibration run.
///
/// `valid == false` means no usable calibration exists: either none was ever
/// run, the last run heard nothing above the noise floor, or it failed.  An
/// invalid profile always carries `rms == -1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub rms: f64,
    pub valid: bool,
}

impl CalibrationProfile {
    /// Sentinel stored when there is no usable measurement.
    pub const INVALID_RMS: f64 = -1.0;

    pub fn invalid() -> Self {
        Self {
            rms: Self::INVALID_RMS,
            valid: false,
        }
    }

    pub fn measured(rms: f64) -> Self {
        Self { rms, valid: true }
    }

    /// Rebuild a profile from the persisted scalar.  Anything that is not a
    /// positive finite number is treated as "no calibration".
    pub fn from_rms(rms: f64) -> Self {
        if rms.is_finite() && rms > 0.0 {
            Self::measured(rms)
        } else {
            Self::invalid()
        }
    }
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::invalid()
    }
}

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared between the session and a
/// calibration worker.  The worker polls it once per block read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
