//! The calibration sampling loop.
//!
//! [`Calibrator::calibrate`] is blocking and is meant to run on a worker
//! thread (`tokio::task::spawn_blocking` in the session).  It stops when the
//! first of these happens:
//!
//! 1. `duration` worth of audio has been captured,
//! 2. `duration` of wall-clock time has elapsed,
//! 3. the [`CancelToken`] is set (checked once per block),
//! 4. the device reports an error.
//!
//! The capture device is released exactly once on every one of those paths.

use std::time::{Duration, Instant};

use crate::audio::{rms_metric, AudioError, AudioSampler, CaptureDevice};
use crate::config::AppConfig;

use super::{CalibrationProfile, CancelToken};

// ---------------------------------------------------------------------------
// CalibrationReport
// ---------------------------------------------------------------------------

/// How a calibration run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    /// At least one block above the noise floor was recorded.
    Completed,
    /// The run finished but every block was at or below the noise floor.
    NoSignificantAudio,
    /// The cancel token was set before the run finished.
    Cancelled,
    /// The capture device failed to open or to deliver audio.
    DeviceFailed(AudioError),
}

/// Everything the session needs to know about a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    pub profile: CalibrationProfile,
    pub outcome: CalibrationOutcome,
    /// Blocks read from the device.
    pub blocks_read: usize,
    /// Blocks that made it past the noise floor.
    pub blocks_used: usize,
}

impl CalibrationReport {
    pub(crate) fn failed(error: AudioError, blocks_read: usize) -> Self {
        Self {
            profile: CalibrationProfile::invalid(),
            outcome: CalibrationOutcome::DeviceFailed(error),
            blocks_read,
            blocks_used: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Calibrator
// ---------------------------------------------------------------------------

/// Measures ambient loudness.
#[derive(Debug, Clone)]
pub struct Calibrator {
    duration: Duration,
    noise_floor: f64,
    sample_rate: u32,
    block_size: usize,
}

impl Calibrator {
    pub fn new(duration: Duration, noise_floor: f64, sample_rate: u32, block_size: usize) -> Self {
        Self {
            duration,
            noise_floor,
            sample_rate,
            block_size,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.calibration.duration(),
            config.calibration.noise_floor,
            config.audio.sample_rate,
            config.audio.block_size,
        )
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of samples that make up the full sampling window.
    fn target_samples(&self) -> u64 {
        (self.duration.as_secs_f64() * self.sample_rate as f64).ceil() as u64
    }

    /// Run one calibration against `device`.
    ///
    /// Never returns an error: a device failure is reported through
    /// [`CalibrationOutcome::DeviceFailed`] together with an invalid profile.
    pub fn calibrate(&self, device: Box<dyn CaptureDevice>, cancel: &CancelToken) -> CalibrationReport {
        let mut sampler = match AudioSampler::open(device, self.block_size) {
            Ok(sampler) => sampler,
            Err(e) => {
                log::error!("calibration: could not open capture device: {e}");
                return CalibrationReport::failed(e, 0);
            }
        };

        let started = Instant::now();
        let target = self.target_samples();
        let mut captured: u64 = 0;
        let mut blocks_read = 0usize;
        let mut levels: Vec<f64> = Vec::new();
        let mut cancelled = false;

        log::debug!(
            "calibration: sampling {} ms ({target} samples, floor {})",
            self.duration.as_millis(),
            self.noise_floor
        );

        while captured < target && started.elapsed() < self.duration {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let (len, level) = match sampler.read_block().map(|b| (b.len(), rms_metric(b))) {
                Ok(read) => read,
                Err(e) => {
                    log::error!("calibration: read failed after {blocks_read} blocks: {e}");
                    sampler.close();
                    return CalibrationReport::failed(e, blocks_read);
                }
            };

            blocks_read += 1;
            captured += len as u64;

            if level > self.noise_floor {
                levels.push(level);
            } else {
                log::trace!("calibration: block {blocks_read} at {level:.2} is below the floor");
            }
        }

        sampler.close();

        let blocks_used = levels.len();
        if cancelled {
            log::info!("calibration: cancelled after {blocks_read} blocks");
            return CalibrationReport {
                profile: average(&levels),
                outcome: CalibrationOutcome::Cancelled,
                blocks_read,
                blocks_used,
            };
        }

        let profile = average(&levels);
        let outcome = if profile.valid {
            log::info!(
                "calibration: complete, avg RMS {:.2} from {blocks_used} of {blocks_read} blocks",
                profile.rms
            );
            CalibrationOutcome::Completed
        } else {
            log::warn!("calibration: no significant audio detected");
            CalibrationOutcome::NoSignificantAudio
        };

        CalibrationReport {
            profile,
            outcome,
            blocks_read,
            blocks_used,
        }
    }
}

fn average(levels: &[f64]) -> CalibrationProfile {
    if levels.is_empty() {
        return CalibrationProfile::invalid();
    }
    CalibrationProfile::measured(levels.iter().sum::<f64>() / levels.len() as f64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
