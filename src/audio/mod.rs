//! Audio capture: device contract, cpal backend, format conversion and the
//! loudness metric used by calibration.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → PcmConverter (downmix, 16 kHz, i16)
//!           → CpalCaptureDevice → AudioSampler (fixed-size i16 blocks)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voice_command::audio::{rms_metric, AudioSampler, CpalCaptureDevice};
//!
//! let mut sampler = AudioSampler::open(Box::new(CpalCaptureDevice::new()), 2_048).unwrap();
//! let block = sampler.read_block().unwrap();
//! println!("loudness {:.1}", rms_metric(block));
//! sampler.close(); // also happens on drop
//! ```

pub mod capture;
pub mod convert;
pub mod level;
pub mod sampler;

pub use capture::{CpalCaptureDevice, CpalCaptureSource};
pub use convert::{downmix, f32_to_i16, PcmConverter, TARGET_RATE};
pub use level::{amplitude_for_metric, rms_metric};
pub use sampler::{AudioError, AudioSampler, CaptureDevice, CaptureSource};
