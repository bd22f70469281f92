//! Capture-device contract and the block sampler built on top of it.
//!
//! [`CaptureDevice`] is the seam to the OS audio stack: open it, pull
//! fixed-size blocks of 16-bit mono PCM at 16 kHz, close it.  The production
//! implementation is [`crate::audio::CpalCaptureDevice`]; tests use a
//! scripted device.
//!
//! [`AudioSampler`] owns an opened device and guarantees it is closed exactly
//! once, whether the caller closes it explicitly, an error unwinds the
//! caller, or the sampler is simply dropped.

use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Capture-device failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    /// The device could not be initialised.
    #[error("audio device init failed: {0}")]
    Open(String),

    /// The device initialised but refused to enter the recording state.
    #[error("audio device failed to start recording: {0}")]
    NotRecording(String),

    /// A read returned a negative status.
    #[error("audio read error: {0}")]
    Read(i32),

    /// The capture stream went away mid-read.
    #[error("audio stream disconnected: {0}")]
    Disconnected(String),
}

// ---------------------------------------------------------------------------
// CaptureDevice
// ---------------------------------------------------------------------------

/// A source of 16 kHz mono signed 16-bit PCM.
///
/// # Contract
///
/// - `open` initialises the device and puts it into the recording state.
/// - `read_block` blocks until `block` has been filled completely.
/// - `close` stops and releases the device.  It must tolerate being called on
///   a device whose `open` failed or was never called.
pub trait CaptureDevice: Send {
    fn open(&mut self) -> Result<(), AudioError>;

    fn read_block(&mut self, block: &mut [i16]) -> Result<(), AudioError>;

    fn close(&mut self);
}

/// Hands out a fresh, unopened [`CaptureDevice`] for every calibration run.
pub trait CaptureSource: Send + Sync {
    fn device(&self) -> Box<dyn CaptureDevice>;
}

// ---------------------------------------------------------------------------
// AudioSampler
// ---------------------------------------------------------------------------

/// An opened capture device that is released exactly once.
pub struct AudioSampler {
    device: Box<dyn CaptureDevice>,
    block: Vec<i16>,
    released: bool,
}

impl AudioSampler {
    /// Open `device` and prepare a reusable block of `block_size` samples.
    ///
    /// On failure the device is closed before the error is returned, so the
    /// caller never has to clean up after a failed open.
    pub fn open(mut device: Box<dyn CaptureDevice>, block_size: usize) -> Result<Self, AudioError> {
        if let Err(e) = device.open() {
            device.close();
            return Err(e);
        }
        log::debug!("sampler: device opened, block size {block_size}");
        Ok(Self {
            device,
            block: vec![0; block_size.max(1)],
            released: false,
        })
    }

    /// Read the next block.  The returned slice is valid until the next call.
    pub fn read_block(&mut self) -> Result<&[i16], AudioError> {
        if self.released {
            return Err(AudioError::Disconnected("sampler already closed".into()));
        }
        self.device.read_block(&mut self.block)?;
        Ok(&self.block)
    }

    /// Number of samples in every block.
    pub fn block_size(&self) -> usize {
        self.block.len()
    }

    /// Stop and release the device.  Further calls are no-ops.
    pub fn close(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.device.close();
        log::debug!("sampler: device released");
    }
}

impl Drop for AudioSampler {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDevice;

    #[test]
    fn failed_open_releases_device_once() {
        let device = ScriptedDevice::failing_open();
        let probe = device.probe();

        let err = AudioSampler::open(Box::new(device), 16).err();
        assert!(matches!(err, Some(AudioError::Open(_))));
        assert_eq!(probe.opens(), 1);
        assert_eq!(probe.reads(), 0);
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn explicit_close_then_drop_releases_once() {
        let device = ScriptedDevice::constant(100, 4);
        let probe = device.probe();

        let mut sampler = AudioSampler::open(Box::new(device), 16).expect("open");
        sampler.close();
        sampler.close();
        drop(sampler);

        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn drop_releases_device() {
        let device = ScriptedDevice::constant(100, 4);
        let probe = device.probe();
        {
            let _sampler = AudioSampler::open(Box::new(device), 16).expect("open");
        }
        assert_eq!(probe.closes(), 1);
    }

    #[test]
    fn read_after_close_is_an_error() {
        let device = ScriptedDevice::constant(100, 4);
        let mut sampler = AudioSampler::open(Box::new(device), 8).expect("open");
        assert_eq!(sampler.read_block().expect("read").len(), 8);

        sampler.close();
        assert!(matches!(
            sampler.read_block(),
            Err(AudioError::Disconnected(_))
        ));
    }

    #[test]
    fn read_error_is_surfaced() {
        let device = ScriptedDevice::constant(100, 1).then_fail(-3);
        let probe = device.probe();
        let mut sampler = AudioSampler::open(Box::new(device), 8).expect("open");

        assert!(sampler.read_block().is_ok());
        assert_eq!(sampler.read_block().err(), Some(AudioError::Read(-3)));
        assert_eq!(probe.opens(), 1);
        assert_eq!(probe.reads(), 1);
    }
}
