//! Microphone capture via `cpal`.
//!
//! [`CpalCaptureDevice`] implements [`CaptureDevice`] on top of the default
//! input device.  The cpal stream is not `Send` on every platform, so it is
//! built and kept alive on a dedicated `audio-capture` thread; the device
//! itself only holds channel ends and the join handle, which makes it safe to
//! move onto the calibration worker.
//!
//! ```text
//! cpal callback ─▶ PcmConverter (downmix, resample, quantise)
//!        └──── Vec<i16> (mpsc) ────▶ read_block() fills fixed-size blocks
//! ```

use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::convert::PcmConverter;
use super::sampler::{AudioError, CaptureDevice, CaptureSource};

/// How long `read_block` waits for the next callback before giving up.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// CpalCaptureDevice
// ---------------------------------------------------------------------------

/// Default-input-device capture producing 16 kHz mono PCM16.
pub struct CpalCaptureDevice {
    samples_rx: Option<mpsc::Receiver<Vec<i16>>>,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    pending: VecDeque<i16>,
}

impl CpalCaptureDevice {
    pub fn new() -> Self {
        Self {
            samples_rx: None,
            stop_tx: None,
            thread: None,
            pending: VecDeque::new(),
        }
    }
}

impl Default for CpalCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn open(&mut self) -> Result<(), AudioError> {
        let (samples_tx, samples_rx) = mpsc::channel::<Vec<i16>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), AudioError>>(1);

        let thread = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || run_stream(samples_tx, stop_rx, ready_tx))
            .map_err(|e| AudioError::Open(e.to_string()))?;

        self.thread = Some(thread);
        self.stop_tx = Some(stop_tx);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.samples_rx = Some(samples_rx);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AudioError::Open("capture thread exited during init".into())),
        }
    }

    fn read_block(&mut self, block: &mut [i16]) -> Result<(), AudioError> {
        let rx = self
            .samples_rx
            .as_ref()
            .ok_or_else(|| AudioError::Disconnected("device not open".into()))?;

        while self.pending.len() < block.len() {
            match rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(AudioError::Disconnected("no audio within timeout".into()))
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(AudioError::Disconnected("capture thread stopped".into()))
                }
            }
        }

        let n = block.len();
        for (slot, sample) in block.iter_mut().zip(self.pending.drain(..n)) {
            *slot = sample;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        self.samples_rx = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("capture: audio-capture thread panicked");
            }
        }
        self.pending.clear();
    }
}

/// Body of the `audio-capture` thread: build the stream, report readiness,
/// then park until asked to stop.  Dropping the stream stops the hardware.
fn run_stream(
    samples_tx: mpsc::Sender<Vec<i16>>,
    stop_rx: mpsc::Receiver<()>,
    ready_tx: mpsc::SyncSender<Result<(), AudioError>>,
) {
    let stream = match build_stream(samples_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::NotRecording(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // Either an explicit stop or the device being dropped ends the stream.
    let _ = stop_rx.recv();
    drop(stream);
    log::debug!("capture: stream stopped");
}

fn build_stream(samples_tx: mpsc::Sender<Vec<i16>>) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(AudioError::NoDevice)?;

    let supported = device
        .default_input_config()
        .map_err(|e| AudioError::Open(e.to_string()))?;
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    log::info!("capture: opening input at {sample_rate} Hz, {channels} ch");
    let mut converter = PcmConverter::new(channels, sample_rate);

    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Ignore send errors; the reader may already be gone.
                let _ = samples_tx.send(converter.process(data));
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )
        .map_err(|e| AudioError::Open(e.to_string()))
}

// ---------------------------------------------------------------------------
// CpalCaptureSource
// ---------------------------------------------------------------------------

/// [`CaptureSource`] handing out [`CpalCaptureDevice`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalCaptureSource;

impl CaptureSource for CpalCaptureSource {
    fn device(&self) -> Box<dyn CaptureDevice> {
        Box::new(CpalCaptureDevice::new())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
