//! Collaborator doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use crate::audio::{amplitude_for_metric, AudioError, CaptureDevice, CaptureSource};
use crate::calibration::{CalibrationProfile, CalibrationStore};
use crate::command::MediaKey;
use crate::output::{MediaKeySink, OutputError, SpeechSink};
use crate::recognizer::{
    RecognitionEvent, RecognitionListener, Recognizer, RecognizerError, RecognizerFactory,
    SpeechModel,
};

/// A populated model directory and the model loaded from it.
pub(crate) fn model_fixture() -> (TempDir, SpeechModel) {
    let dir = tempfile::tempdir().expect("temp dir");
    let model_dir = dir.path().join("model-en-us");
    std::fs::create_dir_all(&model_dir).expect("model dir");
    std::fs::write(model_dir.join("README"), "test model").expect("model file");
    let model = SpeechModel::load(&model_dir).expect("model loads");
    (dir, model)
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Counters observed after the device has been moved into the code under
/// test.
#[derive(Debug, Clone, Default)]
pub(crate) struct DeviceProbe {
    opens: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl DeviceProbe {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Capture device that plays back one constant-amplitude block per scripted
/// entry, then silence (or a read error, see [`then_fail`](Self::then_fail)).
pub(crate) struct ScriptedDevice {
    script: VecDeque<i16>,
    fail_open: bool,
    fail_code: Option<i32>,
    read_delay: Option<Duration>,
    on_read: Option<Box<dyn FnMut(usize) + Send>>,
    probe: DeviceProbe,
}

impl ScriptedDevice {
    fn scripted(amplitudes: impl IntoIterator<Item = i16>) -> Self {
        Self {
            script: amplitudes.into_iter().collect(),
            fail_open: false,
            fail_code: None,
            read_delay: None,
            on_read: None,
            probe: DeviceProbe::default(),
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::scripted([])
        }
    }

    pub fn constant(amplitude: i16, blocks: usize) -> Self {
        Self::scripted(std::iter::repeat(amplitude).take(blocks))
    }

    pub fn from_amplitudes(amplitudes: &[i16]) -> Self {
        Self::scripted(amplitudes.iter().copied())
    }

    /// One block per metric, each at the amplitude producing that metric.
    pub fn from_metrics(metrics: &[f64]) -> Self {
        Self::scripted(metrics.iter().map(|&m| amplitude_for_metric(m)))
    }

    /// Silence forever, each read taking `delay`.
    pub fn endless_silence(delay: Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..Self::scripted([])
        }
    }

    /// Reads after the script is exhausted fail with `code`.
    pub fn then_fail(mut self, code: i32) -> Self {
        self.fail_code = Some(code);
        self
    }

    /// Called with the running read count after every successful read.
    pub fn on_read(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_read = Some(Box::new(hook));
        self
    }

    pub fn probe(&self) -> DeviceProbe {
        self.probe.clone()
    }
}

impl CaptureDevice for ScriptedDevice {
    fn open(&mut self) -> Result<(), AudioError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(AudioError::Open("scripted open failure".into()));
        }
        Ok(())
    }

    fn read_block(&mut self, block: &mut [i16]) -> Result<(), AudioError> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }

        let amplitude = match self.script.pop_front() {
            Some(amplitude) => amplitude,
            None => match self.fail_code {
                Some(code) => return Err(AudioError::Read(code)),
                None => 0,
            },
        };
        block.fill(amplitude);

        let n = self.probe.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = self.on_read.as_mut() {
            hook(n);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out queued [`ScriptedDevice`]s; a device that fails to open once
/// the queue is empty.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    devices: Mutex<VecDeque<ScriptedDevice>>,
}

impl ScriptedSource {
    pub fn push(&self, device: ScriptedDevice) {
        self.devices.lock().unwrap().push_back(device);
    }
}

impl CaptureSource for ScriptedSource {
    fn device(&self) -> Box<dyn CaptureDevice> {
        let device = self
            .devices
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ScriptedDevice::failing_open);
        Box::new(device)
    }
}

// ---------------------------------------------------------------------------
// Recognizer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecognizerCounters {
    creates: AtomicUsize,
    stops: AtomicUsize,
    listener: Mutex<Option<Arc<dyn RecognitionListener>>>,
}

/// Factory whose recognizers count their lifecycle and keep the listener
/// so tests can play the recognizer thread.
#[derive(Default)]
pub(crate) struct CountingRecognizers {
    counters: Arc<RecognizerCounters>,
    fail_create: bool,
    fail_start: bool,
}

impl CountingRecognizers {
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn creates(&self) -> usize {
        self.counters.creates.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    /// Deliver `event` the way a running recognizer would.
    pub fn emit(&self, event: RecognitionEvent) {
        let listener = self.counters.listener.lock().unwrap().clone();
        listener.expect("no recognizer started").on_event(event);
    }
}

impl RecognizerFactory for CountingRecognizers {
    fn create(
        &self,
        _model: &SpeechModel,
        sample_rate: u32,
    ) -> Result<Box<dyn Recognizer>, RecognizerError> {
        assert_eq!(sample_rate, 16_000);
        if self.fail_create {
            return Err(RecognizerError::Create("scripted create failure".into()));
        }
        self.counters.creates.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingRecognizer {
            counters: Arc::clone(&self.counters),
            fail_start: self.fail_start,
        }))
    }
}

struct CountingRecognizer {
    counters: Arc<RecognizerCounters>,
    fail_start: bool,
}

impl Recognizer for CountingRecognizer {
    fn start(&mut self, listener: Arc<dyn RecognitionListener>) -> Result<(), RecognizerError> {
        if self.fail_start {
            return Err(RecognizerError::Start("scripted start failure".into()));
        }
        *self.counters.listener.lock().unwrap() = Some(listener);
        Ok(())
    }

    fn stop(&mut self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Outputs and store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    stops: AtomicUsize,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SpeechSink for RecordingSpeech {
    fn speak(&self, text: &str) -> Result<(), OutputError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct RecordingMediaKeys {
    pressed: Mutex<Vec<MediaKey>>,
    delay: Option<Duration>,
}

impl RecordingMediaKeys {
    /// Every dispatch blocks for `delay` before recording the key.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn pressed(&self) -> Vec<MediaKey> {
        self.pressed.lock().unwrap().clone()
    }
}

impl MediaKeySink for RecordingMediaKeys {
    fn dispatch(&self, key: MediaKey) -> Result<(), OutputError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.pressed.lock().unwrap().push(key);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MemoryCalibrationStore {
    initial: CalibrationProfile,
    saved: Mutex<Vec<CalibrationProfile>>,
}

impl MemoryCalibrationStore {
    pub fn with(initial: CalibrationProfile) -> Self {
        Self {
            initial,
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn last_saved(&self) -> Option<CalibrationProfile> {
        self.saved.lock().unwrap().last().copied()
    }

    pub fn saves(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

impl CalibrationStore for MemoryCalibrationStore {
    fn load(&self) -> Result<CalibrationProfile> {
        Ok(self.last_saved().unwrap_or(self.initial))
    }

    fn save(&self, profile: &CalibrationProfile) -> Result<()> {
        self.saved.lock().unwrap().push(*profile);
        Ok(())
    }
}
