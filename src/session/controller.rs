//! The session actor.
//!
//! [`SessionController`] owns every piece of mutable session state: the
//! state machine, the pause flag, the running recognizer, the calibration
//! worker's cancel token and the loaded model.  It runs as a single tokio
//! task and processes one [`SessionCommand`] at a time, so no two operations
//! or recognizer events ever interleave.
//!
//! Recognizer callbacks and the calibration worker's report come in through
//! the same channel as caller requests, via a weak sender: once every
//! [`SessionHandle`] is dropped the channel closes and the loop shuts down
//! even if a recognizer thread is still holding its listener.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::audio::{AudioError, CaptureSource};
use crate::calibration::{
    CalibrationOutcome, CalibrationProfile, CalibrationReport, CalibrationStore, Calibrator,
    CancelToken,
};
use crate::command::{CommandMatcher, MediaKey};
use crate::config::AppConfig;
use crate::output::{MediaKeySink, SpeechSink};
use crate::recognizer::{
    Hypothesis, HypothesisKind, ModelError, RecognitionEvent, RecognitionListener, Recognizer,
    RecognizerFactory, SpeechModel,
};

use super::handle::{ListeningChange, SessionHandle};
use super::state::{SessionState, SessionStatus, SharedSession, TranscriptEntry};
use super::{
    calibration_complete, listening_status, SessionError, CALIBRATE_TIP, CALIBRATING, LISTENING,
    LISTENING_PREFIX, MODEL_MISSING, NO_SIGNIFICANT_AUDIO, PAUSED, PERMISSION_DENIED,
};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Everything the controller task reacts to.
pub(crate) enum SessionCommand {
    StartCalibration(oneshot::Sender<Result<(), SessionError>>),
    ToggleListening(oneshot::Sender<Result<ListeningChange, SessionError>>),
    SetPaused {
        paused: bool,
        reply: oneshot::Sender<bool>,
    },
    ModelLoaded {
        model: SpeechModel,
        reply: oneshot::Sender<SessionState>,
    },
    ModelLoadFailed {
        cause: String,
        reply: oneshot::Sender<SessionState>,
    },
    PermissionDenied(oneshot::Sender<SessionState>),
    Recover(oneshot::Sender<Result<SessionState, SessionError>>),
    Suspend(oneshot::Sender<SessionState>),
    Snapshot(oneshot::Sender<SessionStatus>),
    Shutdown(oneshot::Sender<()>),
    Recognition(RecognitionEvent),
    CalibrationFinished(CalibrationReport),
}

/// Listener handed to recognizers.  Forwards every callback into the
/// controller's queue.
struct ChannelListener(mpsc::WeakUnboundedSender<SessionCommand>);

impl RecognitionListener for ChannelListener {
    fn on_event(&self, event: RecognitionEvent) {
        match self.0.upgrade() {
            Some(tx) => {
                if tx.send(SessionCommand::Recognition(event)).is_err() {
                    log::debug!("session: controller gone, dropping recognizer event");
                }
            }
            None => log::debug!("session: controller gone, dropping recognizer event"),
        }
    }
}

// ---------------------------------------------------------------------------
// ActiveRecognizer
// ---------------------------------------------------------------------------

/// A started recognizer that is stopped exactly once: explicitly, or on drop.
struct ActiveRecognizer {
    inner: Box<dyn Recognizer>,
    released: bool,
}

impl ActiveRecognizer {
    fn new(inner: Box<dyn Recognizer>) -> Self {
        Self {
            inner,
            released: false,
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.inner.stop();
        log::debug!("session: recognizer released");
    }
}

impl Drop for ActiveRecognizer {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// External collaborators injected into the controller.
#[derive(Clone)]
pub struct Collaborators {
    /// Fresh capture devices for calibration runs.
    pub capture: Arc<dyn CaptureSource>,
    pub recognizers: Arc<dyn RecognizerFactory>,
    pub store: Arc<dyn CalibrationStore>,
    pub speech: Arc<dyn SpeechSink>,
    pub media_keys: Arc<dyn MediaKeySink>,
}

pub struct SessionController {
    io: Collaborators,
    matcher: CommandMatcher,
    calibrator: Calibrator,
    sample_rate: u32,
    status: SharedSession,
    state_tx: watch::Sender<SessionState>,
    /// Weak so that recognizers and calibration workers never keep the
    /// controller alive.
    queue: mpsc::WeakUnboundedSender<SessionCommand>,
    model: Option<SpeechModel>,
    recognizer: Option<ActiveRecognizer>,
    /// Set while a calibration worker is alive, cancelled or not.
    calibration: Option<CancelToken>,
    tip_shown: bool,
}

impl SessionController {
    /// Load the stored calibration, spawn the controller task and return a
    /// handle to it.  Must be called from within a tokio runtime.
    pub fn spawn(config: &AppConfig, io: Collaborators) -> SessionHandle {
        let calibration = match io.store.load() {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("session: could not load calibration, starting without: {e:#}");
                CalibrationProfile::invalid()
            }
        };

        let status = SharedSession::new(SessionStatus::new(calibration));
        let (state_tx, state_rx) = watch::channel(SessionState::Start);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let controller = Self {
            io,
            matcher: CommandMatcher::from_config(&config.commands),
            calibrator: Calibrator::from_config(config),
            sample_rate: config.audio.sample_rate,
            status: status.clone(),
            state_tx,
            queue: commands_tx.downgrade(),
            model: None,
            recognizer: None,
            calibration: None,
            tip_shown: false,
        };

        tokio::spawn(controller.run(commands_rx));
        SessionHandle::new(commands_tx, status, state_rx)
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Process commands until every handle is dropped or `Shutdown` arrives.
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        log::info!("session: controller started");

        while let Some(command) = commands.recv().await {
            if let SessionCommand::Shutdown(reply) = command {
                self.shutdown();
                let _ = reply.send(());
                log::info!("session: shutdown requested, controller stopping");
                return;
            }
            self.handle(command);
        }

        self.shutdown();
        log::info!("session: all handles dropped, controller stopping");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::StartCalibration(reply) => {
                let _ = reply.send(self.start_calibration());
            }
            SessionCommand::ToggleListening(reply) => {
                let _ = reply.send(self.toggle_listening());
            }
            SessionCommand::SetPaused { paused, reply } => {
                let _ = reply.send(self.set_paused(paused));
            }
            SessionCommand::ModelLoaded { model, reply } => {
                let _ = reply.send(self.model_loaded(model));
            }
            SessionCommand::ModelLoadFailed { cause, reply } => {
                self.model = None;
                self.fail(format!("Failed to unpack/load the model: {cause}"));
                let _ = reply.send(self.status.state());
            }
            SessionCommand::PermissionDenied(reply) => {
                self.fail(PERMISSION_DENIED);
                let _ = reply.send(self.status.state());
            }
            SessionCommand::Recover(reply) => {
                let _ = reply.send(self.recover());
            }
            SessionCommand::Suspend(reply) => {
                if self.recognizer.is_some() {
                    log::info!("session: suspended while listening, stopping recognizer");
                    self.stop_listening();
                }
                let _ = reply.send(self.status.state());
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.status.snapshot());
            }
            SessionCommand::Shutdown(reply) => {
                self.shutdown();
                let _ = reply.send(());
            }
            SessionCommand::Recognition(event) => self.on_recognition_event(event),
            SessionCommand::CalibrationFinished(report) => self.finish_calibration(report),
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Apply `update` to the published status in one critical section and
    /// announce a state change.  Pause is forced off outside `Listening` and
    /// the error cause is cleared outside `Error`.
    fn publish<R>(&self, update: impl FnOnce(&mut SessionStatus) -> R) -> R {
        let (result, from, to) = {
            let mut status = self.status.lock();
            let from = status.state;
            let result = update(&mut status);
            if status.state != SessionState::Listening {
                status.paused = false;
            }
            if status.state != SessionState::Error {
                status.error_cause = None;
            }
            (result, from, status.state)
        };

        if from != to {
            log::debug!("session: {from} -> {to}");
            self.state_tx.send_replace(to);
        }
        result
    }

    /// Enter `Error` with `cause`, releasing whatever is running.
    fn fail(&mut self, cause: impl Into<String>) {
        self.fail_with(cause, |_| {});
    }

    /// [`fail`](Self::fail), applying `also` in the same critical section.
    fn fail_with(&mut self, cause: impl Into<String>, also: impl FnOnce(&mut SessionStatus)) {
        let cause = cause.into();
        log::error!("session: {cause}");

        self.release_recognizer();
        if let Some(token) = &self.calibration {
            token.cancel();
        }

        self.publish(|s| {
            s.state = SessionState::Error;
            s.error_cause = Some(cause.clone());
            s.status_line.clear();
            s.record(TranscriptEntry::Error(cause));
            also(s);
        });
    }

    fn release_recognizer(&mut self) {
        if let Some(mut recognizer) = self.recognizer.take() {
            recognizer.release();
        }
    }

    fn model_loaded(&mut self, model: SpeechModel) -> SessionState {
        log::info!("session: model {} ready", model.name());
        self.model = Some(model);
        self.publish(|s| {
            if matches!(s.state, SessionState::Start | SessionState::Error) {
                s.state = SessionState::Ready;
                s.status_line.clear();
            }
            s.state
        })
    }

    fn recover(&mut self) -> Result<SessionState, SessionError> {
        let state = self.status.state();
        if state != SessionState::Error {
            return Err(SessionError::NotAllowed {
                op: "recover",
                state,
            });
        }
        if self.model.is_none() {
            return Err(ModelError::NotLoaded.into());
        }
        Ok(self.publish(|s| {
            s.state = SessionState::Ready;
            s.status_line.clear();
            s.state
        }))
    }

    fn shutdown(&mut self) {
        if let Some(token) = &self.calibration {
            token.cancel();
        }
        let was_listening = self.recognizer.is_some();
        self.release_recognizer();
        self.io.speech.stop();
        if was_listening {
            self.publish(|s| s.state = SessionState::Done);
        }
    }

    // -----------------------------------------------------------------------
    // Calibration
    // -----------------------------------------------------------------------

    fn start_calibration(&mut self) -> Result<(), SessionError> {
        if self.recognizer.is_some() {
            return Err(SessionError::ListeningActive);
        }
        let state = self.status.state();
        if !state.is_idle() {
            log::warn!("session: cannot calibrate now ({state})");
            return Err(SessionError::NotAllowed {
                op: "calibrate",
                state,
            });
        }
        if self.calibration.is_some() {
            return Err(SessionError::CalibrationBusy);
        }

        let token = CancelToken::new();
        self.calibration = Some(token.clone());
        self.publish(|s| {
            s.state = SessionState::Calibrating;
            s.status_line = CALIBRATING.to_string();
        });

        let calibrator = self.calibrator.clone();
        let capture = Arc::clone(&self.io.capture);
        let queue = self.queue.clone();

        log::info!(
            "session: calibrating for {} ms",
            calibrator.duration().as_millis()
        );
        let worker =
            tokio::task::spawn_blocking(move || calibrator.calibrate(capture.device(), &token));

        tokio::spawn(async move {
            let report = match worker.await {
                Ok(report) => report,
                Err(e) => CalibrationReport::failed(
                    AudioError::Disconnected(format!("calibration worker: {e}")),
                    0,
                ),
            };
            if let Some(tx) = queue.upgrade() {
                let _ = tx.send(SessionCommand::CalibrationFinished(report));
            }
        });

        Ok(())
    }

    fn finish_calibration(&mut self, report: CalibrationReport) {
        self.calibration = None;

        let state = self.status.state();
        if state != SessionState::Calibrating {
            log::info!(
                "session: calibration ended ({:?}) after leaving Calibrating, now {state}; result discarded",
                report.outcome
            );
            return;
        }

        match report.outcome {
            CalibrationOutcome::Completed => {
                let profile = report.profile;
                self.save_profile(&profile);
                self.publish(|s| {
                    s.state = SessionState::Ready;
                    s.calibration = profile;
                    s.status_line = calibration_complete(profile.rms);
                });
            }
            CalibrationOutcome::NoSignificantAudio => {
                self.save_profile(&CalibrationProfile::invalid());
                self.publish(|s| {
                    s.state = SessionState::Ready;
                    s.calibration = CalibrationProfile::invalid();
                    s.status_line = NO_SIGNIFICANT_AUDIO.to_string();
                });
            }
            CalibrationOutcome::Cancelled => {
                self.publish(|s| {
                    s.state = SessionState::Ready;
                    s.status_line.clear();
                });
            }
            CalibrationOutcome::DeviceFailed(e) => {
                self.save_profile(&CalibrationProfile::invalid());
                self.fail_with(format!("Calibration failed: {e}"), |s| {
                    s.calibration = CalibrationProfile::invalid();
                });
            }
        }
    }

    fn save_profile(&self, profile: &CalibrationProfile) {
        if let Err(e) = self.io.store.save(profile) {
            log::error!("session: failed to save calibration: {e:#}");
        }
    }

    // -----------------------------------------------------------------------
    // Listening
    // -----------------------------------------------------------------------

    fn toggle_listening(&mut self) -> Result<ListeningChange, SessionError> {
        if self.recognizer.is_some() {
            self.stop_listening();
            return Ok(ListeningChange::Stopped);
        }

        let state = self.status.state();
        if !state.is_idle() {
            return Err(SessionError::NotAllowed {
                op: "start listening",
                state,
            });
        }

        let Some(model) = self.model.clone() else {
            self.fail(MODEL_MISSING);
            return Err(ModelError::NotLoaded.into());
        };

        let mut recognizer = match self.io.recognizers.create(&model, self.sample_rate) {
            Ok(inner) => ActiveRecognizer::new(inner),
            Err(e) => {
                self.fail(format!("Microphone init failed: {e}"));
                return Err(e.into());
            }
        };

        let listener: Arc<dyn RecognitionListener> = Arc::new(ChannelListener(self.queue.clone()));
        if let Err(e) = recognizer.inner.start(listener) {
            recognizer.release();
            self.fail(format!("Microphone init failed: {e}"));
            return Err(e.into());
        }
        self.recognizer = Some(recognizer);

        let show_tip = !self.tip_shown && !self.status.lock().calibration.valid;
        if show_tip {
            self.tip_shown = true;
            log::info!("session: {CALIBRATE_TIP}");
        }

        self.publish(|s| {
            s.state = SessionState::Listening;
            s.paused = false;
            s.status_line = if show_tip { CALIBRATE_TIP } else { LISTENING }.to_string();
        });
        log::info!("session: listening with model {}", model.name());
        Ok(ListeningChange::Started)
    }

    fn stop_listening(&mut self) {
        self.release_recognizer();
        self.io.speech.stop();
        self.publish(|s| {
            s.state = SessionState::Done;
            s.paused = false;
        });
        log::info!("session: listening stopped");
    }

    /// Returns the pause flag in effect afterwards.
    fn set_paused(&mut self, paused: bool) -> bool {
        let state = self.status.state();
        if state != SessionState::Listening || self.recognizer.is_none() {
            log::debug!("session: pause request ignored in {state}");
            self.publish(|s| s.paused = false);
            return false;
        }

        if paused {
            self.io.speech.stop();
        }
        self.publish(|s| {
            s.paused = paused;
            s.status_line = if paused { PAUSED } else { LISTENING }.to_string();
        });
        log::info!("session: {}", if paused { "paused" } else { "resumed" });
        paused
    }

    // -----------------------------------------------------------------------
    // Recognizer events
    // -----------------------------------------------------------------------

    fn on_recognition_event(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Partial(hypothesis) => self.on_partial(&hypothesis),
            RecognitionEvent::Final(hypothesis) => self.on_final(&hypothesis),
            RecognitionEvent::Error(cause) => self.fail(format!("Recognizer error: {cause}")),
            RecognitionEvent::Timeout => self.on_timeout(),
        }
    }

    fn on_partial(&mut self, hypothesis: &Hypothesis) {
        let (state, paused) = {
            let status = self.status.lock();
            (status.state, status.paused)
        };
        if state != SessionState::Listening {
            log::debug!("session: partial ignored in {state}");
            return;
        }

        let text = hypothesis.text(HypothesisKind::Partial);
        if text.is_empty() {
            return;
        }
        if paused {
            log::trace!("session: paused, dropping partial {text:?}");
            return;
        }

        let outcome = self.matcher.match_text(&text);
        if !outcome.matched {
            self.publish(|s| s.status_line = listening_status(&text));
            return;
        }

        let response = outcome.response.unwrap_or_default();
        log::info!(
            "session: command {} matched {text:?} -> {response:?}",
            outcome.rule.unwrap_or("?")
        );

        if let Some(key) = outcome.side_effect {
            self.dispatch_media_key(key);
        }
        if let Err(e) = self.io.speech.speak(&response) {
            log::warn!("session: could not speak response: {e}");
        }

        self.publish(|s| {
            s.status_line = response;
            s.record(TranscriptEntry::Command(text));
        });
    }

    /// Key injection blocks on the desktop backend, so it runs on the
    /// blocking pool and the actor moves on to the next command.
    fn dispatch_media_key(&self, key: MediaKey) {
        let keys = Arc::clone(&self.io.media_keys);
        let dispatch = tokio::task::spawn_blocking(move || keys.dispatch(key));
        tokio::spawn(async move {
            match dispatch.await {
                Ok(Ok(())) => log::debug!("session: media key {key} sent"),
                Ok(Err(e)) => log::warn!("session: media key {key} failed: {e}"),
                Err(e) => log::warn!("session: media key task panicked: {e}"),
            }
        });
    }

    fn on_final(&mut self, hypothesis: &Hypothesis) {
        let state = self.status.state();
        if !matches!(state, SessionState::Listening | SessionState::Done) {
            log::warn!("session: final result ignored in {state}");
            return;
        }

        let text = hypothesis.text(HypothesisKind::Final);
        if text.is_empty() {
            log::debug!("session: empty final result");
            return;
        }

        if state == SessionState::Done {
            log::debug!("session: late final result after stop: {text:?}");
            return;
        }

        log::info!("session: final {text:?}");
        self.publish(|s| s.record(TranscriptEntry::Final(text)));
    }

    fn on_timeout(&mut self) {
        let state = self.status.state();
        if state != SessionState::Listening || self.recognizer.is_none() {
            log::debug!("session: timeout ignored in {state}");
            return;
        }

        log::warn!("session: recognition timeout, still listening");
        self.publish(|s| {
            s.record(TranscriptEntry::Timeout);
            if s.status_line.starts_with(LISTENING_PREFIX) {
                s.status_line = LISTENING.to_string();
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
