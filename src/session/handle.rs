//! Caller-side handle to the session controller.

use tokio::sync::{mpsc, oneshot, watch};

use crate::recognizer::{RecognitionEvent, SpeechModel};

use super::controller::SessionCommand;
use super::state::{SessionState, SessionStatus, SharedSession};
use super::SessionError;

/// What a `toggle_listening` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningChange {
    Started,
    Stopped,
}

/// Cheap-to-clone handle.  Every request is queued to the controller task
/// and answered once it has been applied.
///
/// The controller stops when the last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    status: SharedSession,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<SessionCommand>,
        status: SharedSession,
        state_rx: watch::Receiver<SessionState>,
    ) -> Self {
        Self {
            commands,
            status,
            state_rx,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }

    /// Measure ambient noise.  Returns once calibration has started; watch
    /// [`subscribe`](Self::subscribe) for the end of the run.
    pub async fn start_calibration(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::StartCalibration).await?
    }

    /// Start listening when idle, stop when listening.
    pub async fn toggle_listening(&self) -> Result<ListeningChange, SessionError> {
        self.request(SessionCommand::ToggleListening).await?
    }

    /// Pause or resume command matching.  Returns the pause flag now in
    /// effect, which is always `false` outside `Listening`.
    pub async fn set_paused(&self, paused: bool) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::SetPaused { paused, reply })
            .await
    }

    pub async fn model_loaded(&self, model: SpeechModel) -> Result<SessionState, SessionError> {
        self.request(|reply| SessionCommand::ModelLoaded { model, reply })
            .await
    }

    pub async fn model_load_failed(
        &self,
        cause: impl Into<String>,
    ) -> Result<SessionState, SessionError> {
        let cause = cause.into();
        self.request(|reply| SessionCommand::ModelLoadFailed { cause, reply })
            .await
    }

    pub async fn permission_denied(&self) -> Result<SessionState, SessionError> {
        self.request(SessionCommand::PermissionDenied).await
    }

    /// Leave `Error` once its cause has been dealt with.  Needs a model.
    pub async fn recover(&self) -> Result<SessionState, SessionError> {
        self.request(SessionCommand::Recover).await?
    }

    /// The application went to the background: stop any active listening.
    pub async fn suspend(&self) -> Result<SessionState, SessionError> {
        self.request(SessionCommand::Suspend).await
    }

    /// Stop everything and end the controller task.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::Shutdown).await
    }

    /// Status after every previously queued request and event was applied.
    pub async fn snapshot(&self) -> Result<SessionStatus, SessionError> {
        self.request(SessionCommand::Snapshot).await
    }

    /// Feed a recognizer callback.  Never blocks; safe to call from the
    /// recognizer's own thread.
    pub fn on_recognition_event(&self, event: RecognitionEvent) {
        log::trace!("session: queueing {} event", event.kind());
        if self.commands.send(SessionCommand::Recognition(event)).is_err() {
            log::debug!("session: controller gone, dropping recognizer event");
        }
    }

    /// Latest published status.
    pub fn status(&self) -> SessionStatus {
        self.status.snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    /// Receiver that is notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }
}
