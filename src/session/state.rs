//! Session state machine values and the published status snapshot.
//!
//! [`SessionState`] is the single state of the controller.  [`SessionStatus`]
//! is everything a front end needs to render the session: state, pause flag,
//! error cause, status line, transcript and calibration.  The controller is
//! its only writer; readers go through [`SharedSession`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::calibration::CalibrationProfile;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// States of the voice-command session.
///
/// ```text
/// Start ──model loaded──▶ Ready
/// Start ──model load failed──▶ Error
/// Ready ──start calibration──▶ Calibrating ──finished──▶ Ready
/// Ready / Done / Error ──toggle listening──▶ Listening
/// Listening ──toggle listening──▶ Done
/// any ──recognizer error──▶ Error
/// Error ──recover (model present)──▶ Ready
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Waiting for the recognizer model.
    #[default]
    Start,
    /// Model loaded; idle.
    Ready,
    /// Ambient-noise calibration is running.
    Calibrating,
    /// A recognizer is running and partials are matched against commands.
    Listening,
    /// Listening was stopped by the user.
    Done,
    /// Something failed; see [`SessionStatus::error_cause`].
    Error,
}

impl SessionState {
    /// States from which calibration or listening may be started.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Done | SessionState::Error
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Start => "Start",
            SessionState::Ready => "Ready",
            SessionState::Calibrating => "Calibrating",
            SessionState::Listening => "Listening",
            SessionState::Done => "Done",
            SessionState::Error => "Error",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// TranscriptEntry
// ---------------------------------------------------------------------------

/// One line of the session transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    /// A non-empty final hypothesis.
    Final(String),
    /// A partial hypothesis that matched a command.
    Command(String),
    /// The recognizer reported a silence timeout.
    Timeout,
    /// The session entered `Error` with this cause.
    Error(String),
}

impl std::fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptEntry::Final(text) => write!(f, "{text}"),
            TranscriptEntry::Command(text) => write!(f, "Command: {text}"),
            TranscriptEntry::Timeout => f.write_str("Timeout"),
            TranscriptEntry::Error(cause) => write!(f, "Error: {cause}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Transcript entries kept in [`SessionStatus`].
pub const TRANSCRIPT_LIMIT: usize = 200;

/// Snapshot of the session as seen from outside.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Only ever `true` while `state == Listening`.
    pub paused: bool,
    /// Set when entering `Error`, cleared when leaving it.
    pub error_cause: Option<String>,
    /// Assistant response line: status messages, partials, command responses.
    pub status_line: String,
    /// Most recent entries, oldest first, at most [`TRANSCRIPT_LIMIT`].
    pub transcript: VecDeque<TranscriptEntry>,
    /// Last loaded or measured calibration.
    pub calibration: CalibrationProfile,
}

impl SessionStatus {
    pub fn new(calibration: CalibrationProfile) -> Self {
        Self {
            state: SessionState::Start,
            paused: false,
            error_cause: None,
            status_line: super::PREPARING.to_string(),
            transcript: VecDeque::new(),
            calibration,
        }
    }

    /// Append to the transcript, dropping the oldest entry when full.
    pub fn record(&mut self, entry: TranscriptEntry) {
        if self.transcript.len() == TRANSCRIPT_LIMIT {
            self.transcript.pop_front();
        }
        self.transcript.push_back(entry);
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new(CalibrationProfile::invalid())
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionStatus`].
///
/// Cheap to clone.  Only the controller task writes; each transition is one
/// critical section, so readers never see a state and pause flag that
/// disagree.
#[derive(Debug, Clone, Default)]
pub struct SharedSession(Arc<Mutex<SessionStatus>>);

impl SharedSession {
    pub fn new(status: SessionStatus) -> Self {
        Self(Arc::new(Mutex::new(status)))
    }

    /// Lock the status, recovering from a poisoned lock.
    pub fn lock(&self) -> MutexGuard<'_, SessionStatus> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> SessionStatus {
        self.lock().clone()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
