//! Voice-command session controller.
//!
//! The controller is a tokio task that owns all session state.  Everything
//! that can change it funnels into that one task:
//!
//! ```text
//! SessionHandle (caller)      ──SessionCommand + oneshot reply──┐
//! Recognizer thread(s)        ──RecognitionEvent───────────────┐│
//! Calibration worker          ──CalibrationReport─────────────┐││
//!                                                             ▼▼▼
//!                                   SessionController::run()
//!                                        │
//!                                        ├─ CommandMatcher → SpeechSink / MediaKeySink
//!                                        ├─ CalibrationStore
//!                                        └─ SharedSession (status) + watch<SessionState>
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_command::audio::CpalCaptureSource;
//! use voice_command::calibration::FileCalibrationStore;
//! use voice_command::config::AppConfig;
//! use voice_command::output::{speech_from_config, EnigoMediaKeys};
//! use voice_command::recognizer::{RecognizerFactory, SpeechModel};
//! use voice_command::session::{Collaborators, SessionController};
//!
//! # async fn example(recognizers: Arc<dyn RecognizerFactory>) -> anyhow::Result<()> {
//! let config = AppConfig::load()?;
//! let handle = SessionController::spawn(
//!     &config,
//!     Collaborators {
//!         capture: Arc::new(CpalCaptureSource),
//!         recognizers,
//!         store: Arc::new(FileCalibrationStore::default_location()),
//!         speech: speech_from_config(&config.speech),
//!         media_keys: Arc::new(EnigoMediaKeys),
//!     },
//! );
//!
//! handle.model_loaded(SpeechModel::load("/path/to/model-en-us")?).await?;
//! handle.start_calibration().await?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod handle;
pub mod state;

use thiserror::Error;

use crate::recognizer::{ModelError, RecognizerError};

pub use controller::{Collaborators, SessionController};
pub use handle::{ListeningChange, SessionHandle};
pub use state::{SessionState, SessionStatus, SharedSession, TranscriptEntry, TRANSCRIPT_LIMIT};

// Status lines shown to the user.
pub const PREPARING: &str = "Preparing…";
pub const CALIBRATING: &str = "Calibrating… Please remain silent.";
pub const LISTENING: &str = "Listening...";
pub const LISTENING_PREFIX: &str = "Listening:";
pub const PAUSED: &str = "Paused";
pub const CALIBRATE_TIP: &str = "Tip: Calibrate first for better results in noise.";
pub const NO_SIGNIFICANT_AUDIO: &str = "Calibration failed: No significant audio detected.";
pub const MODEL_MISSING: &str = "Failed to load speech model.";
pub const PERMISSION_DENIED: &str = "Permission denied: Microphone access is required.";

/// Status line for an unmatched partial.
pub fn listening_status(partial: &str) -> String {
    format!("{LISTENING_PREFIX} {partial}...")
}

pub fn calibration_complete(rms: f64) -> String {
    format!("Calibration complete. Average RMS: {rms:.2}")
}

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Why a session operation was refused or failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// The operation is not valid in the current state.
    #[error("cannot {op} now (state: {state})")]
    NotAllowed { op: &'static str, state: SessionState },

    /// Calibration was requested while a recognizer is running.
    #[error("cannot calibrate while listening")]
    ListeningActive,

    /// A previous calibration worker is still releasing the capture device.
    #[error("previous calibration is still shutting down")]
    CalibrationBusy,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Recognizer(#[from] RecognizerError),

    /// The controller task has stopped.
    #[error("session controller is not running")]
    Closed,
}
