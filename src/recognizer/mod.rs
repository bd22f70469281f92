//! Speech-recognizer seam.
//!
//! The recognition engine itself is external.  This module defines what the
//! session needs from it:
//!
//! - [`SpeechModel`]: a loaded model directory, required before listening.
//! - [`RecognizerFactory`]: builds a [`Recognizer`] from a model and sample
//!   rate.
//! - [`Recognizer`]: started with a [`RecognitionListener`], it delivers one
//!   [`RecognitionEvent`] per produced result on its own thread until stopped.
//!
//! ```text
//! RecognizerFactory::create(model, 16 kHz)
//!        │
//!        ▼
//! Recognizer::start(listener) ──▶ Partial / Final / Error / Timeout ──▶ session
//! Recognizer::stop()          ──▶ engine + audio released
//! ```

pub mod hypothesis;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use hypothesis::{Hypothesis, HypothesisError, HypothesisKind};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The recognizer model is missing or unusable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("speech model is not loaded")]
    NotLoaded,

    #[error("speech model not found: {0}")]
    NotFound(String),

    #[error("speech model is invalid: {0}")]
    Invalid(String),
}

/// Failures reported by or about the recognition engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecognizerError {
    /// The recognizer could not be constructed.
    #[error("failed to create recognizer: {0}")]
    Create(String),

    /// The recognizer was built but would not start listening.
    #[error("failed to start recognizer: {0}")]
    Start(String),

    /// The engine reported a failure while running.
    #[error("recognizer error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// SpeechModel
// ---------------------------------------------------------------------------

/// Handle to an unpacked recognizer model directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechModel {
    path: PathBuf,
}

impl SpeechModel {
    /// Validate and wrap the model directory at `path`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::NotFound`]: `path` does not exist.
    /// - [`ModelError::Invalid`]: `path` is not a directory or is empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ModelError::NotFound(path.display().to_string()));
        }
        if !path.is_dir() {
            return Err(ModelError::Invalid(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        let mut entries = std::fs::read_dir(path)
            .map_err(|e| ModelError::Invalid(format!("{}: {e}", path.display())))?;
        if entries.next().is_none() {
            return Err(ModelError::Invalid(format!("{} is empty", path.display())));
        }

        log::info!("recognizer: model found at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name, used in log lines.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One callback from the recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Interim hypothesis while the speaker is still talking.
    Partial(Hypothesis),
    /// Hypothesis for a completed utterance.
    Final(Hypothesis),
    /// The engine failed; the message becomes the session's error cause.
    Error(String),
    /// Silence timeout.  A liveness signal, not an error.
    Timeout,
}

impl RecognitionEvent {
    pub fn partial(raw: impl Into<String>) -> Self {
        Self::Partial(Hypothesis::new(raw))
    }

    pub fn final_result(raw: impl Into<String>) -> Self {
        Self::Final(Hypothesis::new(raw))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RecognitionEvent::Partial(_) => "partial",
            RecognitionEvent::Final(_) => "final",
            RecognitionEvent::Error(_) => "error",
            RecognitionEvent::Timeout => "timeout",
        }
    }
}

/// Receives recognizer callbacks.  Called from the recognizer's own thread.
pub trait RecognitionListener: Send + Sync {
    fn on_event(&self, event: RecognitionEvent);
}

// ---------------------------------------------------------------------------
// Recognizer / RecognizerFactory
// ---------------------------------------------------------------------------

/// A running (or ready-to-run) recognition session.
pub trait Recognizer: Send {
    /// Begin capturing and recognising; events go to `listener`.
    fn start(&mut self, listener: Arc<dyn RecognitionListener>) -> Result<(), RecognizerError>;

    /// Stop recognising and release the engine and its audio input.
    fn stop(&mut self);
}

/// Builds recognizers for a loaded model.
pub trait RecognizerFactory: Send + Sync {
    fn create(
        &self,
        model: &SpeechModel,
        sample_rate: u32,
    ) -> Result<Box<dyn Recognizer>, RecognizerError>;
}

// Compile-time assertion: both traits must be usable as trait objects.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Recognizer>, _: Arc<dyn RecognizerFactory>) {}
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_model_dir_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let err = SpeechModel::load(dir.path().join("model-en-us")).unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)), "{err}");
    }

    #[test]
    fn empty_model_dir_is_invalid() {
        let dir = tempdir().expect("temp dir");
        let err = SpeechModel::load(dir.path()).unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)), "{err}");
    }

    #[test]
    fn model_file_instead_of_dir_is_invalid() {
        let dir = tempdir().expect("temp dir");
        let file = dir.path().join("model.bin");
        std::fs::write(&file, b"not a model dir").expect("write");
        assert!(matches!(
            SpeechModel::load(&file),
            Err(ModelError::Invalid(_))
        ));
    }

    #[test]
    fn populated_model_dir_loads() {
        let dir = tempdir().expect("temp dir");
        let model_dir = dir.path().join("model-en-us");
        std::fs::create_dir_all(model_dir.join("am")).expect("mkdir");

        let model = SpeechModel::load(&model_dir).expect("load");
        assert_eq!(model.path(), model_dir.as_path());
        assert_eq!(model.name(), "model-en-us");
    }

    #[test]
    fn event_constructors_wrap_raw_payloads() {
        let ev = RecognitionEvent::partial(r#"{"partial":"next"}"#);
        assert_eq!(ev.kind(), "partial");
        match ev {
            RecognitionEvent::Partial(h) => {
                assert_eq!(h.text(HypothesisKind::Partial), "next")
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(RecognitionEvent::final_result("{}").kind(), "final");
    }
}
