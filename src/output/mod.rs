//! Side-effect sinks driven by matched commands.
//!
//! - [`SpeechSink`]: speaks a response, interrupting any utterance that is
//!   still playing.  [`ProcessSpeech`] shells out to a TTS program;
//!   [`LogSpeech`] only logs (speech disabled).
//! - [`MediaKeySink`]: dispatches a system media key as a press/release
//!   pair.  [`EnigoMediaKeys`] is the `enigo` backend.

pub mod media_keys;
pub mod speech;

use std::sync::Arc;

use thiserror::Error;

use crate::command::MediaKey;
use crate::config::SpeechConfig;

pub use media_keys::EnigoMediaKeys;
pub use speech::{LogSpeech, ProcessSpeech};

// ---------------------------------------------------------------------------
// OutputError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OutputError {
    /// Could not simulate a key press/release event.
    #[error("cannot simulate key press: {0}")]
    KeySimulation(String),

    /// The TTS program could not be started.
    #[error("cannot speak: {0}")]
    Speech(String),
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Text-to-speech output with flush semantics.
pub trait SpeechSink: Send + Sync {
    /// Speak `text`, cutting off whatever is currently being spoken.
    fn speak(&self, text: &str) -> Result<(), OutputError>;

    /// Silence any in-flight utterance.  No-op when nothing is playing.
    fn stop(&self);
}

/// System media-key dispatch.
pub trait MediaKeySink: Send + Sync {
    fn dispatch(&self, key: MediaKey) -> Result<(), OutputError>;
}

/// Speech sink selected by `[speech]` in `settings.toml`.
pub fn speech_from_config(config: &SpeechConfig) -> Arc<dyn SpeechSink> {
    if config.enabled {
        Arc::new(ProcessSpeech::from_config(config))
    } else {
        log::info!("output: speech disabled, responses are only logged");
        Arc::new(LogSpeech)
    }
}
