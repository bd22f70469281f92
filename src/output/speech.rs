//! Spoken responses.
//!
//! [`ProcessSpeech`] runs an external TTS program (`espeak-ng` by default)
//! once per utterance: `<command> <args...> <text>`.  Only one utterance is
//! ever alive; a new `speak` or a `stop` kills the running process first.

use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use super::{OutputError, SpeechSink};
use crate::config::SpeechConfig;

/// Process-backed [`SpeechSink`].
#[derive(Debug)]
pub struct ProcessSpeech {
    command: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl ProcessSpeech {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            current: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    /// `true` while an utterance process is still running.
    pub fn is_speaking(&self) -> bool {
        let mut current = self.lock();
        match current.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                *current = None;
                false
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Child>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Kill and reap `child` if it is still running.
fn silence(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        if let Err(e) = child.kill() {
            log::warn!("speech: failed to stop utterance: {e}");
        }
    }
    let _ = child.wait();
}

impl SpeechSink for ProcessSpeech {
    fn speak(&self, text: &str) -> Result<(), OutputError> {
        let mut current = self.lock();
        if let Some(mut previous) = current.take() {
            silence(&mut previous);
        }

        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| OutputError::Speech(format!("{}: {e}", self.command)))?;

        log::debug!("speech: speaking {text:?} (pid {})", child.id());
        *current = Some(child);
        Ok(())
    }

    fn stop(&self) {
        if let Some(mut child) = self.lock().take() {
            log::debug!("speech: stopping pid {}", child.id());
            silence(&mut child);
        }
    }
}

impl Drop for ProcessSpeech {
    fn drop(&mut self) {
        self.stop();
    }
}

/// [`SpeechSink`] used when speech is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSpeech;

impl SpeechSink for LogSpeech {
    fn speak(&self, text: &str) -> Result<(), OutputError> {
        log::info!("speech (muted): {text}");
        Ok(())
    }

    fn stop(&self) {}
}
