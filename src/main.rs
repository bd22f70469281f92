//! Application entry point: headless voice-command console.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Spawn the session controller with the cpal capture source, the file
//!    calibration store, the configured speech sink and enigo media keys.
//! 5. Load the recognizer model off the async threads and report it.
//! 6. Read commands from stdin until `quit` or EOF.
//!
//! No recognition engine is linked in.  The console recognizer forwards
//! typed hypotheses instead: `> text` is a partial, `>> text` a final.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use voice_command::{
    audio::CpalCaptureSource,
    calibration::FileCalibrationStore,
    config::{AppConfig, AppPaths},
    output::{speech_from_config, EnigoMediaKeys},
    recognizer::{
        RecognitionEvent, RecognitionListener, Recognizer, RecognizerError, RecognizerFactory,
        SpeechModel,
    },
    session::{Collaborators, SessionController, SessionError, SessionHandle, SessionStatus},
};

// ---------------------------------------------------------------------------
// Console recognizer
// ---------------------------------------------------------------------------

type ListenerSlot = Arc<Mutex<Option<Arc<dyn RecognitionListener>>>>;

/// Recognizer factory whose recognizers are fed from the console.
#[derive(Default)]
struct ConsoleRecognizers {
    listener: ListenerSlot,
}

impl ConsoleRecognizers {
    /// Hand `event` to the running recognizer's listener, if any.
    fn emit(&self, event: RecognitionEvent) -> bool {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match listener {
            Some(listener) => {
                listener.on_event(event);
                true
            }
            None => false,
        }
    }
}

impl RecognizerFactory for ConsoleRecognizers {
    fn create(
        &self,
        model: &SpeechModel,
        sample_rate: u32,
    ) -> Result<Box<dyn Recognizer>, RecognizerError> {
        log::debug!(
            "console recognizer for {} at {sample_rate} Hz",
            model.path().display()
        );
        Ok(Box::new(ConsoleRecognizer {
            slot: Arc::clone(&self.listener),
        }))
    }
}

struct ConsoleRecognizer {
    slot: ListenerSlot,
}

impl Recognizer for ConsoleRecognizer {
    fn start(&mut self, listener: Arc<dyn RecognitionListener>) -> Result<(), RecognizerError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(listener);
        Ok(())
    }

    fn stop(&mut self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

const HELP: &str = "\
commands:
  calibrate         measure ambient noise (stay silent)
  listen            start / stop listening
  pause | resume    gate command matching
  recover           leave the error state
  status            print the session status
  > text            feed a partial hypothesis
  >> text           feed a final hypothesis
  quit              exit";

fn report<T: std::fmt::Debug>(result: Result<T, SessionError>) {
    match result {
        Ok(value) => println!("ok: {value:?}"),
        Err(e) => println!("refused: {e}"),
    }
}

fn print_status(status: &SessionStatus) {
    println!("state:       {}", status.state);
    println!("paused:      {}", status.paused);
    if let Some(cause) = &status.error_cause {
        println!("error:       {cause}");
    }
    println!("status line: {}", status.status_line);
    if status.calibration.valid {
        println!("calibration: {:.2}", status.calibration.rms);
    } else {
        println!("calibration: none");
    }
    for entry in status.transcript.iter().rev().take(5).rev() {
        println!("  | {entry}");
    }
}

/// Print every state transition together with the status line.
fn spawn_state_printer(handle: &SessionHandle) {
    let mut states = handle.subscribe();
    let handle = handle.clone();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let status = handle.status();
            println!("[{}] {}", status.state, status.status_line);
        }
    });
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let paths = AppPaths::new();
    let console = Arc::new(ConsoleRecognizers::default());

    let handle = SessionController::spawn(
        &config,
        Collaborators {
            capture: Arc::new(CpalCaptureSource),
            recognizers: console.clone(),
            store: Arc::new(FileCalibrationStore::new(paths.calibration_file.clone())),
            speech: speech_from_config(&config.speech),
            media_keys: Arc::new(EnigoMediaKeys),
        },
    );
    spawn_state_printer(&handle);

    let model_dir = config.model.resolve(&paths);
    log::info!("loading model from {}", model_dir.display());
    match tokio::task::spawn_blocking(move || SpeechModel::load(model_dir)).await? {
        Ok(model) => handle.model_loaded(model).await?,
        Err(e) => handle.model_load_failed(e.to_string()).await?,
    };

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "calibrate" => report(handle.start_calibration().await),
            "listen" => report(handle.toggle_listening().await),
            "pause" => report(handle.set_paused(true).await),
            "resume" => report(handle.set_paused(false).await),
            "recover" => report(handle.recover().await),
            "status" => print_status(&handle.snapshot().await?),
            "help" => println!("{HELP}"),
            "quit" | "exit" => break,
            _ => {
                let event = if let Some(text) = line.strip_prefix(">>") {
                    RecognitionEvent::final_result(
                        serde_json::json!({ "text": text.trim() }).to_string(),
                    )
                } else if let Some(text) = line.strip_prefix('>') {
                    RecognitionEvent::partial(
                        serde_json::json!({ "partial": text.trim() }).to_string(),
                    )
                } else {
                    println!("unknown command {line:?}; type `help`");
                    continue;
                };
                if !console.emit(event) {
                    println!("not listening; type `listen` first");
                }
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-command starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    rt.block_on(run(config))
}
