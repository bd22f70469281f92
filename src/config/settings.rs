//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the capture device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz handed to the recognizer and the calibrator
    /// (must be 16 000).
    pub sample_rate: u32,
    /// Number of 16-bit samples in one capture block.
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            block_size: 2_048,
        }
    }
}

// ---------------------------------------------------------------------------
// CalibrationConfig
// ---------------------------------------------------------------------------

/// Settings for the ambient-noise calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// How long to sample the room for, in milliseconds.
    pub duration_ms: u64,
    /// Blocks whose RMS metric is at or below this value are treated as
    /// silence and excluded from the average.
    pub noise_floor: f64,
}

impl CalibrationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 5_000,
            noise_floor: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Where to find the recognizer model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Explicit model directory.  `None` means
    /// [`AppPaths::default_model_dir`].
    pub path: Option<PathBuf>,
}

impl ModelConfig {
    /// Resolve the model directory against the platform paths.
    pub fn resolve(&self, paths: &AppPaths) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| paths.default_model_dir())
    }
}

// ---------------------------------------------------------------------------
// CommandConfig
// ---------------------------------------------------------------------------

/// Spoken responses for each command rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    pub hello: String,
    pub wake: String,
    pub play_pause: String,
    pub next: String,
    pub previous: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            hello: "Hello Sir".into(),
            wake: "Yes Sir?".into(),
            play_pause: "Toggling Music Playback…".into(),
            next: "Playing next song…".into(),
            previous: "Playing previous song…".into(),
        }
    }
}

/// Vocabulary of the command matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Names the assistant answers to.  The recognizer frequently hears
    /// "jarvis" as "charlie" or "java", so all three are accepted.
    pub assistant_names: Vec<String>,
    /// Greeting words that, together with a name, trigger the hello rule.
    pub greetings: Vec<String>,
    /// A bare name is only a wake word when the whole hypothesis is shorter
    /// than this many characters.
    pub wake_max_len: usize,
    pub responses: ResponseConfig,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            assistant_names: vec!["jarvis".into(), "charlie".into(), "java".into()],
            greetings: vec!["hello".into(), "hallo".into()],
            wake_max_len: 15,
            responses: ResponseConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Text-to-speech output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speak command responses at all.
    pub enabled: bool,
    /// External TTS program invoked with the utterance as its last argument.
    pub command: String,
    /// Extra arguments placed before the utterance.
    pub args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "espeak-ng".into(),
            args: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_command::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture device settings.
    pub audio: AudioConfig,
    /// Ambient-noise calibration settings.
    pub calibration: CalibrationConfig,
    /// Recognizer model location.
    pub model: ModelConfig,
    /// Command vocabulary and responses.
    pub commands: CommandConfig,
    /// Spoken response output.
    pub speech: SpeechConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
