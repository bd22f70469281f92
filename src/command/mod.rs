//! Voice-command classification of partial hypotheses.
//!
//! [`CommandMatcher`] holds an ordered, immutable rule table and maps a
//! partial transcript to at most one [`MatchOutcome`].  It never touches the
//! session; the session decides what to do with the outcome.
//!
//! # Quick start
//!
//! ```rust
//! use voice_command::command::{CommandMatcher, MediaKey};
//!
//! let matcher = CommandMatcher::default();
//! let outcome = matcher.match_text("Play music please");
//! assert!(outcome.matched);
//! assert_eq!(outcome.side_effect, Some(MediaKey::PlayPause));
//!
//! assert!(!matcher.match_text("what time is it").matched);
//! ```

pub mod matcher;

use serde::{Deserialize, Serialize};

pub use matcher::{normalize, CommandMatcher, CommandRule, MatchOutcome};

/// Playback control dispatched as a system media key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKey {
    PlayPause,
    Next,
    Previous,
}

impl MediaKey {
    /// Log-friendly name.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKey::PlayPause => "PLAY_PAUSE",
            MediaKey::Next => "NEXT",
            MediaKey::Previous => "PREVIOUS",
        }
    }
}

impl std::fmt::Display for MediaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
