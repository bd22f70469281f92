//! Voice-command session controller.
//!
//! Turns microphone audio and speech-recognizer callbacks into an
//! ambient-noise calibration and a stream of dispatched voice commands
//! (spoken responses and media keys), while keeping one coherent session
//! state.
//!
//! | Module | Role |
//! |--------|------|
//! | [`audio`] | capture-device contract, cpal backend, loudness metric |
//! | [`calibration`] | ambient-noise measurement and its persistence |
//! | [`command`] | partial-hypothesis command matching |
//! | [`recognizer`] | external recognizer seam and hypothesis parsing |
//! | [`output`] | speech and media-key sinks |
//! | [`session`] | the serialized session state machine |
//! | [`config`] | `settings.toml` and platform paths |

pub mod audio;
pub mod calibration;
pub mod command;
pub mod config;
pub mod output;
pub mod recognizer;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
