//! Media-key simulation backed by the `enigo` crate.
//!
//! | MediaKey    | enigo key                |
//! |-------------|--------------------------|
//! | `PlayPause` | `Key::MediaPlayPause`    |
//! | `Next`      | `Key::MediaNextTrack`    |
//! | `Previous`  | `Key::MediaPrevTrack`    |

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::{MediaKeySink, OutputError};
use crate::command::MediaKey;

/// Maps a [`MediaKey`] onto the enigo key that produces it.
pub fn enigo_key(key: MediaKey) -> Key {
    match key {
        MediaKey::PlayPause => Key::MediaPlayPause,
        MediaKey::Next => Key::MediaNextTrack,
        MediaKey::Previous => Key::MediaPrevTrack,
    }
}

/// [`MediaKeySink`] that injects keys into the desktop session.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnigoMediaKeys;

impl MediaKeySink for EnigoMediaKeys {
    /// Send a key-down followed by a key-up for `key`.
    ///
    /// A new [`Enigo`] instance is created for each call because `Enigo` is
    /// not `Send` and the handle is cheap to construct.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::KeySimulation`] if the enigo backend cannot be
    /// initialised or if either key event fails to be delivered.
    fn dispatch(&self, key: MediaKey) -> Result<(), OutputError> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| OutputError::KeySimulation(e.to_string()))?;
        let target = enigo_key(key);

        enigo
            .key(target, Direction::Press)
            .map_err(|e| OutputError::KeySimulation(e.to_string()))?;
        enigo
            .key(target, Direction::Release)
            .map_err(|e| OutputError::KeySimulation(e.to_string()))?;

        log::debug!("output: dispatched media key {key}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_media_key_has_a_distinct_enigo_key() {
        assert_eq!(enigo_key(MediaKey::PlayPause), Key::MediaPlayPause);
        assert_eq!(enigo_key(MediaKey::Next), Key::MediaNextTrack);
        assert_eq!(enigo_key(MediaKey::Previous), Key::MediaPrevTrack);
    }
}
