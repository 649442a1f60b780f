//! Keyboard to game input translation.
//!
//! Most terminals only report key presses (and auto-repeat presses while a
//! key is held). When the terminal also reports releases, [`KeyTracker`]
//! forwards them directly; otherwise a held key counts as released once no
//! repeat has arrived for [`RELEASE_TIMEOUT`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use fakeblok_types::{Component, Input, InvalidKeyError, Sign};

/// Longer than the usual auto-repeat delay, so a held key does not stutter.
pub const RELEASE_TIMEOUT: Duration = Duration::from_millis(550);

/// Direction a movement key pushes in.
fn movement(key: KeyCode) -> Option<(Component, Sign)> {
    let KeyCode::Char(c) = key else {
        return None;
    };
    match c.to_ascii_lowercase() {
        'w' => Some((Component::Y, Sign::Negative)),
        'a' => Some((Component::X, Sign::Negative)),
        's' => Some((Component::Y, Sign::Positive)),
        'd' => Some((Component::X, Sign::Positive)),
        _ => None,
    }
}

/// The game input for pressing or releasing `key`.
pub fn key_binding(pressed: bool, key: KeyCode) -> Result<Input, InvalidKeyError> {
    match (pressed, key) {
        (true, KeyCode::Char(' ')) => Ok(Input::Shoot),
        (pressed, key) => {
            let (component, sign) = movement(key).ok_or(InvalidKeyError)?;
            Ok(Input::Move(component, pressed.then_some(sign)))
        }
    }
}

#[derive(Debug)]
pub struct KeyTracker {
    release_events: bool,
    /// Held movement keys and when each was last seen.
    held: BTreeMap<char, Instant>,
}

impl KeyTracker {
    /// `release_events`: the terminal reports key releases.
    #[must_use]
    pub fn new(release_events: bool) -> Self {
        Self {
            release_events,
            held: BTreeMap::new(),
        }
    }

    pub fn handle(&mut self, event: &KeyEvent, now: Instant) -> Vec<Input> {
        let KeyCode::Char(c) = event.code else {
            return Vec::new();
        };
        let c = c.to_ascii_lowercase();

        match event.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                if movement(event.code).is_none() {
                    // Auto-repeat would otherwise turn a held Space into a burst.
                    return match (event.kind, key_binding(true, event.code)) {
                        (KeyEventKind::Press, Ok(input)) => vec![input],
                        _ => Vec::new(),
                    };
                }
                if self.held.insert(c, now).is_some() {
                    return Vec::new();
                }
                key_binding(true, event.code).into_iter().collect()
            }
            KeyEventKind::Release => {
                if self.held.remove(&c).is_none() {
                    return Vec::new();
                }
                self.released(event.code).into_iter().collect()
            }
        }
    }

    /// Release keys that have not repeated within [`RELEASE_TIMEOUT`].
    ///
    /// Does nothing when the terminal reports releases itself.
    pub fn expire(&mut self, now: Instant) -> Vec<Input> {
        if self.release_events {
            return Vec::new();
        }
        let stale: Vec<char> = self
            .held
            .iter()
            .filter(|&(_, &seen)| now.duration_since(seen) >= RELEASE_TIMEOUT)
            .map(|(&c, _)| c)
            .collect();

        stale
            .into_iter()
            .filter_map(|c| {
                self.held.remove(&c);
                self.released(KeyCode::Char(c))
            })
            .collect()
    }

    /// Input after `key` was let go. A still-held opposite key on the same
    /// axis takes over instead of stopping.
    fn released(&self, key: KeyCode) -> Option<Input> {
        let (component, _) = movement(key)?;
        let remaining = self
            .held
            .keys()
            .filter_map(|&c| movement(KeyCode::Char(c)))
            .find(|&(held_component, _)| held_component == component)
            .map(|(_, sign)| sign);
        Some(Input::Move(component, remaining))
    }

    #[must_use]
    pub fn is_held(&self, c: char) -> bool {
        self.held.contains_key(&c.to_ascii_lowercase())
    }
}
