//! Host key events
//!
//! Hosts translate their native keyboard events into [`KeyEvent`]: modifier
//! flags plus the DOM `KeyboardEvent.code` of the physical key.

use serde::{Deserialize, Serialize};

use super::key_code::KeyCode;
use super::types::{Chord, Modifiers};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyEvent {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Cmd on macOS, Win/Super elsewhere
    pub meta: bool,
    pub code: String,
}

impl KeyEvent {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Build the event that would produce `chord`
    pub fn from_chord(chord: Chord) -> Self {
        Self {
            ctrl: chord.mods.ctrl(),
            shift: chord.mods.shift(),
            alt: chord.mods.alt(),
            meta: chord.mods.meta(),
            code: chord.key.name().to_string(),
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Convert to a chord; unknown codes map to `KeyCode::Unknown`
    pub fn chord(&self) -> Chord {
        Chord::new(
            Modifiers::new(self.ctrl, self.shift, self.alt, self.meta),
            KeyCode::from_code(&self.code),
        )
    }

    /// Dispatch string, or `None` for pure modifier presses and unknown keys
    pub fn dispatch_str(&self) -> Option<String> {
        self.chord().dispatch_str()
    }
}
