//! Keybinding: a sequence of one or two chords

use super::error::KeymapError;
use super::types::{Chord, OperatingSystem};

/// Longest supported chord sequence
pub const MAX_CHORDS: usize = 2;

/// An ordered sequence of chords (one, or two for a chord binding)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keybinding {
    chords: Vec<Chord>,
}

impl Keybinding {
    /// Create a keybinding; empty sequences and sequences longer than two are rejected
    pub fn new(chords: Vec<Chord>) -> Result<Self, KeymapError> {
        if chords.is_empty() {
            return Err(KeymapError::InvalidArgument(
                "keybinding needs at least one chord".to_string(),
            ));
        }
        if chords.len() > MAX_CHORDS {
            return Err(KeymapError::InvalidArgument(format!(
                "keybinding has {} chords, at most {} are supported",
                chords.len(),
                MAX_CHORDS
            )));
        }
        Ok(Self { chords })
    }

    /// Create a single-chord binding
    pub fn single(chord: Chord) -> Self {
        Self {
            chords: vec![chord],
        }
    }

    /// Decode a packed keybinding: low word first chord, high word second chord
    pub fn from_number(packed: u32, os: OperatingSystem) -> Option<Self> {
        if packed == 0 {
            return None;
        }
        let first = Chord::from_number((packed & 0xffff) as u16, os);
        let second = (packed >> 16) as u16;
        let chords = if second != 0 {
            vec![first, Chord::from_number(second, os)]
        } else {
            vec![first]
        };
        Some(Self { chords })
    }

    /// Pack into the `u32` form understood by [`Keybinding::from_number`]
    pub fn to_number(&self, os: OperatingSystem) -> u32 {
        self.chords
            .iter()
            .take(MAX_CHORDS)
            .enumerate()
            .fold(0u32, |acc, (i, chord)| {
                acc | (u32::from(chord.to_number(os)) << (16 * i))
            })
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn first(&self) -> Chord {
        self.chords[0]
    }

    /// Check if this is a chord (multi-key) binding
    pub fn is_chord(&self) -> bool {
        self.chords.len() > 1
    }

    /// Dispatch string per chord; `None` for chords that cannot be dispatched
    pub fn dispatch_chords(&self) -> Vec<Option<String>> {
        self.chords.iter().map(Chord::dispatch_str).collect()
    }

    /// Get display string for this keybinding, e.g. `Ctrl+K Ctrl+S`
    pub fn label(&self, os: OperatingSystem) -> String {
        self.chords
            .iter()
            .map(|c| c.label(os))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pack two chords into a keybinding number, as used in rule declarations
pub const fn chord_pair(first: u16, second: u16) -> u32 {
    (first as u32) | ((second as u32) << 16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::key_code::KeyCode;
    use crate::keymap::types::Modifiers;

    const OS: OperatingSystem = OperatingSystem::Linux;

    #[test]
    fn test_empty_keybinding_rejected() {
        assert!(matches!(
            Keybinding::new(vec![]),
            Err(KeymapError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_three_chords_rejected() {
        let c = Chord::key(KeyCode::KeyA);
        assert!(Keybinding::new(vec![c, c, c]).is_err());
    }

    #[test]
    fn test_single_binding() {
        let binding = Keybinding::single(Chord::new(Modifiers::CTRL, KeyCode::KeyS));
        assert!(!binding.is_chord());
        assert_eq!(binding.dispatch_chords(), vec![Some("ctrl+KeyS".to_string())]);
    }

    #[test]
    fn test_from_number() {
        let ctrl_k = Chord::new(Modifiers::CTRL, KeyCode::KeyK).to_number(OS);
        let ctrl_s = Chord::new(Modifiers::CTRL, KeyCode::KeyS).to_number(OS);

        let single = Keybinding::from_number(u32::from(ctrl_k), OS).unwrap();
        assert_eq!(single.chords().len(), 1);

        let pair = Keybinding::from_number(chord_pair(ctrl_k, ctrl_s), OS).unwrap();
        assert!(pair.is_chord());
        assert_eq!(pair.label(OS), "Ctrl+K Ctrl+S");
        assert_eq!(pair.to_number(OS), chord_pair(ctrl_k, ctrl_s));

        assert_eq!(Keybinding::from_number(0, OS), None);
    }

    #[test]
    fn test_dispatch_chords_marks_modifiers() {
        let binding = Keybinding::new(vec![
            Chord::new(Modifiers::CTRL, KeyCode::KeyK),
            Chord::new(Modifiers::SHIFT, KeyCode::Shift),
        ])
        .unwrap();
        assert_eq!(
            binding.dispatch_chords(),
            vec![Some("ctrl+KeyK".to_string()), None]
        );
    }
}
