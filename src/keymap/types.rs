//! Core types for the keymap system: Modifiers, Chord, OperatingSystem

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::key_code::KeyCode;

/// Platform whose modifier conventions apply
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystem {
    #[serde(alias = "win")]
    Windows,
    #[serde(alias = "mac", alias = "macos")]
    Macintosh,
    Linux,
}

impl OperatingSystem {
    /// The platform this binary was compiled for
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            OperatingSystem::Macintosh
        } else if cfg!(target_os = "windows") {
            OperatingSystem::Windows
        } else {
            OperatingSystem::Linux
        }
    }

    pub const fn is_mac(self) -> bool {
        matches!(self, OperatingSystem::Macintosh)
    }
}

impl Default for OperatingSystem {
    fn default() -> Self {
        Self::current()
    }
}

impl FromStr for OperatingSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" | "win" => Ok(OperatingSystem::Windows),
            "macintosh" | "mac" | "macos" => Ok(OperatingSystem::Macintosh),
            "linux" => Ok(OperatingSystem::Linux),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingSystem::Windows => "windows",
            OperatingSystem::Macintosh => "macintosh",
            OperatingSystem::Linux => "linux",
        })
    }
}

/// Modifier keys as a bitfield for efficient storage and comparison
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const CTRL: Modifiers = Modifiers(0b0001);
    pub const SHIFT: Modifiers = Modifiers(0b0010);
    pub const ALT: Modifiers = Modifiers(0b0100);
    pub const META: Modifiers = Modifiers(0b1000); // Cmd on macOS, Win/Super elsewhere

    /// Create modifiers from individual flags
    pub const fn new(ctrl: bool, shift: bool, alt: bool, meta: bool) -> Self {
        let mut bits = 0u8;
        if ctrl {
            bits |= Self::CTRL.0;
        }
        if shift {
            bits |= Self::SHIFT.0;
        }
        if alt {
            bits |= Self::ALT.0;
        }
        if meta {
            bits |= Self::META.0;
        }
        Modifiers(bits)
    }

    #[inline]
    pub const fn ctrl(self) -> bool {
        self.0 & Self::CTRL.0 != 0
    }

    #[inline]
    pub const fn shift(self) -> bool {
        self.0 & Self::SHIFT.0 != 0
    }

    /// Alt / Option
    #[inline]
    pub const fn alt(self) -> bool {
        self.0 & Self::ALT.0 != 0
    }

    /// Cmd / Win / Super
    #[inline]
    pub const fn meta(self) -> bool {
        self.0 & Self::META.0 != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Combine two modifier sets
    #[inline]
    pub const fn union(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    /// Check if this contains all modifiers in other
    #[inline]
    pub const fn contains(self, other: Modifiers) -> bool {
        (self.0 & other.0) == other.0
    }

    /// The platform "command" modifier (Cmd on macOS, Ctrl elsewhere)
    pub const fn command(os: OperatingSystem) -> Modifiers {
        if os.is_mac() {
            Modifiers::META
        } else {
            Modifiers::CTRL
        }
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

// Packed chord layout (u16): bits 0-7 key code, then modifier flags
const CTRL_CMD: u16 = 1 << 11;
const SHIFT: u16 = 1 << 10;
const ALT: u16 = 1 << 9;
const WIN_CTRL: u16 = 1 << 8;
const KEY_CODE_MASK: u16 = 0x00ff;

/// A single key press with modifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chord {
    pub mods: Modifiers,
    pub key: KeyCode,
}

impl Chord {
    pub const fn new(mods: Modifiers, key: KeyCode) -> Self {
        Self { mods, key }
    }

    /// A chord with no modifiers
    pub const fn key(key: KeyCode) -> Self {
        Self {
            mods: Modifiers::NONE,
            key,
        }
    }

    /// Decode a packed chord; on macOS the ctrl/cmd bit means meta and the
    /// win/ctrl bit means ctrl
    pub fn from_number(packed: u16, os: OperatingSystem) -> Self {
        let ctrl_cmd = packed & CTRL_CMD != 0;
        let win_ctrl = packed & WIN_CTRL != 0;
        let (ctrl, meta) = if os.is_mac() {
            (win_ctrl, ctrl_cmd)
        } else {
            (ctrl_cmd, win_ctrl)
        };
        let key = KeyCode::from_u8((packed & KEY_CODE_MASK) as u8).unwrap_or(KeyCode::Unknown);
        Self {
            mods: Modifiers::new(ctrl, packed & SHIFT != 0, packed & ALT != 0, meta),
            key,
        }
    }

    /// Inverse of [`Chord::from_number`] for the same `os`
    pub fn to_number(&self, os: OperatingSystem) -> u16 {
        let (ctrl_cmd, win_ctrl) = if os.is_mac() {
            (self.mods.meta(), self.mods.ctrl())
        } else {
            (self.mods.ctrl(), self.mods.meta())
        };
        let mut packed = self.key as u16;
        if ctrl_cmd {
            packed |= CTRL_CMD;
        }
        if self.mods.shift() {
            packed |= SHIFT;
        }
        if self.mods.alt() {
            packed |= ALT;
        }
        if win_ctrl {
            packed |= WIN_CTRL;
        }
        packed
    }

    /// Whether this chord is only a modifier key (or an unknown key)
    pub fn is_modifier_only(&self) -> bool {
        self.key.is_modifier() || self.key == KeyCode::Unknown
    }

    /// The string the resolver indexes on, e.g. `ctrl+shift+KeyP`
    ///
    /// Pure modifier chords and unknown keys cannot be dispatched.
    pub fn dispatch_str(&self) -> Option<String> {
        if self.is_modifier_only() {
            return None;
        }
        let mut out = String::new();
        if self.mods.ctrl() {
            out.push_str("ctrl+");
        }
        if self.mods.shift() {
            out.push_str("shift+");
        }
        if self.mods.alt() {
            out.push_str("alt+");
        }
        if self.mods.meta() {
            out.push_str("meta+");
        }
        out.push_str(self.key.name());
        Some(out)
    }

    /// User-facing label using platform conventions
    pub fn label(&self, os: OperatingSystem) -> String {
        let mut parts = String::new();

        if os.is_mac() {
            // macOS uses symbols: ⌃ ⌥ ⇧ ⌘
            if self.mods.ctrl() {
                parts.push('⌃');
            }
            if self.mods.alt() {
                parts.push('⌥');
            }
            if self.mods.shift() {
                parts.push('⇧');
            }
            if self.mods.meta() {
                parts.push('⌘');
            }
        } else {
            if self.mods.ctrl() {
                parts.push_str("Ctrl+");
            }
            if self.mods.shift() {
                parts.push_str("Shift+");
            }
            if self.mods.alt() {
                parts.push_str("Alt+");
            }
            if self.mods.meta() {
                parts.push_str(match os {
                    OperatingSystem::Windows => "Win+",
                    _ => "Super+",
                });
            }
        }

        parts.push_str(self.key.label());
        parts
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dispatch_str() {
            Some(s) => f.write_str(&s),
            None => f.write_str(self.key.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OS: [OperatingSystem; 3] = [
        OperatingSystem::Windows,
        OperatingSystem::Macintosh,
        OperatingSystem::Linux,
    ];

    #[test]
    fn test_modifiers_empty() {
        let mods = Modifiers::NONE;
        assert!(mods.is_empty());
        assert!(!mods.ctrl());
        assert!(!mods.shift());
        assert!(!mods.alt());
        assert!(!mods.meta());
    }

    #[test]
    fn test_modifiers_combined() {
        let mods = Modifiers::CTRL | Modifiers::SHIFT;
        assert!(mods.ctrl());
        assert!(mods.shift());
        assert!(!mods.alt());
        assert!(mods.contains(Modifiers::CTRL));
        assert!(!mods.contains(Modifiers::ALT));
    }

    #[test]
    fn test_command_modifier_per_platform() {
        assert_eq!(Modifiers::command(OperatingSystem::Macintosh), Modifiers::META);
        assert_eq!(Modifiers::command(OperatingSystem::Linux), Modifiers::CTRL);
    }

    #[test]
    fn test_packed_round_trip_every_os() {
        let chord = Chord::new(Modifiers::CTRL | Modifiers::ALT | Modifiers::META, KeyCode::KeyK);
        for os in ALL_OS {
            assert_eq!(Chord::from_number(chord.to_number(os), os), chord);
        }
    }

    #[test]
    fn test_mac_swaps_ctrl_cmd() {
        let packed = CTRL_CMD | KeyCode::KeyC as u16;
        let mac = Chord::from_number(packed, OperatingSystem::Macintosh);
        assert!(mac.mods.meta());
        assert!(!mac.mods.ctrl());
        let linux = Chord::from_number(packed, OperatingSystem::Linux);
        assert!(linux.mods.ctrl());
        assert!(!linux.mods.meta());

        let win_ctrl = Chord::from_number(WIN_CTRL | KeyCode::KeyC as u16, OperatingSystem::Macintosh);
        assert!(win_ctrl.mods.ctrl());
    }

    #[test]
    fn test_dispatch_str_modifier_order() {
        let chord = Chord::new(
            Modifiers::META | Modifiers::ALT | Modifiers::SHIFT | Modifiers::CTRL,
            KeyCode::KeyP,
        );
        assert_eq!(chord.dispatch_str().as_deref(), Some("ctrl+shift+alt+meta+KeyP"));
        assert_eq!(Chord::key(KeyCode::Escape).dispatch_str().as_deref(), Some("Escape"));
    }

    #[test]
    fn test_pure_modifier_has_no_dispatch_str() {
        assert_eq!(Chord::new(Modifiers::CTRL, KeyCode::Ctrl).dispatch_str(), None);
        assert_eq!(Chord::key(KeyCode::Unknown).dispatch_str(), None);
    }

    #[test]
    fn test_labels() {
        let chord = Chord::new(Modifiers::CTRL | Modifiers::SHIFT, KeyCode::KeyS);
        assert_eq!(chord.label(OperatingSystem::Linux), "Ctrl+Shift+S");
        let cmd_k = Chord::new(Modifiers::META, KeyCode::KeyK);
        assert_eq!(cmd_k.label(OperatingSystem::Macintosh), "⌘K");
        assert_eq!(cmd_k.label(OperatingSystem::Windows), "Win+K");
    }

    #[test]
    fn test_os_from_str() {
        assert_eq!("mac".parse(), Ok(OperatingSystem::Macintosh));
        assert_eq!("Windows".parse(), Ok(OperatingSystem::Windows));
        assert!("beos".parse::<OperatingSystem>().is_err());
    }
}
