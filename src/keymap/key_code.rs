//! Physical key codes
//!
//! A fixed physical-key model: every key has a stable `u8` value (used in the
//! packed chord encoding) and a canonical name taken from the DOM
//! `KeyboardEvent.code` vocabulary (used in dispatch strings).

macro_rules! key_codes {
    ($($variant:ident = $value:literal => $name:literal,)*) => {
        /// A physical key, independent of keyboard layout
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum KeyCode {
            $($variant = $value,)*
        }

        impl KeyCode {
            /// Every key code in value order
            pub const ALL: &'static [KeyCode] = &[$(KeyCode::$variant,)*];

            /// Canonical (DOM `code`) name
            pub const fn name(self) -> &'static str {
                match self {
                    $(KeyCode::$variant => $name,)*
                }
            }

            /// Decode the low byte of a packed chord
            pub fn from_u8(value: u8) -> Option<KeyCode> {
                match value {
                    $($value => Some(KeyCode::$variant),)*
                    _ => None,
                }
            }

            /// Exact canonical-name lookup
            pub fn from_name(name: &str) -> Option<KeyCode> {
                match name {
                    $($name => Some(KeyCode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

key_codes! {
    Unknown = 0 => "Unknown",
    Backspace = 1 => "Backspace",
    Tab = 2 => "Tab",
    Enter = 3 => "Enter",
    Shift = 4 => "Shift",
    Ctrl = 5 => "Control",
    Alt = 6 => "Alt",
    PauseBreak = 7 => "Pause",
    CapsLock = 8 => "CapsLock",
    Escape = 9 => "Escape",
    Space = 10 => "Space",
    PageUp = 11 => "PageUp",
    PageDown = 12 => "PageDown",
    End = 13 => "End",
    Home = 14 => "Home",
    ArrowLeft = 15 => "ArrowLeft",
    ArrowUp = 16 => "ArrowUp",
    ArrowRight = 17 => "ArrowRight",
    ArrowDown = 18 => "ArrowDown",
    Insert = 19 => "Insert",
    Delete = 20 => "Delete",
    Digit0 = 21 => "Digit0",
    Digit1 = 22 => "Digit1",
    Digit2 = 23 => "Digit2",
    Digit3 = 24 => "Digit3",
    Digit4 = 25 => "Digit4",
    Digit5 = 26 => "Digit5",
    Digit6 = 27 => "Digit6",
    Digit7 = 28 => "Digit7",
    Digit8 = 29 => "Digit8",
    Digit9 = 30 => "Digit9",
    KeyA = 31 => "KeyA",
    KeyB = 32 => "KeyB",
    KeyC = 33 => "KeyC",
    KeyD = 34 => "KeyD",
    KeyE = 35 => "KeyE",
    KeyF = 36 => "KeyF",
    KeyG = 37 => "KeyG",
    KeyH = 38 => "KeyH",
    KeyI = 39 => "KeyI",
    KeyJ = 40 => "KeyJ",
    KeyK = 41 => "KeyK",
    KeyL = 42 => "KeyL",
    KeyM = 43 => "KeyM",
    KeyN = 44 => "KeyN",
    KeyO = 45 => "KeyO",
    KeyP = 46 => "KeyP",
    KeyQ = 47 => "KeyQ",
    KeyR = 48 => "KeyR",
    KeyS = 49 => "KeyS",
    KeyT = 50 => "KeyT",
    KeyU = 51 => "KeyU",
    KeyV = 52 => "KeyV",
    KeyW = 53 => "KeyW",
    KeyX = 54 => "KeyX",
    KeyY = 55 => "KeyY",
    KeyZ = 56 => "KeyZ",
    Meta = 57 => "Meta",
    ContextMenu = 58 => "ContextMenu",
    F1 = 59 => "F1",
    F2 = 60 => "F2",
    F3 = 61 => "F3",
    F4 = 62 => "F4",
    F5 = 63 => "F5",
    F6 = 64 => "F6",
    F7 = 65 => "F7",
    F8 = 66 => "F8",
    F9 = 67 => "F9",
    F10 = 68 => "F10",
    F11 = 69 => "F11",
    F12 = 70 => "F12",
    F13 = 71 => "F13",
    F14 = 72 => "F14",
    F15 = 73 => "F15",
    F16 = 74 => "F16",
    F17 = 75 => "F17",
    F18 = 76 => "F18",
    F19 = 77 => "F19",
    F20 = 78 => "F20",
    F21 = 79 => "F21",
    F22 = 80 => "F22",
    F23 = 81 => "F23",
    F24 = 82 => "F24",
    NumLock = 83 => "NumLock",
    ScrollLock = 84 => "ScrollLock",
    Semicolon = 85 => "Semicolon",
    Equal = 86 => "Equal",
    Comma = 87 => "Comma",
    Minus = 88 => "Minus",
    Period = 89 => "Period",
    Slash = 90 => "Slash",
    Backquote = 91 => "Backquote",
    BracketLeft = 92 => "BracketLeft",
    Backslash = 93 => "Backslash",
    BracketRight = 94 => "BracketRight",
    Quote = 95 => "Quote",
    IntlBackslash = 96 => "IntlBackslash",
    Numpad0 = 97 => "Numpad0",
    Numpad1 = 98 => "Numpad1",
    Numpad2 = 99 => "Numpad2",
    Numpad3 = 100 => "Numpad3",
    Numpad4 = 101 => "Numpad4",
    Numpad5 = 102 => "Numpad5",
    Numpad6 = 103 => "Numpad6",
    Numpad7 = 104 => "Numpad7",
    Numpad8 = 105 => "Numpad8",
    Numpad9 = 106 => "Numpad9",
    NumpadMultiply = 107 => "NumpadMultiply",
    NumpadAdd = 108 => "NumpadAdd",
    NumpadSubtract = 109 => "NumpadSubtract",
    NumpadDecimal = 110 => "NumpadDecimal",
    NumpadDivide = 111 => "NumpadDivide",
    NumpadEnter = 112 => "NumpadEnter",
}

impl KeyCode {
    /// Map a host `KeyboardEvent.code`; sided modifier codes collapse to the plain modifier
    pub fn from_code(code: &str) -> KeyCode {
        match code {
            "ShiftLeft" | "ShiftRight" => KeyCode::Shift,
            "ControlLeft" | "ControlRight" => KeyCode::Ctrl,
            "AltLeft" | "AltRight" => KeyCode::Alt,
            "MetaLeft" | "MetaRight" | "OSLeft" | "OSRight" => KeyCode::Meta,
            other => KeyCode::from_name(other).unwrap_or(KeyCode::Unknown),
        }
    }

    /// Lenient lookup for key strings written by people: canonical names in
    /// any case plus short aliases (`a`, `1`, `esc`, `up`, `;`, ...)
    pub fn from_name_loose(name: &str) -> Option<KeyCode> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(key) = KeyCode::from_char(c) {
                return Some(key);
            }
        }

        let lower = name.to_ascii_lowercase();
        let alias = match lower.as_str() {
            "esc" => Some(KeyCode::Escape),
            "return" => Some(KeyCode::Enter),
            "del" => Some(KeyCode::Delete),
            "ins" => Some(KeyCode::Insert),
            "pgup" => Some(KeyCode::PageUp),
            "pgdn" | "pgdown" => Some(KeyCode::PageDown),
            "up" => Some(KeyCode::ArrowUp),
            "down" => Some(KeyCode::ArrowDown),
            "left" => Some(KeyCode::ArrowLeft),
            "right" => Some(KeyCode::ArrowRight),
            "pause" | "pausebreak" => Some(KeyCode::PauseBreak),
            "menu" => Some(KeyCode::ContextMenu),
            "ctrl" => Some(KeyCode::Ctrl),
            _ => None,
        };
        alias.or_else(|| {
            KeyCode::ALL
                .iter()
                .copied()
                .find(|key| *key != KeyCode::Unknown && key.name().eq_ignore_ascii_case(name))
        })
    }

    /// Key producing `c` on a US layout without shift
    pub fn from_char(c: char) -> Option<KeyCode> {
        let c = c.to_ascii_lowercase();
        match c {
            'a'..='z' => KeyCode::from_u8(KeyCode::KeyA as u8 + (c as u8 - b'a')),
            '0'..='9' => KeyCode::from_u8(KeyCode::Digit0 as u8 + (c as u8 - b'0')),
            ';' => Some(KeyCode::Semicolon),
            '=' => Some(KeyCode::Equal),
            ',' => Some(KeyCode::Comma),
            '-' => Some(KeyCode::Minus),
            '.' => Some(KeyCode::Period),
            '/' => Some(KeyCode::Slash),
            '`' => Some(KeyCode::Backquote),
            '[' => Some(KeyCode::BracketLeft),
            '\\' => Some(KeyCode::Backslash),
            ']' => Some(KeyCode::BracketRight),
            '\'' => Some(KeyCode::Quote),
            _ => None,
        }
    }

    /// Shift, Control, Alt or Meta
    pub const fn is_modifier(self) -> bool {
        matches!(
            self,
            KeyCode::Shift | KeyCode::Ctrl | KeyCode::Alt | KeyCode::Meta
        )
    }

    /// Short human label (`K`, `1`, `Esc`, `↑`)
    pub fn label(self) -> &'static str {
        match self {
            KeyCode::ArrowUp => "↑",
            KeyCode::ArrowDown => "↓",
            KeyCode::ArrowLeft => "←",
            KeyCode::ArrowRight => "→",
            KeyCode::Escape => "Escape",
            KeyCode::Semicolon => ";",
            KeyCode::Equal => "=",
            KeyCode::Comma => ",",
            KeyCode::Minus => "-",
            KeyCode::Period => ".",
            KeyCode::Slash => "/",
            KeyCode::Backquote => "`",
            KeyCode::BracketLeft => "[",
            KeyCode::Backslash => "\\",
            KeyCode::BracketRight => "]",
            KeyCode::Quote => "'",
            other => {
                let name = other.name();
                name.strip_prefix("Key")
                    .or_else(|| name.strip_prefix("Digit"))
                    .unwrap_or(name)
            }
        }
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
