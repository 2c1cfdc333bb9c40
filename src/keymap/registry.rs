//! Registry of default keybinding rules
//!
//! Rules are declared with packed keybinding numbers per platform and expanded
//! into [`KeybindingItem`]s for the registry's operating system.

use std::cell::OnceCell;
use std::collections::HashSet;

use serde_json::Value;

use crate::context_key::Expr;

use super::binding::Keybinding;
use super::error::KeymapError;
use super::key_code::KeyCode;
use super::types::{Chord, OperatingSystem};

/// Standard rule weights; later (heavier) rules win ties in resolution
pub struct KeybindingWeight;

impl KeybindingWeight {
    pub const EDITOR_CORE: i32 = 0;
    pub const EDITOR_CONTRIB: i32 = 100;
    pub const WORKBENCH_CONTRIB: i32 = 200;
    pub const BUILTIN_EXTENSION: i32 = 300;
    pub const EXTERNAL_EXTENSION: i32 = 400;
}

/// Platform override of a rule's keybindings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformKeybindings {
    pub primary: Option<u32>,
    pub secondary: Vec<u32>,
}

impl PlatformKeybindings {
    pub fn new(primary: u32) -> Self {
        Self {
            primary: Some(primary),
            secondary: Vec::new(),
        }
    }
}

/// A keybinding rule as declared by a contributor
#[derive(Debug, Clone, PartialEq)]
pub struct KeybindingRule {
    pub id: String,
    pub weight: i32,
    pub args: Option<Value>,
    pub when: Option<Expr>,
    pub primary: Option<u32>,
    pub secondary: Vec<u32>,
    pub win: Option<PlatformKeybindings>,
    pub mac: Option<PlatformKeybindings>,
    pub linux: Option<PlatformKeybindings>,
}

impl KeybindingRule {
    pub fn new(id: impl Into<String>, weight: i32) -> Self {
        Self {
            id: id.into(),
            weight,
            args: None,
            when: None,
            primary: None,
            secondary: Vec::new(),
            win: None,
            mac: None,
            linux: None,
        }
    }

    pub fn primary(mut self, packed: u32) -> Self {
        self.primary = Some(packed);
        self
    }

    pub fn secondary(mut self, packed: u32) -> Self {
        self.secondary.push(packed);
        self
    }

    pub fn when(mut self, when: Expr) -> Self {
        self.when = Some(when);
        self
    }

    pub fn args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn win(mut self, keybindings: PlatformKeybindings) -> Self {
        self.win = Some(keybindings);
        self
    }

    pub fn mac(mut self, keybindings: PlatformKeybindings) -> Self {
        self.mac = Some(keybindings);
        self
    }

    pub fn linux(mut self, keybindings: PlatformKeybindings) -> Self {
        self.linux = Some(keybindings);
        self
    }

    /// Primary and secondary encodings that apply on `os`
    fn platform_keybindings(&self, os: OperatingSystem) -> (Option<u32>, &[u32]) {
        let platform = match os {
            OperatingSystem::Windows => self.win.as_ref(),
            OperatingSystem::Macintosh => self.mac.as_ref(),
            OperatingSystem::Linux => self.linux.as_ref(),
        };
        match platform {
            Some(p) => (p.primary, &p.secondary),
            None => (self.primary, &self.secondary),
        }
    }
}

/// One chord sequence bound to a command
#[derive(Debug, Clone, PartialEq)]
pub struct KeybindingItem {
    /// `None` only for override entries that match every chord sequence
    pub keybinding: Option<Keybinding>,
    /// May carry a `^` (bubble) or `-` (removal) prefix
    pub command: Option<String>,
    pub command_args: Option<Value>,
    pub when: Option<Expr>,
    pub weight1: i32,
    pub weight2: i32,
}

impl KeybindingItem {
    pub fn new(keybinding: Option<Keybinding>, command: impl Into<String>) -> Self {
        Self {
            keybinding,
            command: Some(command.into()),
            command_args: None,
            when: None,
            weight1: 0,
            weight2: 0,
        }
    }

    pub fn when(mut self, when: Expr) -> Self {
        self.when = Some(when);
        self
    }

    pub fn args(mut self, args: Value) -> Self {
        self.command_args = Some(args);
        self
    }
}

/// Handle returned by [`KeybindingsRegistry::register_keybinding_rule`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleHandle(u64);

#[derive(Debug)]
pub struct KeybindingsRegistry {
    os: OperatingSystem,
    items: Vec<(RuleHandle, KeybindingItem)>,
    live: HashSet<RuleHandle>,
    next_handle: u64,
    cache: OnceCell<Vec<KeybindingItem>>,
}

impl KeybindingsRegistry {
    pub fn new(os: OperatingSystem) -> Self {
        Self {
            os,
            items: Vec::new(),
            live: HashSet::new(),
            next_handle: 1,
            cache: OnceCell::new(),
        }
    }

    pub fn os(&self) -> OperatingSystem {
        self.os
    }

    /// Expand `rule` for this registry's platform and register its items
    pub fn register_keybinding_rule(&mut self, rule: KeybindingRule) -> RuleHandle {
        let handle = RuleHandle(self.next_handle);
        self.next_handle += 1;
        self.live.insert(handle);

        let (primary, secondary) = rule.platform_keybindings(self.os);
        let encodings: Vec<(u32, i32)> = primary
            .into_iter()
            .map(|p| (p, 0))
            .chain(
                secondary
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (*s, -(i as i32) - 1)),
            )
            .collect();

        let mut registered = 0;
        for (packed, weight2) in encodings {
            let Some(keybinding) = Keybinding::from_number(packed, self.os) else {
                continue;
            };
            if self.os == OperatingSystem::Windows {
                warn_if_alt_gr_conflict(&rule.id, &keybinding);
            }
            self.items.push((
                handle,
                KeybindingItem {
                    keybinding: Some(keybinding),
                    command: Some(rule.id.clone()),
                    command_args: rule.args.clone(),
                    when: rule.when.clone(),
                    weight1: rule.weight,
                    weight2,
                },
            ));
            registered += 1;
        }

        tracing::debug!(
            target: "chordmap::registry",
            command = %rule.id,
            items = registered,
            "registered keybinding rule"
        );
        self.cache = OnceCell::new();
        handle
    }

    /// Remove every item `handle` produced; a second dispose is an error
    pub fn dispose(&mut self, handle: RuleHandle) -> Result<(), KeymapError> {
        if !self.live.remove(&handle) {
            return Err(KeymapError::IllegalState(format!(
                "keybinding rule {} was already disposed",
                handle.0
            )));
        }
        self.items.retain(|(owner, _)| *owner != handle);
        self.cache = OnceCell::new();
        Ok(())
    }

    /// All items sorted by weight, command, then secondary weight
    pub fn default_keybindings(&self) -> Vec<KeybindingItem> {
        self.cache
            .get_or_init(|| {
                let mut items: Vec<KeybindingItem> =
                    self.items.iter().map(|(_, item)| item.clone()).collect();
                items.sort_by(|a, b| {
                    a.weight1
                        .cmp(&b.weight1)
                        .then_with(|| a.command.cmp(&b.command))
                        .then_with(|| a.weight2.cmp(&b.weight2))
                });
                items
            })
            .clone()
    }
}

/// Ctrl+Alt is AltGr on many Windows layouts and may be needed to type characters
fn warn_if_alt_gr_conflict(command: &str, keybinding: &Keybinding) {
    for chord in keybinding.chords() {
        if chord.mods.ctrl() && chord.mods.alt() && !chord.mods.meta() && produces_character(chord)
        {
            tracing::warn!(
                target: "chordmap::registry",
                command,
                chord = %chord,
                "Ctrl+Alt keybindings should not be used by default under Windows"
            );
        }
    }
}

fn produces_character(chord: &Chord) -> bool {
    let key = chord.key as u8;
    (KeyCode::Digit0 as u8..=KeyCode::KeyZ as u8).contains(&key)
        || (KeyCode::Semicolon as u8..=KeyCode::IntlBackslash as u8).contains(&key)
}
