//! YAML configuration parsing for keymaps
//!
//! A keymap file declares default rules and user overrides:
//!
//! ```yaml
//! bindings:
//!   - key: "ctrl+k ctrl+s"
//!     command: workbench.action.files.saveAll
//!     when: "editorFocus && !inputFocus"
//!     mac: "cmd+k cmd+s"
//!   - key: "f2"
//!     command: editor.rename
//!     weight: 100
//!     secondary: ["shift+f6"]
//!     args: { inline: true }
//! overrides:
//!   - command: "-editor.rename"
//!     key: "f2"
//! ```

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::context_key::{Expr, Parser};

use super::binding::Keybinding;
use super::error::KeymapError;
use super::key_code::KeyCode;
use super::registry::{KeybindingItem, KeybindingRule, PlatformKeybindings};
use super::types::{Chord, Modifiers, OperatingSystem};

/// Root structure of a keymap YAML file
#[derive(Debug, Deserialize)]
pub struct KeymapConfig {
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
    #[serde(default)]
    pub overrides: Vec<OverrideConfig>,
}

/// A default rule entry from YAML
#[derive(Debug, Deserialize)]
pub struct BindingConfig {
    #[serde(default)]
    pub key: Option<String>,
    pub command: String,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
    #[serde(default)]
    pub weight: i32,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub win: Option<String>,
    #[serde(default)]
    pub linux: Option<String>,
}

/// A user override entry; `-command` removes matching defaults
#[derive(Debug, Deserialize)]
pub struct OverrideConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
}

/// Parsed keymap: rules for the registry plus override items for the resolver
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Keymap {
    pub rules: Vec<KeybindingRule>,
    pub overrides: Vec<KeybindingItem>,
}

/// Load a keymap from a YAML file
pub fn load_keymap_file(path: &Path, os: OperatingSystem) -> Result<Keymap, KeymapError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| KeymapError::Io(format!("{}: {}", path.display(), e)))?;
    let keymap = parse_keymap_yaml(&content, os)?;
    tracing::info!(
        target: "chordmap::config",
        rules = keymap.rules.len(),
        overrides = keymap.overrides.len(),
        "Loaded keymap from {}",
        path.display()
    );
    Ok(keymap)
}

/// Parse a keymap from a YAML string; chord numbers are packed for `os`
pub fn parse_keymap_yaml(yaml: &str, os: OperatingSystem) -> Result<Keymap, KeymapError> {
    let config: KeymapConfig =
        serde_yaml::from_str(yaml).map_err(|e| KeymapError::Parse(e.to_string()))?;

    let mut keymap = Keymap::default();

    for entry in config.bindings {
        let mut rule = KeybindingRule::new(entry.command, entry.weight);
        if let Some(key) = &entry.key {
            rule = rule.primary(parse_keybinding(key, os)?.to_number(os));
        }
        for key in &entry.secondary {
            rule = rule.secondary(parse_keybinding(key, os)?.to_number(os));
        }
        if let Some(when) = parse_when(entry.when.as_deref())? {
            rule = rule.when(when);
        }
        if let Some(args) = entry.args {
            rule = rule.args(args);
        }
        if let Some(key) = &entry.mac {
            rule = rule.mac(platform_keybindings(key, os)?);
        }
        if let Some(key) = &entry.win {
            rule = rule.win(platform_keybindings(key, os)?);
        }
        if let Some(key) = &entry.linux {
            rule = rule.linux(platform_keybindings(key, os)?);
        }
        keymap.rules.push(rule);
    }

    for entry in config.overrides {
        let keybinding = match entry.key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Some(parse_keybinding(key, os)?),
            _ => None,
        };
        keymap.overrides.push(KeybindingItem {
            keybinding,
            command: entry.command,
            command_args: entry.args,
            when: parse_when(entry.when.as_deref())?,
            weight1: 0,
            weight2: 0,
        });
    }

    Ok(keymap)
}

fn platform_keybindings(key: &str, os: OperatingSystem) -> Result<PlatformKeybindings, KeymapError> {
    Ok(PlatformKeybindings::new(parse_keybinding(key, os)?.to_number(os)))
}

/// Parse a `when` clause; a blank clause means "always"
fn parse_when(when: Option<&str>) -> Result<Option<Expr>, KeymapError> {
    let Some(text) = when.filter(|w| !w.trim().is_empty()) else {
        return Ok(None);
    };
    let mut parser = Parser::new();
    match parser.parse(text) {
        Some(expr) => Ok(Some(expr)),
        None => {
            let message = parser
                .errors()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(KeymapError::InvalidWhen {
                expression: text.to_string(),
                message,
            })
        }
    }
}

/// Parse a space-separated chord sequence like `"ctrl+k ctrl+s"`
pub fn parse_keybinding(text: &str, os: OperatingSystem) -> Result<Keybinding, KeymapError> {
    let chords = text
        .split_whitespace()
        .map(|part| parse_chord(part, os))
        .collect::<Result<Vec<_>, _>>()?;
    if chords.is_empty() {
        return Err(KeymapError::InvalidKey(format!("empty key string '{}'", text)));
    }
    Keybinding::new(chords)
}

/// Parse a key string like `"cmd+shift+KeyS"` into a chord
pub fn parse_chord(text: &str, os: OperatingSystem) -> Result<Chord, KeymapError> {
    let mut mods = Modifiers::NONE;
    let mut key = None;

    for part in text.split('+') {
        if part.is_empty() {
            return Err(KeymapError::InvalidKey(format!("empty segment in '{}'", text)));
        }
        match part.to_ascii_lowercase().as_str() {
            // Platform command key
            "cmd" => mods = mods | Modifiers::command(os),
            "ctrl" | "control" => mods = mods | Modifiers::CTRL,
            "shift" => mods = mods | Modifiers::SHIFT,
            "alt" | "option" | "opt" => mods = mods | Modifiers::ALT,
            "meta" | "super" | "win" | "cmd_key" => mods = mods | Modifiers::META,
            _ => {
                if key.is_some() {
                    return Err(KeymapError::InvalidKey(format!(
                        "Multiple keys in binding: {}",
                        text
                    )));
                }
                let code = KeyCode::from_name_loose(part)
                    .filter(|code| *code != KeyCode::Unknown && !code.is_modifier())
                    .ok_or_else(|| KeymapError::InvalidKey(format!("Unknown key: {}", part)))?;
                key = Some(code);
            }
        }
    }

    let key =
        key.ok_or_else(|| KeymapError::InvalidKey(format!("No key found in binding: {}", text)))?;
    Ok(Chord::new(mods, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OS: OperatingSystem = OperatingSystem::Linux;

    #[test]
    fn test_parse_simple_key() {
        let chord = parse_chord("a", OS).unwrap();
        assert_eq!(chord.key, KeyCode::KeyA);
        assert!(chord.mods.is_empty());
    }

    #[test]
    fn test_parse_key_with_multiple_modifiers() {
        let chord = parse_chord("Ctrl+Shift+KeyP", OS).unwrap();
        assert_eq!(chord.key, KeyCode::KeyP);
        assert!(chord.mods.ctrl());
        assert!(chord.mods.shift());
        assert_eq!(chord.dispatch_str().as_deref(), Some("ctrl+shift+KeyP"));
    }

    #[test]
    fn test_parse_cmd_modifier() {
        let mac = parse_chord("cmd+s", OperatingSystem::Macintosh).unwrap();
        assert!(mac.mods.meta());
        assert!(!mac.mods.ctrl());
        let linux = parse_chord("cmd+s", OS).unwrap();
        assert!(linux.mods.ctrl());
        let meta = parse_chord("cmd_key+s", OS).unwrap();
        assert!(meta.mods.meta());
    }

    #[test]
    fn test_parse_named_key() {
        assert_eq!(parse_chord("enter", OS).unwrap().key, KeyCode::Enter);
        assert_eq!(parse_chord("esc", OS).unwrap().key, KeyCode::Escape);
        assert_eq!(parse_chord("up", OS).unwrap().key, KeyCode::ArrowUp);
        assert_eq!(parse_chord("F12", OS).unwrap().key, KeyCode::F12);
    }

    #[test]
    fn test_parse_invalid_keys() {
        assert!(matches!(parse_chord("ctrl+", OS), Err(KeymapError::InvalidKey(_))));
        assert!(matches!(parse_chord("ctrl+shift", OS), Err(KeymapError::InvalidKey(_))));
        assert!(matches!(parse_chord("a+b", OS), Err(KeymapError::InvalidKey(_))));
        assert!(matches!(parse_chord("hyper+a", OS), Err(KeymapError::InvalidKey(_))));
    }

    #[test]
    fn test_parse_chord_sequence() {
        let kb = parse_keybinding("ctrl+k ctrl+s", OS).unwrap();
        assert!(kb.is_chord());
        assert_eq!(
            kb.dispatch_chords(),
            vec![Some("ctrl+KeyK".to_string()), Some("ctrl+KeyS".to_string())]
        );
        assert!(matches!(
            parse_keybinding("a b c", OS),
            Err(KeymapError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
bindings:
  - key: "ctrl+s"
    command: files.save
    when: "editorFocus"
  - key: "ctrl+k ctrl+s"
    command: files.saveAll
    weight: 100
    secondary: ["f2"]
    args: { all: true }
"#;

        let keymap = parse_keymap_yaml(yaml, OS).unwrap();
        assert_eq!(keymap.rules.len(), 2);
        assert_eq!(keymap.rules[0].id, "files.save");
        assert_eq!(keymap.rules[0].when, Some(Expr::has("editorFocus")));
        assert_eq!(keymap.rules[1].weight, 100);
        assert_eq!(keymap.rules[1].secondary.len(), 1);
        assert_eq!(keymap.rules[1].args, Some(serde_json::json!({ "all": true })));
        assert!(keymap.overrides.is_empty());
    }

    #[test]
    fn test_parse_yaml_with_platform() {
        let yaml = r#"
bindings:
  - key: "ctrl+q"
    command: app.quit
    mac: "cmd+q"
"#;
        let keymap = parse_keymap_yaml(yaml, OperatingSystem::Macintosh).unwrap();
        let mac = keymap.rules[0].mac.as_ref().unwrap();
        let kb = Keybinding::from_number(mac.primary.unwrap(), OperatingSystem::Macintosh).unwrap();
        assert!(kb.first().mods.meta());
    }

    #[test]
    fn test_parse_overrides() {
        let yaml = r#"
overrides:
  - command: "-files.save"
    key: "ctrl+s"
  - command: "-files.saveAll"
  - key: "ctrl+s"
    command: files.saveQuietly
    when: "editorFocus && !readonly"
"#;
        let keymap = parse_keymap_yaml(yaml, OS).unwrap();
        assert_eq!(keymap.overrides.len(), 3);
        assert!(keymap.overrides[0].keybinding.is_some());
        assert!(keymap.overrides[1].keybinding.is_none());
        assert_eq!(keymap.overrides[2].command.as_deref(), Some("files.saveQuietly"));
        assert!(keymap.overrides[2].when.is_some());
    }

    #[test]
    fn test_invalid_when_clause() {
        let yaml = r#"
bindings:
  - key: "ctrl+s"
    command: files.save
    when: "a && "
"#;
        let err = parse_keymap_yaml(yaml, OS).unwrap_err();
        assert!(matches!(err, KeymapError::InvalidWhen { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            parse_keymap_yaml("bindings: [", OS),
            Err(KeymapError::Parse(_))
        ));
    }
}
