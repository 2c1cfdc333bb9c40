//! Command-line argument parsing for the chordmap developer tool
//!
//! Supports:
//! - Normalizing `when` clauses and showing parse diagnostics
//! - Evaluating a clause against `--set key=value` pairs
//! - Checking implication between two clauses
//! - Simulating dispatch of a chord sequence against a keymap file

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};

use crate::config::KeybindingConfig;
use crate::config_paths::ConfigPaths;
use crate::keymap::{
    command_channel, parse_chord, DispatchState, KeyEvent, KeybindingService, Keymap,
    KeymapError, OperatingSystem, ResolutionResult,
};

/// Context-key expressions and chord keybinding resolution
#[derive(Parser, Debug)]
#[command(name = "chordmap", version, about = "Inspect when clauses and keymaps")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Parse a when clause and print its normalized form
    Parse {
        #[arg(value_name = "EXPR")]
        expression: String,
    },

    /// Evaluate a when clause against context values
    Eval {
        #[arg(value_name = "EXPR")]
        expression: String,

        /// Context value; VALUE is read as JSON, or as a string if that fails
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Check whether every context satisfying P also satisfies Q
    Implies {
        #[arg(value_name = "P")]
        premise: String,

        #[arg(value_name = "Q")]
        conclusion: String,
    },

    /// Simulate pressing a chord sequence against a keymap file
    Resolve {
        /// Keymap YAML file; defaults to the user keymap in the config directory
        #[arg(long, value_name = "FILE")]
        keymap: Option<PathBuf>,

        /// Platform whose modifier conventions apply
        #[arg(long, value_name = "OS")]
        platform: Option<OperatingSystem>,

        /// Root context value; VALUE is read as JSON, or as a string if that fails
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Chords to press in order, e.g. `ctrl+k ctrl+s`
        #[arg(value_name = "CHORDS", required = true)]
        chords: Vec<String>,
    },
}

/// The keymap `resolve` should load
pub fn keymap_path(
    explicit: Option<PathBuf>,
    paths: Option<&ConfigPaths>,
) -> Result<PathBuf, KeymapError> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let paths = paths.ok_or_else(|| {
        KeymapError::InvalidArgument(
            "no --keymap given and no config directory available".to_string(),
        )
    })?;
    paths.keymap_to_load(None).ok_or_else(|| {
        KeymapError::InvalidArgument(format!(
            "no --keymap given and {} does not exist",
            paths.keymap_file().display()
        ))
    })
}

/// Split `key=value`; the value is JSON when it parses as JSON
pub fn parse_assignment(text: &str) -> Result<(String, Value), String> {
    let (key, raw) = text
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", text))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", text));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Build a flat context from `--set` pairs; later pairs win
pub fn context_from_assignments(pairs: &[String]) -> Result<Map<String, Value>, String> {
    let mut context = Map::new();
    for pair in pairs {
        let (key, value) = parse_assignment(pair)?;
        context.insert(key, value);
    }
    Ok(context)
}

/// One simulated key press
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedPress {
    pub label: String,
    pub result: ResolutionResult,
    pub handled: bool,
    /// Commands the dispatcher invoked for this press
    pub invoked: Vec<String>,
    pub status: Option<String>,
}

/// Feed `chords` to a fresh dispatcher loaded with `keymap`
pub fn simulate(
    keymap: Keymap,
    config: &KeybindingConfig,
    context: Map<String, Value>,
    chords: &[String],
) -> Result<Vec<SimulatedPress>, KeymapError> {
    let (queue, pending) = command_channel();
    let mut service = KeybindingService::new(config, queue);
    let os = service.os();

    for rule in keymap.rules {
        service.register_keybinding_rule(rule);
    }
    service.set_user_keybindings(keymap.overrides);

    let root = service.contexts().root();
    for (key, value) in context {
        service
            .contexts_mut()
            .set_value(root, &key, value)
            .map_err(|e| KeymapError::InvalidArgument(e.to_string()))?;
    }

    let mut presses = Vec::with_capacity(chords.len());
    for text in chords {
        let chord = parse_chord(text, os)?;
        let event = KeyEvent::from_chord(chord);
        let now = Instant::now();
        let Some(result) = service.soft_dispatch(&event, None) else {
            return Err(KeymapError::InvalidKey(format!(
                "'{}' cannot be dispatched on its own",
                text
            )));
        };
        let handled = service.dispatch(&event, None, now);
        presses.push(SimulatedPress {
            label: chord.label(os),
            result,
            handled,
            invoked: pending.drain().into_iter().map(|c| c.id).collect(),
            status: service.status_message().map(str::to_string),
        });
    }

    if service.state() == DispatchState::AwaitingChord {
        tracing::debug!("simulation ended in chord mode");
    }
    Ok(presses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::parse_keymap_yaml;
    use serde_json::json;

    const YAML: &str = r#"
bindings:
  - key: "ctrl+k ctrl+s"
    command: files.saveAll
  - key: "ctrl+s"
    command: files.save
    when: "editorFocus"
"#;

    fn config() -> KeybindingConfig {
        KeybindingConfig {
            platform: Some(OperatingSystem::Linux),
            ..KeybindingConfig::default()
        }
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("a=3").unwrap(), ("a".to_string(), json!(3)));
        assert_eq!(
            parse_assignment("b=[1,2,3]").unwrap(),
            ("b".to_string(), json!([1, 2, 3]))
        );
        assert_eq!(
            parse_assignment("mode=vim").unwrap(),
            ("mode".to_string(), json!("vim"))
        );
        assert_eq!(parse_assignment("empty=").unwrap().1, json!(""));
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_later_assignment_wins() {
        let context =
            context_from_assignments(&["a=1".to_string(), "a=true".to_string()]).unwrap();
        assert_eq!(context.get("a"), Some(&json!(true)));
    }

    #[test]
    fn test_cli_parses_resolve() {
        let args = CliArgs::try_parse_from([
            "chordmap",
            "resolve",
            "--keymap",
            "keymap.yaml",
            "--platform",
            "mac",
            "--set",
            "editorFocus=true",
            "cmd+k",
            "cmd+s",
        ])
        .unwrap();
        let CliCommand::Resolve {
            platform, chords, set, ..
        } = args.command
        else {
            panic!("expected resolve");
        };
        assert_eq!(platform, Some(OperatingSystem::Macintosh));
        assert_eq!(chords, vec!["cmd+k", "cmd+s"]);
        assert_eq!(set, vec!["editorFocus=true"]);
    }

    #[test]
    fn test_keymap_path_falls_back_to_user_keymap() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::at(dir.path());
        let explicit = PathBuf::from("mine.yaml");

        assert_eq!(keymap_path(Some(explicit.clone()), None).unwrap(), explicit);
        assert!(matches!(
            keymap_path(None, Some(&paths)),
            Err(KeymapError::InvalidArgument(_))
        ));
        assert!(keymap_path(None, None).is_err());

        std::fs::write(paths.keymap_file(), YAML).unwrap();
        assert_eq!(keymap_path(None, Some(&paths)).unwrap(), paths.keymap_file());
    }

    #[test]
    fn test_resolve_keymap_flag_is_optional() {
        let args = CliArgs::try_parse_from(["chordmap", "resolve", "ctrl+k"]).unwrap();
        assert!(matches!(args.command, CliCommand::Resolve { keymap: None, .. }));
    }

    #[test]
    fn test_simulate_chord_sequence() {
        let keymap = parse_keymap_yaml(YAML, OperatingSystem::Linux).unwrap();
        let presses = simulate(
            keymap,
            &config(),
            Map::new(),
            &["ctrl+k".to_string(), "ctrl+s".to_string()],
        )
        .unwrap();

        assert_eq!(presses.len(), 2);
        assert_eq!(presses[0].result, ResolutionResult::MoreChordsNeeded);
        assert!(presses[0].handled);
        assert!(presses[0].status.is_some());
        assert_eq!(presses[1].invoked, vec!["files.saveAll"]);
        assert_eq!(presses[1].label, "Ctrl+S");
    }

    #[test]
    fn test_simulate_uses_context() {
        let keymap = parse_keymap_yaml(YAML, OperatingSystem::Linux).unwrap();
        let chords = ["ctrl+s".to_string()];

        let unfocused = simulate(keymap.clone(), &config(), Map::new(), &chords).unwrap();
        assert!(!unfocused[0].handled);

        let context = context_from_assignments(&["editorFocus=true".to_string()]).unwrap();
        let focused = simulate(keymap, &config(), context, &chords).unwrap();
        assert_eq!(focused[0].invoked, vec!["files.save"]);
    }
}
