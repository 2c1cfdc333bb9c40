//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use std::time::Instant;

use serde_json::{Map, Value};

use chordmap::config::KeybindingConfig;
use chordmap::keymap::{
    command_channel, parse_chord, parse_keymap_yaml, KeyEvent, KeybindingService,
    OperatingSystem, PendingCommands,
};

/// Config pinned to `os` with default timings
pub fn test_config(os: OperatingSystem) -> KeybindingConfig {
    KeybindingConfig {
        platform: Some(os),
        ..KeybindingConfig::default()
    }
}

/// A dispatcher whose commands land in the returned queue
pub fn test_service(os: OperatingSystem) -> (KeybindingService, PendingCommands) {
    let (queue, pending) = command_channel();
    (
        KeybindingService::new(&test_config(os), queue),
        pending,
    )
}

/// A dispatcher loaded with the rules and overrides of `yaml`
pub fn service_with_keymap(yaml: &str, os: OperatingSystem) -> (KeybindingService, PendingCommands) {
    let keymap = parse_keymap_yaml(yaml, os).expect("test keymap should parse");
    let (mut service, pending) = test_service(os);
    for rule in keymap.rules {
        service.register_keybinding_rule(rule);
    }
    service.set_user_keybindings(keymap.overrides);
    (service, pending)
}

/// Host event for a key string such as `ctrl+k`
pub fn key_event(text: &str, os: OperatingSystem) -> KeyEvent {
    KeyEvent::from_chord(parse_chord(text, os).expect("test chord should parse"))
}

/// Dispatch `text` against the root context
pub fn press(service: &mut KeybindingService, text: &str, at: Instant) -> bool {
    let event = key_event(text, service.os());
    service.dispatch(&event, None, at)
}

/// Ids of the commands invoked since the last drain
pub fn invoked(pending: &PendingCommands) -> Vec<String> {
    pending.drain().into_iter().map(|c| c.id).collect()
}

/// Flat context from a JSON object literal
pub fn context(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
