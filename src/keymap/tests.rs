//! Integration tests for the keymap system

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::json;

use super::*;
use crate::config::KeybindingConfig;
use crate::context_key::{ConstantTable, Expr};

/// Sample keymap shipped with the repository
const SAMPLE_KEYMAP_YAML: &str = include_str!("../../samples/keymap.yaml");

const LINUX: OperatingSystem = OperatingSystem::Linux;

fn service_for(os: OperatingSystem) -> (KeybindingService, PendingCommands) {
    let config = KeybindingConfig {
        platform: Some(os),
        ..KeybindingConfig::default()
    };
    let (queue, pending) = command_channel();
    (KeybindingService::new(&config, queue), pending)
}

fn packed(text: &str, os: OperatingSystem) -> u32 {
    parse_keybinding(text, os).unwrap().to_number(os)
}

fn item(key: &str, command: &str) -> ResolvedKeybindingItem {
    ResolvedKeybindingItem::new(
        Some(parse_keybinding(key, LINUX).unwrap()),
        Some(command.to_string()),
        None,
        None,
        true,
    )
}

fn chords(key: &str) -> Vec<String> {
    parse_keybinding(key, LINUX)
        .unwrap()
        .dispatch_chords()
        .into_iter()
        .map(Option::unwrap)
        .collect()
}

#[test]
fn test_sample_keymap_parses() {
    let keymap = parse_keymap_yaml(SAMPLE_KEYMAP_YAML, LINUX)
        .expect("samples/keymap.yaml should parse successfully");

    assert!(!keymap.rules.is_empty(), "Should have rules");
    assert!(keymap.rules.iter().any(|r| r.id == "files.save"));
    assert!(keymap.rules.iter().any(|r| r.id == "files.saveAll"));
    assert_eq!(keymap.overrides.len(), 2);
}

#[test]
fn test_sample_keymap_override_rebinds_rename() {
    let keymap = parse_keymap_yaml(SAMPLE_KEYMAP_YAML, LINUX).unwrap();
    let (mut service, _pending) = service_for(LINUX);
    for rule in keymap.rules {
        service.register_keybinding_rule(rule);
    }
    service.set_user_keybindings(keymap.overrides);

    let kb = service.lookup_keybinding("editor.rename", None).unwrap();
    assert_eq!(kb.label(LINUX), "Shift+F6");
    assert!(service.lookup_keybinding("no.such.command", None).is_none());
}

// ============================================================================
// Dispatch
// ============================================================================

#[test]
fn test_single_chord_command_runs_once() {
    for os in [OperatingSystem::Linux, OperatingSystem::Macintosh] {
        let (mut service, pending) = service_for(os);
        service.register_keybinding_rule(
            KeybindingRule::new("demo.say", KeybindingWeight::EDITOR_CORE)
                .primary(packed("cmd+c", os))
                .args(json!({ "text": "hello" })),
        );

        let event = if os.is_mac() {
            KeyEvent::new("KeyC").meta()
        } else {
            KeyEvent::new("KeyC").ctrl()
        };
        assert!(service.dispatch(&event, None, Instant::now()));

        let ran = pending.drain();
        assert_eq!(ran.len(), 1);
        assert_eq!(ran[0].id, "demo.say");
        assert_eq!(ran[0].args, Some(json!({ "text": "hello" })));
    }
}

#[test]
fn test_platform_override_rule() {
    for os in [OperatingSystem::Windows, OperatingSystem::Linux, OperatingSystem::Macintosh] {
        let (mut service, pending) = service_for(os);
        service.register_keybinding_rule(
            KeybindingRule::new("demo.say", 0)
                .primary(packed("ctrl+c", os))
                .mac(PlatformKeybindings::new(packed("meta+c", os))),
        );
        let ctrl_c = KeyEvent::new("KeyC").ctrl();
        let meta_c = KeyEvent::new("KeyC").meta();
        let (bound, unbound) = if os.is_mac() {
            (meta_c, ctrl_c)
        } else {
            (ctrl_c, meta_c)
        };

        assert!(service.dispatch(&bound, None, Instant::now()));
        assert_eq!(pending.drain().len(), 1);
        assert!(!service.dispatch(&unbound, None, Instant::now()));
        assert!(pending.drain().is_empty());
    }
}

#[test]
fn test_registry_handlers_run_when_host_drains() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut commands = CommandsRegistry::new();
    let (mut service, pending) = service_for(LINUX);

    let recorded = Rc::clone(&calls);
    service.register_command_and_keybinding_rule(
        &mut commands,
        KeybindingRule::new("demo.say", 0)
            .primary(packed("ctrl+c", LINUX))
            .args(json!("hi")),
        move |args| {
            recorded.borrow_mut().push(args.cloned());
            Ok(())
        },
    );
    assert!(commands.has_command("demo.say"));

    // Dispatch only posts; the handler has not run when it returns
    assert!(service.dispatch(&KeyEvent::new("KeyC").ctrl(), None, Instant::now()));
    assert!(calls.borrow().is_empty());

    assert_eq!(pending.run_pending(&commands), 1);
    assert_eq!(calls.borrow().as_slice(), &[Some(json!("hi"))]);
    assert_eq!(pending.run_pending(&commands), 0);
}

#[test]
fn test_chord_sequence_and_timeout() {
    let (mut service, pending) = service_for(LINUX);
    service.register_keybinding_rule(
        KeybindingRule::new("files.saveAll", 0).primary(packed("ctrl+KeyK ctrl+KeyS", LINUX)),
    );
    let start = Instant::now();
    let ctrl_k = KeyEvent::new("KeyK").ctrl();
    let ctrl_s = KeyEvent::new("KeyS").ctrl();

    // ctrl+K, ctrl+S within the timeout
    assert!(service.dispatch(&ctrl_k, None, start));
    assert_eq!(service.state(), DispatchState::AwaitingChord);
    assert!(pending.drain().is_empty());
    assert!(service.dispatch(&ctrl_s, None, start + Duration::from_millis(100)));
    assert_eq!(service.state(), DispatchState::Idle);
    let ran = pending.drain();
    assert_eq!(ran.len(), 1);
    assert_eq!(ran[0].id, "files.saveAll");

    // ctrl+K, then the timer fires before ctrl+S
    assert!(service.dispatch(&ctrl_k, None, start));
    assert!(service.poll(start + Duration::from_millis(5500), true));
    assert_eq!(service.state(), DispatchState::Idle);
    assert!(!service.dispatch(&ctrl_s, None, start + Duration::from_millis(5600)));
    assert!(pending.drain().is_empty());
}

#[test]
fn test_stale_chord_expires_on_next_key() {
    let (mut service, pending) = service_for(LINUX);
    service.register_keybinding_rule(
        KeybindingRule::new("files.saveAll", 0).primary(packed("ctrl+KeyK ctrl+KeyS", LINUX)),
    );
    let start = Instant::now();

    service.dispatch(&KeyEvent::new("KeyK").ctrl(), None, start);
    // No poll happened; the late second chord starts from scratch
    assert!(!service.dispatch(
        &KeyEvent::new("KeyS").ctrl(),
        None,
        start + Duration::from_secs(6)
    ));
    assert!(pending.drain().is_empty());
}

#[test]
fn test_when_clause_uses_focused_scope() {
    let (mut service, pending) = service_for(LINUX);
    service.register_keybinding_rule(
        KeybindingRule::new("editor.undo", 0)
            .primary(packed("ctrl+z", LINUX))
            .when(Expr::has("editorFocus")),
    );

    let editor = ScopeHandle(7);
    let id = service.contexts_mut().create_scoped(editor, None).unwrap();
    service
        .contexts_mut()
        .set_value(id, "editorFocus", json!(true))
        .unwrap();

    let ctrl_z = KeyEvent::new("KeyZ").ctrl();
    assert!(!service.dispatch(&ctrl_z, None, Instant::now()));
    assert!(service.dispatch(&ctrl_z, Some(editor), Instant::now()));
    assert_eq!(pending.drain().len(), 1);

    // Unknown scope handles fall back to the root context
    assert!(!service.dispatch(&ctrl_z, Some(ScopeHandle(99)), Instant::now()));
}

#[test]
fn test_platform_constants_fold_when_clauses() {
    let (mut service, pending) = service_for(OperatingSystem::Macintosh);
    service.register_keybinding_rule(
        KeybindingRule::new("mac.only", 0)
            .primary(packed("cmd+KeyM", OperatingSystem::Macintosh))
            .when(Expr::has("isMac")),
    );
    assert!(service.dispatch(&KeyEvent::new("KeyM").meta(), None, Instant::now()));
    assert_eq!(pending.drain()[0].id, "mac.only");

    service.constants_mut().set("isMac", false);
    assert!(!service.dispatch(&KeyEvent::new("KeyM").meta(), None, Instant::now()));
}

#[test]
fn test_disposed_rule_no_longer_resolves() {
    let (mut service, _pending) = service_for(LINUX);
    let handle = service.register_keybinding_rule(
        KeybindingRule::new("a", 0).primary(packed("ctrl+KeyA", LINUX)),
    );
    let event = KeyEvent::new("KeyA").ctrl();
    assert!(service.soft_dispatch(&event, None).is_some_and(|r| matches!(r, ResolutionResult::KbFound { .. })));

    service.dispose_rule(handle).unwrap();
    assert_eq!(
        service.soft_dispatch(&event, None),
        Some(ResolutionResult::NoMatchingKb)
    );
    assert!(matches!(
        service.dispose_rule(handle),
        Err(KeymapError::IllegalState(_))
    ));
}

// ============================================================================
// Resolver
// ============================================================================

#[test]
fn test_prefix_law() {
    let resolver = KeybindingResolver::new(
        vec![item("ctrl+k ctrl+s", "saveAll"), item("ctrl+k ctrl+t", "theme")],
        Vec::new(),
        &ConstantTable::new(),
    );
    let ctx = serde_json::Map::new();

    assert_eq!(
        resolver.resolve(&ctx, &[], "ctrl+KeyK"),
        ResolutionResult::MoreChordsNeeded
    );
    assert_eq!(
        resolver.resolve(&ctx, &chords("ctrl+k"), "ctrl+KeyT"),
        ResolutionResult::KbFound {
            command_id: Some("theme".to_string()),
            command_args: None,
            is_bubble: false,
        }
    );
    assert_eq!(
        resolver.resolve(&ctx, &chords("ctrl+k"), "ctrl+KeyX"),
        ResolutionResult::NoMatchingKb
    );
}

#[test]
fn test_later_item_wins_ties() {
    let mut registry = KeybindingsRegistry::new(LINUX);
    let key = packed("ctrl+KeyA", LINUX);
    registry.register_keybinding_rule(KeybindingRule::new("heavy", 200).primary(key));
    registry.register_keybinding_rule(KeybindingRule::new("light", 0).primary(key));

    let defaults = registry
        .default_keybindings()
        .iter()
        .map(|i| ResolvedKeybindingItem::from_item(i, true))
        .collect();
    let resolver = KeybindingResolver::new(defaults, Vec::new(), &ConstantTable::new());
    let result = resolver.resolve(&serde_json::Map::new(), &[], "ctrl+KeyA");
    assert!(matches!(
        result,
        ResolutionResult::KbFound { command_id: Some(ref id), .. } if id == "heavy"
    ));
}

#[test]
fn test_removal_targets_matching_default() {
    let defaults = vec![item("ctrl+KeyA", "a"), item("ctrl+KeyB", "a")];
    let overrides = vec![ResolvedKeybindingItem::new(
        Some(parse_keybinding("ctrl+KeyA", LINUX).unwrap()),
        Some("-a".to_string()),
        None,
        None,
        false,
    )];
    let resolver = KeybindingResolver::new(defaults, overrides, &ConstantTable::new());

    let ctx = serde_json::Map::new();
    assert_eq!(
        resolver.resolve(&ctx, &[], "ctrl+KeyA"),
        ResolutionResult::NoMatchingKb
    );
    assert!(matches!(
        resolver.resolve(&ctx, &[], "ctrl+KeyB"),
        ResolutionResult::KbFound { .. }
    ));
    assert_eq!(resolver.lookup_keybindings("a").len(), 1);
}

#[test]
fn test_bubble_prefix_stripped() {
    let resolver = KeybindingResolver::new(
        vec![item("escape", "^closeQuickOpen")],
        Vec::new(),
        &ConstantTable::new(),
    );
    assert_eq!(
        resolver.resolve(&serde_json::Map::new(), &[], "Escape"),
        ResolutionResult::KbFound {
            command_id: Some("closeQuickOpen".to_string()),
            command_args: None,
            is_bubble: true,
        }
    );
}

fn resolved_args(resolver: &KeybindingResolver, keypress: &str) -> Option<serde_json::Value> {
    match resolver.resolve(&serde_json::Map::new(), &[], keypress) {
        ResolutionResult::KbFound { command_args, .. } => command_args,
        _ => None,
    }
}

fn resolver_for(registry: &KeybindingsRegistry) -> KeybindingResolver {
    let defaults = registry
        .default_keybindings()
        .iter()
        .map(|i| ResolvedKeybindingItem::from_item(i, true))
        .collect();
    KeybindingResolver::new(defaults, Vec::new(), &ConstantTable::new())
}

#[test]
fn test_primary_outranks_secondary_at_equal_weight() {
    let key = packed("ctrl+e", LINUX);
    let as_secondary = KeybindingRule::new("edit", 0)
        .primary(packed("ctrl+f", LINUX))
        .secondary(key)
        .args(json!("secondary"));
    let as_primary = KeybindingRule::new("edit", 0)
        .primary(key)
        .args(json!("primary"));

    // Same outcome whichever rule is registered first
    for rules in [
        [as_secondary.clone(), as_primary.clone()],
        [as_primary, as_secondary],
    ] {
        let mut registry = KeybindingsRegistry::new(LINUX);
        for rule in rules {
            registry.register_keybinding_rule(rule);
        }
        let weights: Vec<i32> = registry
            .default_keybindings()
            .iter()
            .filter(|i| i.keybinding.as_ref().map(|kb| kb.to_number(LINUX)) == Some(key))
            .map(|i| i.weight2)
            .collect();
        assert_eq!(weights, vec![-1, 0]);
        assert_eq!(
            resolved_args(&resolver_for(&registry), "ctrl+KeyE"),
            Some(json!("primary"))
        );
    }
}

#[test]
fn test_equal_items_resolve_to_the_later_one() {
    let kb = || Some(parse_keybinding("ctrl+e", LINUX).unwrap());
    let earlier = ResolvedKeybindingItem::new(kb(), Some("edit".into()), Some(json!(1)), None, true);
    let later = ResolvedKeybindingItem::new(kb(), Some("edit".into()), Some(json!(2)), None, true);

    let resolver = KeybindingResolver::new(
        vec![earlier.clone(), later.clone()],
        Vec::new(),
        &ConstantTable::new(),
    );
    assert_eq!(resolved_args(&resolver, "ctrl+KeyE"), Some(json!(2)));

    let resolver = KeybindingResolver::new(vec![later, earlier], Vec::new(), &ConstantTable::new());
    assert_eq!(resolved_args(&resolver, "ctrl+KeyE"), Some(json!(1)));
}
