//! Benchmarks for when-clause parsing and keybinding resolution
//!
//! Run with: cargo bench resolve

use std::time::Instant;

use chordmap::config::KeybindingConfig;
use chordmap::context_key::{ConstantTable, Expr, Parser};
use chordmap::keymap::{
    command_channel, parse_keybinding, KeyEvent, KeybindingItem, KeybindingResolver,
    KeybindingService, OperatingSystem, ResolvedKeybindingItem,
};
use serde_json::{json, Map, Value};

#[global_allocator]
static ALLOC: divan::AllocProfiler = divan::AllocProfiler::system();

fn main() {
    divan::main();
}

const OS: OperatingSystem = OperatingSystem::Linux;

const WHEN: &str = "editorTextFocus && !editorReadonly && (resourceExtname =~ /\\.rs$/ || editorLangId in supportedLanguages) && count >= 2";

/// `count` items over 26 first chords; every third one is a two-chord sequence
fn make_items(count: usize) -> Vec<ResolvedKeybindingItem> {
    (0..count)
        .map(|i| {
            let letter = (b'a' + (i % 26) as u8) as char;
            let key = if i % 3 == 0 {
                format!("ctrl+{} ctrl+{}", letter, (b'a' + ((i / 26) % 26) as u8) as char)
            } else {
                format!("ctrl+alt+{}", letter)
            };
            let when = Expr::deserialize(&format!("focus{} || group{}", i % 7, i % 5));
            ResolvedKeybindingItem::new(
                parse_keybinding(&key, OS).ok(),
                Some(format!("command.{}", i)),
                None,
                when,
                true,
            )
        })
        .collect()
}

fn make_context() -> Map<String, Value> {
    json!({ "focus3": true, "group1": false, "count": 4 })
        .as_object()
        .cloned()
        .unwrap_or_default()
}

// ============================================================================
// Parsing
// ============================================================================

#[divan::bench]
fn parse_when_clause() {
    let mut parser = Parser::new();
    divan::black_box(parser.parse(divan::black_box(WHEN)));
}

#[divan::bench]
fn evaluate_when_clause(bencher: divan::Bencher) {
    let expr = Expr::deserialize(WHEN).unwrap_or(Expr::False);
    let context = json!({
        "editorTextFocus": true,
        "resourceExtname": ".rs",
        "count": 3,
    })
    .as_object()
    .cloned()
    .unwrap_or_default();
    bencher.bench(|| divan::black_box(expr.evaluate(&context)));
}

#[divan::bench]
fn negate_when_clause(bencher: divan::Bencher) {
    let expr = Expr::deserialize(WHEN).unwrap_or(Expr::False);
    bencher.bench(|| divan::black_box(expr.negate()));
}

// ============================================================================
// Resolution
// ============================================================================

#[divan::bench(args = [100, 1_000, 5_000])]
fn build_resolver(bencher: divan::Bencher, count: usize) {
    let items = make_items(count);
    bencher.bench(|| {
        KeybindingResolver::new(items.clone(), Vec::new(), &ConstantTable::new())
    });
}

#[divan::bench(args = [100, 1_000, 5_000])]
fn resolve_single_chord(bencher: divan::Bencher, count: usize) {
    let resolver = KeybindingResolver::new(make_items(count), Vec::new(), &ConstantTable::new());
    let context = make_context();
    bencher.bench(|| divan::black_box(resolver.resolve(&context, &[], "ctrl+alt+KeyD")));
}

#[divan::bench(args = [100, 1_000, 5_000])]
fn resolve_second_chord(bencher: divan::Bencher, count: usize) {
    let resolver = KeybindingResolver::new(make_items(count), Vec::new(), &ConstantTable::new());
    let context = make_context();
    let pressed = vec!["ctrl+KeyD".to_string()];
    bencher.bench(|| divan::black_box(resolver.resolve(&context, &pressed, "ctrl+KeyA")));
}

#[divan::bench]
fn dispatch_with_cached_resolver(bencher: divan::Bencher) {
    let (queue, pending) = command_channel();
    let config = KeybindingConfig {
        platform: Some(OS),
        ..KeybindingConfig::default()
    };
    let mut service = KeybindingService::new(&config, queue);
    let items = (0..1_000)
        .map(|i| {
            let letter = (b'a' + (i % 26) as u8) as char;
            KeybindingItem::new(
                parse_keybinding(&format!("ctrl+alt+{}", letter), OS).ok(),
                format!("command.{}", i),
            )
        })
        .collect();
    service.set_user_keybindings(items);
    let event = KeyEvent::new("KeyD").ctrl().alt();
    bencher.bench_local(|| {
        let handled = service.dispatch(&event, None, Instant::now());
        pending.drain();
        divan::black_box(handled)
    });
}
