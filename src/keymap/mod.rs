//! Chord keybinding system
//!
//! This module turns key presses into command invocations:
//! - Rules are registered with packed per-platform keybindings and weights
//! - User overrides can rebind, unbind (`-command`) or bubble (`^command`)
//! - `when` clauses are evaluated against a hierarchical context tree
//! - Two-chord sequences enter chord mode with a timeout
//!
//! # Architecture
//!
//! ```text
//! KeyEvent → Chord → KeybindingService::dispatch()
//!                       │  KeybindingResolver::resolve(context, chords)
//!                       ▼
//!                 CommandQueue::post(id, args)
//!                       │  host loop
//!                       ▼
//!                 PendingCommands::run_pending(&CommandsRegistry)
//! ```
//!
//! # Loading Keymaps
//!
//! ```ignore
//! let keymap = load_keymap_file(Path::new("keymap.yaml"), OperatingSystem::current())?;
//! for rule in keymap.rules {
//!     service.register_keybinding_rule(rule);
//! }
//! service.set_user_keybindings(keymap.overrides);
//! ```

mod binding;
mod command;
mod config;
mod context;
mod dispatch;
mod error;
mod event;
mod key_code;
mod registry;
mod resolver;
mod types;

pub use binding::{chord_pair, Keybinding, MAX_CHORDS};
pub use command::{
    command_channel, CommandError, CommandInvocation, CommandQueue, CommandService,
    CommandsRegistry, PendingCommands,
};
pub use config::{
    load_keymap_file, parse_chord, parse_keybinding, parse_keymap_yaml, BindingConfig, Keymap,
    KeymapConfig, OverrideConfig,
};
pub use context::{
    ContextError, ContextId, ContextKeyService, ContextRef, RawContextKey, ScopeHandle,
    CONTEXT_ID_KEY,
};
pub use dispatch::{platform_constants, DispatchState, KeybindingService};
pub use error::KeymapError;
pub use event::KeyEvent;
pub use key_code::KeyCode;
pub use registry::{
    KeybindingItem, KeybindingRule, KeybindingWeight, KeybindingsRegistry, PlatformKeybindings,
    RuleHandle,
};
pub use resolver::{
    handle_removals, when_is_entirely_included, KeybindingResolver, ResolutionResult,
    ResolvedKeybindingItem,
};
pub use types::{Chord, Modifiers, OperatingSystem};

#[cfg(test)]
mod tests;
