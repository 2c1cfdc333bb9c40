//! Keybinding dispatch with chord mode
//!
//! ```text
//!            MoreChordsNeeded
//!   Idle ─────────────────────▶ AwaitingChord ──┐ MoreChordsNeeded
//!    ▲                              │  ▲────────┘ (timer re-armed)
//!    │  KbFound / NoMatchingKb /    │
//!    └──── timeout / focus lost ◀───┘
//! ```
//!
//! The service owns everything resolution needs: the rule registry, user
//! overrides, the constant table, the context tree and the command service.
//! The resolver is rebuilt lazily after any of those inputs change.

use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::KeybindingConfig;
use crate::context_key::ConstantTable;

use super::binding::Keybinding;
use super::command::{CommandError, CommandQueue, CommandsRegistry};
use super::context::{ContextKeyService, ScopeHandle};
use super::error::KeymapError;
use super::event::KeyEvent;
use super::registry::{KeybindingItem, KeybindingRule, KeybindingsRegistry, RuleHandle};
use super::resolver::{KeybindingResolver, ResolutionResult, ResolvedKeybindingItem};
use super::types::OperatingSystem;

/// Chord-mode state of the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    AwaitingChord,
}

/// A chord pressed while in chord mode
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingChord {
    keypress: String,
    label: String,
}

pub struct KeybindingService {
    os: OperatingSystem,
    chord_timeout: Duration,
    poll_interval: Duration,
    trace_resolution: bool,
    registry: KeybindingsRegistry,
    user_keybindings: Vec<KeybindingItem>,
    constants: ConstantTable,
    contexts: ContextKeyService,
    commands: CommandQueue,
    resolver: Option<Rc<KeybindingResolver>>,
    current_chords: Vec<PendingChord>,
    last_chord_at: Option<Instant>,
    status: Option<String>,
}

impl std::fmt::Debug for KeybindingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeybindingService")
            .field("os", &self.os)
            .field("state", &self.state())
            .field("current_chords", &self.current_chords)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Platform constants every resolver knows about
pub fn platform_constants(os: OperatingSystem) -> ConstantTable {
    ConstantTable::new()
        .with("isMac", os == OperatingSystem::Macintosh)
        .with("isLinux", os == OperatingSystem::Linux)
        .with("isWindows", os == OperatingSystem::Windows)
}

impl KeybindingService {
    pub fn new(config: &KeybindingConfig, commands: CommandQueue) -> Self {
        let os = config.os();
        Self {
            os,
            chord_timeout: config.chord_timeout(),
            poll_interval: config.chord_poll_interval(),
            trace_resolution: config.trace_resolution,
            registry: KeybindingsRegistry::new(os),
            user_keybindings: Vec::new(),
            constants: platform_constants(os),
            contexts: ContextKeyService::new(),
            commands,
            resolver: None,
            current_chords: Vec::new(),
            last_chord_at: None,
            status: None,
        }
    }

    pub fn os(&self) -> OperatingSystem {
        self.os
    }

    /// Interval at which the host should call [`KeybindingService::poll`]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn state(&self) -> DispatchState {
        if self.current_chords.is_empty() {
            DispatchState::Idle
        } else {
            DispatchState::AwaitingChord
        }
    }

    pub fn contexts(&self) -> &ContextKeyService {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut ContextKeyService {
        &mut self.contexts
    }

    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    /// Mutable constant table; the resolver is rebuilt on next use
    pub fn constants_mut(&mut self) -> &mut ConstantTable {
        self.resolver = None;
        &mut self.constants
    }

    pub fn registry(&self) -> &KeybindingsRegistry {
        &self.registry
    }

    // ========================================================================
    // Rules
    // ========================================================================

    pub fn register_keybinding_rule(&mut self, rule: KeybindingRule) -> RuleHandle {
        let handle = self.registry.register_keybinding_rule(rule);
        self.resolver = None;
        handle
    }

    pub fn dispose_rule(&mut self, handle: RuleHandle) -> Result<(), KeymapError> {
        self.registry.dispose(handle)?;
        self.resolver = None;
        Ok(())
    }

    /// Register a command handler and its keybinding rule in one step
    pub fn register_command_and_keybinding_rule<F>(
        &mut self,
        commands: &mut CommandsRegistry,
        rule: KeybindingRule,
        handler: F,
    ) -> RuleHandle
    where
        F: Fn(Option<&Value>) -> Result<(), CommandError> + 'static,
    {
        commands.register_command(rule.id.clone(), handler);
        self.register_keybinding_rule(rule)
    }

    /// Replace the user override items (applied after the defaults)
    pub fn set_user_keybindings(&mut self, items: Vec<KeybindingItem>) {
        self.user_keybindings = items;
        self.resolver = None;
    }

    /// Current resolver snapshot, rebuilt if any input changed
    pub fn resolver(&mut self) -> Rc<KeybindingResolver> {
        if let Some(resolver) = &self.resolver {
            return Rc::clone(resolver);
        }
        let defaults = self
            .registry
            .default_keybindings()
            .iter()
            .map(|item| ResolvedKeybindingItem::from_item(item, true))
            .collect();
        let overrides = self
            .user_keybindings
            .iter()
            .map(|item| ResolvedKeybindingItem::from_item(item, false))
            .collect();
        let resolver = Rc::new(KeybindingResolver::new(defaults, overrides, &self.constants));
        self.resolver = Some(Rc::clone(&resolver));
        resolver
    }

    /// Preferred keybinding for `command` in the context of `scope`
    pub fn lookup_keybinding(
        &mut self,
        command: &str,
        scope: Option<ScopeHandle>,
    ) -> Option<Keybinding> {
        let resolver = self.resolver();
        let context = self.contexts.context(self.contexts.context_for_scope(scope));
        resolver
            .lookup_primary_keybinding(command, Some(&context))
            .and_then(|item| item.keybinding.clone())
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Handle a key event; returns whether the host should consider it consumed
    pub fn dispatch(&mut self, event: &KeyEvent, target: Option<ScopeHandle>, now: Instant) -> bool {
        let chord = event.chord();
        let Some(keypress) = chord.dispatch_str() else {
            tracing::trace!(target: "chordmap::dispatch", code = %event.code, "ignoring modifier or unknown key");
            return false;
        };

        self.expire_stale_chord(now);

        let label = chord.label(self.os);
        let result = self.resolve(&keypress, target);
        self.log(&format!("[{}] resolved to {:?}", keypress, result));

        match result {
            ResolutionResult::MoreChordsNeeded => {
                self.expect_another_chord(keypress, label, now);
                true
            }
            ResolutionResult::NoMatchingKb => self.nothing_bound(&label),
            ResolutionResult::KbFound {
                command_id: None, ..
            } => self.nothing_bound(&label),
            ResolutionResult::KbFound {
                command_id: Some(id),
                ..
            } if id.is_empty() => self.nothing_bound(&label),
            ResolutionResult::KbFound {
                command_id: Some(id),
                command_args,
                is_bubble,
            } => {
                self.leave_chord_mode();
                self.log(&format!("invoking '{}'", id));
                if let Err(err) = self.commands.post(&id, command_args.as_ref()) {
                    tracing::warn!(target: "chordmap::dispatch", command = %id, "{}", err);
                }
                !is_bubble
            }
        }
    }

    /// Resolve `event` against the current state without side effects
    pub fn soft_dispatch(
        &mut self,
        event: &KeyEvent,
        target: Option<ScopeHandle>,
    ) -> Option<ResolutionResult> {
        let keypress = event.dispatch_str()?;
        Some(self.resolve(&keypress, target))
    }

    fn resolve(&mut self, keypress: &str, target: Option<ScopeHandle>) -> ResolutionResult {
        let resolver = self.resolver();
        let current: Vec<String> = self
            .current_chords
            .iter()
            .map(|c| c.keypress.clone())
            .collect();
        let context = self.contexts.context(self.contexts.context_for_scope(target));
        resolver.resolve(&context, &current, keypress)
    }

    fn expect_another_chord(&mut self, keypress: String, label: String, now: Instant) {
        self.current_chords.push(PendingChord { keypress, label });
        self.last_chord_at = Some(now);
        let labels = self.chord_labels(", ");
        let message = if self.current_chords.len() == 1 {
            format!("({}) was pressed. Waiting for second key of chord...", labels)
        } else {
            format!("({}) was pressed. Waiting for next key of chord...", labels)
        };
        self.log(&message);
        self.status = Some(message);
    }

    /// No command for the pressed sequence; only consumed when it ends a chord
    fn nothing_bound(&mut self, label: &str) -> bool {
        if self.current_chords.is_empty() {
            return false;
        }
        let message = format!(
            "The key combination ({}, {}) is not a command.",
            self.chord_labels(", "),
            label
        );
        self.leave_chord_mode();
        self.log(&message);
        self.status = Some(message);
        true
    }

    // ========================================================================
    // Chord timer
    // ========================================================================

    /// Periodic check; leaves chord mode on focus loss or timeout.
    /// Returns whether chord mode was left.
    pub fn poll(&mut self, now: Instant, has_focus: bool) -> bool {
        if self.current_chords.is_empty() {
            return false;
        }
        if !has_focus {
            self.log("leaving chord mode: focus lost");
            self.leave_chord_mode();
            return true;
        }
        self.expire_stale_chord(now)
    }

    pub fn on_focus_lost(&mut self) {
        if !self.current_chords.is_empty() {
            self.log("leaving chord mode: focus lost");
            self.leave_chord_mode();
        }
    }

    fn expire_stale_chord(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_chord_at else {
            return false;
        };
        if now.saturating_duration_since(last) > self.chord_timeout {
            self.log("leaving chord mode: timed out");
            self.leave_chord_mode();
            return true;
        }
        false
    }

    fn leave_chord_mode(&mut self) {
        self.current_chords.clear();
        self.last_chord_at = None;
        self.status = None;
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Labels of the chords pressed so far, e.g. `Ctrl+K`
    pub fn pending_chord_display(&self) -> Option<String> {
        if self.current_chords.is_empty() {
            None
        } else {
            Some(self.chord_labels(" "))
        }
    }

    /// Latest chord-mode status text
    pub fn status_message(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn chord_labels(&self, separator: &str) -> String {
        self.current_chords
            .iter()
            .map(|c| c.label.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn log(&self, message: &str) {
        if self.trace_resolution {
            tracing::info!(target: "chordmap::dispatch", "{}", message);
        } else {
            tracing::debug!(target: "chordmap::dispatch", "{}", message);
        }
    }
}
