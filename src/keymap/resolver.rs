//! Keybinding resolution: chord sequences + context → command
//!
//! The resolver is an immutable snapshot built from the default items and the
//! user overrides. It indexes items by their first chord and, when a key is
//! pressed, picks the last registered item whose chord prefix matches and whose
//! `when` clause holds.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::context_key::{
    expressions_equal_with_constant_substitution, implies, ConstantTable, Context, Expr,
};

use super::binding::Keybinding;
use super::registry::KeybindingItem;

/// A keybinding item prepared for resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedKeybindingItem {
    pub keybinding: Option<Keybinding>,
    /// Dispatch strings; empty if any chord cannot be dispatched
    pub chords: Vec<String>,
    /// Let the key event continue to the host after running the command
    pub bubble: bool,
    /// Command id without the `^` prefix; a `-` prefix marks a removal
    pub command: Option<String>,
    pub command_args: Option<Value>,
    pub when: Option<Expr>,
    pub is_default: bool,
}

impl ResolvedKeybindingItem {
    pub fn new(
        keybinding: Option<Keybinding>,
        command: Option<String>,
        command_args: Option<Value>,
        when: Option<Expr>,
        is_default: bool,
    ) -> Self {
        let chords = keybinding
            .as_ref()
            .and_then(|kb| kb.dispatch_chords().into_iter().collect::<Option<Vec<_>>>())
            .unwrap_or_default();
        let (command, bubble) = match command {
            Some(cmd) => match cmd.strip_prefix('^') {
                Some(stripped) => (Some(stripped.to_string()), true),
                None => (Some(cmd), false),
            },
            None => (None, false),
        };
        Self {
            keybinding,
            chords,
            bubble,
            command,
            command_args,
            when,
            is_default,
        }
    }

    pub fn from_item(item: &KeybindingItem, is_default: bool) -> Self {
        Self::new(
            item.keybinding.clone(),
            item.command.clone(),
            item.command_args.clone(),
            item.when.clone(),
            is_default,
        )
    }

    /// Entry of the form `-command` that unbinds a default
    pub fn is_removal(&self) -> bool {
        self.command.as_deref().is_some_and(|c| c.starts_with('-'))
    }
}

/// Outcome of feeding one chord to the resolver
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    NoMatchingKb,
    MoreChordsNeeded,
    KbFound {
        /// `None` for items bound to nothing (they swallow the key)
        command_id: Option<String>,
        command_args: Option<Value>,
        is_bubble: bool,
    },
}

#[derive(Debug, Default)]
pub struct KeybindingResolver {
    defaults: Vec<ResolvedKeybindingItem>,
    keybindings: Vec<ResolvedKeybindingItem>,
    /// first chord → indices into `keybindings`, in registration order
    map: HashMap<String, Vec<usize>>,
    /// command → indices into `keybindings`, shadowed items removed
    lookup: HashMap<String, Vec<usize>>,
}

impl KeybindingResolver {
    pub fn new(
        defaults: Vec<ResolvedKeybindingItem>,
        overrides: Vec<ResolvedKeybindingItem>,
        constants: &ConstantTable,
    ) -> Self {
        let all: Vec<ResolvedKeybindingItem> =
            defaults.iter().cloned().chain(overrides).collect();
        let keybindings: Vec<ResolvedKeybindingItem> = handle_removals(all, constants)
            .into_iter()
            .map(|mut item| {
                item.when = item
                    .when
                    .map(|w| w.substitute_constants(constants))
                    .filter(|w| *w != Expr::True);
                item
            })
            .collect();

        let mut resolver = Self {
            defaults,
            keybindings,
            map: HashMap::new(),
            lookup: HashMap::new(),
        };

        for index in 0..resolver.keybindings.len() {
            let item = &resolver.keybindings[index];
            if item.chords.is_empty() {
                continue;
            }
            if item.when == Some(Expr::False) {
                continue;
            }
            resolver.add_key_press(index);
        }

        tracing::debug!(
            target: "chordmap::resolver",
            items = resolver.keybindings.len(),
            first_chords = resolver.map.len(),
            "keybinding resolver built"
        );
        resolver
    }

    fn add_key_press(&mut self, index: usize) {
        let first = self.keybindings[index].chords[0].clone();
        let Some(conflicts) = self.map.get(&first).cloned() else {
            self.map.insert(first, vec![index]);
            self.add_to_lookup_map(index);
            return;
        };

        for &conflict_index in conflicts.iter().rev() {
            let conflict = &self.keybindings[conflict_index];
            let item = &self.keybindings[index];
            if conflict.command == item.command {
                continue;
            }
            // The shorter sequence must be a prefix of the longer one
            let is_prefix = conflict
                .chords
                .iter()
                .zip(&item.chords)
                .skip(1)
                .all(|(a, b)| a == b);
            if !is_prefix {
                continue;
            }
            if when_is_entirely_included(conflict.when.as_ref(), item.when.as_ref()) {
                self.remove_from_lookup_map(conflict_index);
            }
        }

        if let Some(bucket) = self.map.get_mut(&first) {
            bucket.push(index);
        }
        self.add_to_lookup_map(index);
    }

    fn add_to_lookup_map(&mut self, index: usize) {
        if let Some(command) = &self.keybindings[index].command {
            self.lookup.entry(command.clone()).or_default().push(index);
        }
    }

    fn remove_from_lookup_map(&mut self, index: usize) {
        let Some(command) = &self.keybindings[index].command else {
            return;
        };
        if let Some(indices) = self.lookup.get_mut(command) {
            indices.retain(|i| *i != index);
        }
    }

    /// Resolve `keypress` given the chords already pressed in chord mode
    pub fn resolve<C: Context + ?Sized>(
        &self,
        context: &C,
        current_chords: &[String],
        keypress: &str,
    ) -> ResolutionResult {
        let mut pressed: Vec<&str> = current_chords.iter().map(String::as_str).collect();
        pressed.push(keypress);
        tracing::trace!(target: "chordmap::resolver", chords = ?pressed, "resolving");

        let Some(bucket) = self.map.get(pressed[0]) else {
            tracing::trace!(target: "chordmap::resolver", first = pressed[0], "no keybinding starts with this chord");
            return ResolutionResult::NoMatchingKb;
        };

        let candidates: Vec<&ResolvedKeybindingItem> = bucket
            .iter()
            .map(|&i| &self.keybindings[i])
            .filter(|item| {
                pressed.len() == 1
                    || (item.chords.len() >= pressed.len()
                        && item.chords[1..pressed.len()]
                            .iter()
                            .zip(&pressed[1..])
                            .all(|(a, b)| a.as_str() == *b))
            })
            .collect();

        let Some(found) = candidates
            .into_iter()
            .rev()
            .find(|item| item.when.as_ref().map_or(true, |w| w.evaluate(context)))
        else {
            tracing::trace!(target: "chordmap::resolver", "no candidate matches the context");
            return ResolutionResult::NoMatchingKb;
        };

        if found.chords.len() > pressed.len() {
            tracing::trace!(
                target: "chordmap::resolver",
                command = ?found.command,
                "more chords needed"
            );
            return ResolutionResult::MoreChordsNeeded;
        }

        tracing::trace!(
            target: "chordmap::resolver",
            command = ?found.command,
            bubble = found.bubble,
            "keybinding found"
        );
        ResolutionResult::KbFound {
            command_id: found.command.clone(),
            command_args: found.command_args.clone(),
            is_bubble: found.bubble,
        }
    }

    /// Default items as given, before removals
    pub fn default_keybindings(&self) -> &[ResolvedKeybindingItem] {
        &self.defaults
    }

    /// Defaults plus overrides with removals applied
    pub fn keybindings(&self) -> &[ResolvedKeybindingItem] {
        &self.keybindings
    }

    /// Every command that has a default binding
    pub fn default_bound_commands(&self) -> BTreeSet<String> {
        self.defaults
            .iter()
            .filter(|item| !item.is_removal())
            .filter_map(|item| item.command.clone())
            .collect()
    }

    /// Items bound to `command`, most recently registered first
    pub fn lookup_keybindings(&self, command: &str) -> Vec<&ResolvedKeybindingItem> {
        self.lookup
            .get(command)
            .map(|indices| indices.iter().rev().map(|&i| &self.keybindings[i]).collect())
            .unwrap_or_default()
    }

    /// The binding to show for `command`; prefers one whose `when` holds in `context`
    pub fn lookup_primary_keybinding(
        &self,
        command: &str,
        context: Option<&dyn Context>,
    ) -> Option<&ResolvedKeybindingItem> {
        let indices = self.lookup.get(command)?;
        let last = indices.last().map(|&i| &self.keybindings[i])?;
        let Some(context) = context else {
            return Some(last);
        };
        if indices.len() == 1 {
            return Some(last);
        }
        indices
            .iter()
            .rev()
            .map(|&i| &self.keybindings[i])
            .find(|item| item.when.as_ref().map_or(true, |w| w.evaluate(context)))
            .or(Some(last))
    }
}

/// `true` if every context satisfying `a` also satisfies `b`; absent means `true`
pub fn when_is_entirely_included(a: Option<&Expr>, b: Option<&Expr>) -> bool {
    match (a, b) {
        (_, None) | (_, Some(Expr::True)) => true,
        (None, _) | (Some(Expr::True), _) => false,
        (Some(a), Some(b)) => implies(a, b),
    }
}

/// Drop `-command` entries and the default items they target
pub fn handle_removals(
    items: Vec<ResolvedKeybindingItem>,
    constants: &ConstantTable,
) -> Vec<ResolvedKeybindingItem> {
    let mut removals: HashMap<String, Vec<ResolvedKeybindingItem>> = HashMap::new();
    for item in items.iter().filter(|i| i.is_removal()) {
        if let Some(command) = item.command.as_deref() {
            removals
                .entry(command[1..].to_string())
                .or_default()
                .push(item.clone());
        }
    }
    if removals.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| {
            let Some(command) = item.command.as_deref() else {
                return true;
            };
            if item.is_removal() {
                return false;
            }
            let Some(command_removals) = removals.get(command) else {
                return true;
            };
            if !item.is_default {
                return true;
            }
            let removed = command_removals
                .iter()
                .any(|removal| is_targeted_for_removal(item, removal, constants));
            if removed {
                tracing::debug!(target: "chordmap::resolver", command, chords = ?item.chords, "default keybinding removed");
            }
            !removed
        })
        .collect()
}

fn is_targeted_for_removal(
    default: &ResolvedKeybindingItem,
    removal: &ResolvedKeybindingItem,
    constants: &ConstantTable,
) -> bool {
    let chords_match = removal
        .chords
        .iter()
        .enumerate()
        .all(|(i, chord)| default.chords.get(i) == Some(chord));
    if !chords_match {
        return false;
    }
    match removal.when.as_ref() {
        None | Some(Expr::True) => true,
        Some(when) => {
            default.when.is_some()
                && expressions_equal_with_constant_substitution(
                    Some(when),
                    default.when.as_ref(),
                    constants,
                )
        }
    }
}
