//! chordmap - context-key expressions and chord keybinding resolution
//!
//! This crate provides the pieces an editor needs to route key presses to
//! commands: a `when` clause language evaluated against a context tree, a
//! registry of weighted keybinding rules, and a dispatcher with chord mode.

pub mod cli;
pub mod config;
pub mod config_paths;
pub mod context_key;
pub mod keymap;
pub mod tracing;

// Re-export commonly used types
pub use config::KeybindingConfig;
pub use context_key::{Context, Expr, Parser};
pub use keymap::{KeyEvent, KeybindingService, ResolutionResult};
