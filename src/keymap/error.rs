//! Errors raised by the keymap system

use thiserror::Error;

/// Errors that can occur when building, registering or loading keybindings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeymapError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Illegal state: {0}")]
    IllegalState(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Invalid when clause '{expression}': {message}")]
    InvalidWhen { expression: String, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(String),
}
