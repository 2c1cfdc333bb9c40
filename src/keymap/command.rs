//! Command execution boundary
//!
//! The dispatcher only knows command ids. It posts every invocation to a
//! [`CommandQueue`] and returns; the host drains the matching
//! [`PendingCommands`] on its own loop, either by hand or into a
//! [`CommandService`] such as [`CommandsRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use serde_json::Value;
use thiserror::Error;

/// A command id with its arguments, as produced by a resolved keybinding
#[derive(Debug, Clone, PartialEq)]
pub struct CommandInvocation {
    pub id: String,
    pub args: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command '{0}' not found")]
    NotFound(String),
    #[error("command '{id}' failed: {message}")]
    Failed { id: String, message: String },
    #[error("command queue is disconnected")]
    Disconnected,
}

/// Runs commands by id when the host drains pending invocations
pub trait CommandService {
    fn execute_command(&self, id: &str, args: Option<&Value>) -> Result<(), CommandError>;
}

type Handler = Box<dyn Fn(Option<&Value>) -> Result<(), CommandError>>;

/// Synchronous command table
#[derive(Default)]
pub struct CommandsRegistry {
    handlers: HashMap<String, Handler>,
}

impl CommandsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `id`; returns whether one was replaced
    pub fn register_command<F>(&mut self, id: impl Into<String>, handler: F) -> bool
    where
        F: Fn(Option<&Value>) -> Result<(), CommandError> + 'static,
    {
        self.handlers.insert(id.into(), Box::new(handler)).is_some()
    }

    pub fn unregister_command(&mut self, id: &str) -> bool {
        self.handlers.remove(id).is_some()
    }

    pub fn has_command(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    /// Registered ids, sorted
    pub fn commands(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for CommandsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandsRegistry")
            .field("commands", &self.commands())
            .finish()
    }
}

impl CommandService for CommandsRegistry {
    fn execute_command(&self, id: &str, args: Option<&Value>) -> Result<(), CommandError> {
        let handler = self
            .handlers
            .get(id)
            .ok_or_else(|| CommandError::NotFound(id.to_string()))?;
        tracing::debug!(target: "chordmap::command", command = id, "executing command");
        handler(args)
    }
}

/// Fire-and-forget command service backed by a channel
#[derive(Debug, Clone)]
pub struct CommandQueue {
    sender: Sender<CommandInvocation>,
}

/// Receiving half of a [`CommandQueue`]
#[derive(Debug)]
pub struct PendingCommands {
    receiver: Receiver<CommandInvocation>,
}

/// Create a connected queue/pending pair
pub fn command_channel() -> (CommandQueue, PendingCommands) {
    let (sender, receiver) = mpsc::channel();
    (CommandQueue { sender }, PendingCommands { receiver })
}

impl CommandQueue {
    /// Queue an invocation without running it
    pub fn post(&self, id: &str, args: Option<&Value>) -> Result<(), CommandError> {
        self.sender
            .send(CommandInvocation {
                id: id.to_string(),
                args: args.cloned(),
            })
            .map_err(|_| CommandError::Disconnected)
    }
}

impl PendingCommands {
    /// Take every queued invocation without running it
    pub fn drain(&self) -> Vec<CommandInvocation> {
        let mut drained = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(invocation) => drained.push(invocation),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }

    /// Run every queued invocation against `service`; failures are logged.
    /// Returns how many succeeded.
    pub fn run_pending(&self, service: &dyn CommandService) -> usize {
        let mut succeeded = 0;
        for invocation in self.drain() {
            match service.execute_command(&invocation.id, invocation.args.as_ref()) {
                Ok(()) => succeeded += 1,
                Err(err) => {
                    tracing::warn!(target: "chordmap::command", command = %invocation.id, "{}", err);
                }
            }
        }
        succeeded
    }
}
