//! Hierarchical context tree for conditional keybindings
//!
//! Each focusable part of the UI gets its own context node, bound to an
//! opaque [`ScopeHandle`] chosen by the host. Lookups walk from a node up to
//! the root, so children override their parents:
//!
//! ```text
//! root {isLinux: true}
//!  └─ editor scope {editorFocus: true, languageId: "rust"}
//!      └─ find widget scope {findWidgetVisible: true}
//! ```

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::context_key::{Context, Expr, Literal, UnquotableLiteral};

/// Reserved key holding a node's id
pub const CONTEXT_ID_KEY: &str = "_contextId";

/// Identifier of a context node; `ContextId::ROOT` always exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub const ROOT: ContextId = ContextId(0);

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Host-chosen handle for a focus target (a widget, a pane, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Illegal state: {0}")]
    IllegalState(String),
    #[error(transparent)]
    InvalidValue(#[from] UnquotableLiteral),
}

#[derive(Debug)]
struct ContextNode {
    parent: Option<ContextId>,
    values: Map<String, Value>,
}

impl ContextNode {
    fn new(id: ContextId, parent: Option<ContextId>) -> Self {
        let mut values = Map::new();
        values.insert(CONTEXT_ID_KEY.to_string(), Value::from(id.0));
        Self { parent, values }
    }
}

/// Owner of every context node and scope binding
#[derive(Debug)]
pub struct ContextKeyService {
    nodes: HashMap<ContextId, ContextNode>,
    scopes: HashMap<ScopeHandle, ContextId>,
    next_id: u64,
}

impl Default for ContextKeyService {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextKeyService {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ContextId::ROOT, ContextNode::new(ContextId::ROOT, None));
        Self {
            nodes,
            scopes: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn root(&self) -> ContextId {
        ContextId::ROOT
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Create an unbound child of `parent`
    pub fn create_child(&mut self, parent: ContextId) -> Result<ContextId, ContextError> {
        if !self.nodes.contains_key(&parent) {
            return Err(ContextError::IllegalState(format!(
                "parent context {} is disposed",
                parent.0
            )));
        }
        let id = ContextId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, ContextNode::new(id, Some(parent)));
        tracing::trace!(target: "chordmap::context", id = id.0, parent = parent.0, "context created");
        Ok(id)
    }

    /// Create a child context bound to `scope`, under `parent_scope`'s context (or the root)
    pub fn create_scoped(
        &mut self,
        scope: ScopeHandle,
        parent_scope: Option<ScopeHandle>,
    ) -> Result<ContextId, ContextError> {
        if self.scopes.contains_key(&scope) {
            return Err(ContextError::IllegalState(format!(
                "scope {} already has a context",
                scope.0
            )));
        }
        let parent = self.context_for_scope(parent_scope);
        let id = self.create_child(parent)?;
        self.scopes.insert(scope, id);
        Ok(id)
    }

    /// Dispose the context bound to `scope`, with its descendants
    pub fn dispose_scoped(&mut self, scope: ScopeHandle) -> Result<(), ContextError> {
        let id = self.scopes.get(&scope).copied().ok_or_else(|| {
            ContextError::IllegalState(format!("scope {} has no context", scope.0))
        })?;
        self.dispose_context(id)
    }

    /// Dispose a context and all of its descendants, releasing their scope bindings
    pub fn dispose_context(&mut self, id: ContextId) -> Result<(), ContextError> {
        if id == ContextId::ROOT {
            return Err(ContextError::IllegalState(
                "the root context cannot be disposed".to_string(),
            ));
        }
        if !self.nodes.contains_key(&id) {
            return Err(ContextError::IllegalState(format!(
                "context {} is already disposed",
                id.0
            )));
        }

        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i];
            doomed.extend(
                self.nodes
                    .iter()
                    .filter(|(_, node)| node.parent == Some(current))
                    .map(|(child, _)| *child),
            );
            i += 1;
        }

        for doomed_id in &doomed {
            self.nodes.remove(doomed_id);
        }
        self.scopes.retain(|_, bound| !doomed.contains(bound));
        tracing::trace!(target: "chordmap::context", id = id.0, count = doomed.len(), "context disposed");
        Ok(())
    }

    /// Set a value on `id`; returns whether the stored value changed
    pub fn set_value(
        &mut self,
        id: ContextId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<bool, ContextError> {
        let key = key.into();
        if key == CONTEXT_ID_KEY {
            return Err(ContextError::IllegalState(format!(
                "'{}' is reserved",
                CONTEXT_ID_KEY
            )));
        }
        let node = self.node_mut(id)?;
        if node.values.get(&key) == Some(&value) {
            return Ok(false);
        }
        node.values.insert(key, value);
        Ok(true)
    }

    /// Remove a value from `id` itself (parents are untouched)
    pub fn remove_value(&mut self, id: ContextId, key: &str) -> Result<bool, ContextError> {
        if key == CONTEXT_ID_KEY {
            return Ok(false);
        }
        Ok(self.node_mut(id)?.values.remove(key).is_some())
    }

    /// Look `key` up from `id` towards the root
    pub fn get_value(&self, id: ContextId, key: &str) -> Option<&Value> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.nodes.get(&node_id)?;
            if let Some(value) = node.values.get(key) {
                return Some(value);
            }
            current = node.parent;
        }
        None
    }

    /// Flattened view of every value visible from `id`; children override parents
    pub fn collect_all_values(&self, id: ContextId) -> Map<String, Value> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.nodes.get(&node_id) else {
                break;
            };
            chain.push(node);
            current = node.parent;
        }

        let mut values = Map::new();
        for node in chain.into_iter().rev() {
            for (key, value) in &node.values {
                values.insert(key.clone(), value.clone());
            }
        }
        values.remove(CONTEXT_ID_KEY);
        values
    }

    /// Context bound to `scope`; unknown or absent scopes fall back to the root
    pub fn context_for_scope(&self, scope: Option<ScopeHandle>) -> ContextId {
        scope
            .and_then(|s| self.scopes.get(&s).copied())
            .unwrap_or(ContextId::ROOT)
    }

    /// Evaluation view of `id`
    pub fn context(&self, id: ContextId) -> ContextRef<'_> {
        ContextRef { service: self, id }
    }

    fn node_mut(&mut self, id: ContextId) -> Result<&mut ContextNode, ContextError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| ContextError::IllegalState(format!("context {} is disposed", id.0)))
    }
}

/// Borrowed view of one context node, used to evaluate when clauses
#[derive(Debug, Clone, Copy)]
pub struct ContextRef<'a> {
    service: &'a ContextKeyService,
    id: ContextId,
}

impl ContextRef<'_> {
    pub fn id(&self) -> ContextId {
        self.id
    }
}

impl Context for ContextRef<'_> {
    fn get_value(&self, key: &str) -> Option<&Value> {
        self.service.get_value(self.id, key)
    }
}

/// Typed declaration of a context key and its default value
#[derive(Debug, Clone, PartialEq)]
pub struct RawContextKey {
    key: String,
    default: Option<Value>,
}

impl RawContextKey {
    pub fn new(key: impl Into<String>, default: Option<Value>) -> Self {
        Self {
            key: key.into(),
            default,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// `key`
    pub fn to_expr(&self) -> Expr {
        Expr::has(self.key.clone())
    }

    /// `key == 'value'`
    pub fn is_equal_to(&self, value: impl Into<String>) -> Result<Expr, ContextError> {
        Ok(Expr::equals(self.key.clone(), Literal::quoted(value)?))
    }

    /// `key != 'value'`
    pub fn not_equal_to(&self, value: impl Into<String>) -> Result<Expr, ContextError> {
        Ok(Expr::not_equals(self.key.clone(), Literal::quoted(value)?))
    }

    /// `!key`
    pub fn negate(&self) -> Expr {
        self.to_expr().negate()
    }

    /// Seed the default value into `id`
    pub fn bind_to(&self, service: &mut ContextKeyService, id: ContextId) -> Result<(), ContextError> {
        if let Some(default) = &self.default {
            service.set_value(id, self.key.clone(), default.clone())?;
        }
        Ok(())
    }

    /// Current value visible from `id`
    pub fn get_value<'a>(&self, service: &'a ContextKeyService, id: ContextId) -> Option<&'a Value> {
        service.get_value(id, &self.key)
    }
}
