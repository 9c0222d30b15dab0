//! Scope store: the stack of name → variable maps
//!
//! Lookup walks from the innermost scope to the global one across the whole
//! stack, so a function body sees the bindings of every caller (dynamic
//! scoping). The store also owns the table of per-type default values that
//! declarations use for type compatibility checks.

use super::value::{Value, VarRef};
use crate::ast::Type;
use std::collections::HashMap;

/// Stack-based scope management for the interpreter
#[derive(Debug)]
pub struct ScopeStack {
    /// Stack of scopes, index 0 is global
    scopes: Vec<HashMap<String, VarRef>>,
    /// Registered default value per concrete type
    defaults: HashMap<Type, Value>,
}

impl ScopeStack {
    /// Create a new scope stack with a global scope and the default table
    pub fn new() -> Self {
        let defaults = Type::CONCRETE
            .into_iter()
            .map(|ty| {
                let value = match ty {
                    Type::Int => Value::Int(0),
                    Type::Float => Value::Float(0.0),
                    Type::Bool => Value::Bool(false),
                    Type::Str => Value::str(""),
                    Type::List => Value::list([]),
                    Type::None | Type::Auto => Value::None,
                };
                (ty, value)
            })
            .collect();
        ScopeStack {
            scopes: vec![HashMap::new()],
            defaults,
        }
    }

    /// Push a new scope onto the stack
    /// Returns the new scope depth
    pub fn push_scope(&mut self) -> usize {
        self.scopes.push(HashMap::new());
        self.scopes.len()
    }

    /// Pop the current scope; the global scope is never popped
    /// Returns false if only the global scope was left
    pub fn pop_scope(&mut self) -> bool {
        if self.scopes.len() <= 1 {
            return false;
        }
        self.scopes.pop();
        true
    }

    /// Drop scopes until `depth` remain (never below the global scope)
    pub fn truncate(&mut self, depth: usize) {
        self.scopes.truncate(depth.max(1));
    }

    /// Current scope depth (1 = only global)
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind a variable in the current (innermost) scope
    /// Returns the binding it replaced, if any
    pub fn define(&mut self, name: String, var: VarRef) -> Option<VarRef> {
        self.scopes.last_mut().and_then(|scope| scope.insert(name, var))
    }

    /// Look up a variable, searching from the innermost scope to global
    pub fn get(&self, name: &str) -> Option<VarRef> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
    }

    /// Look up a variable in the current scope only
    pub fn get_local(&self, name: &str) -> Option<VarRef> {
        self.scopes.last().and_then(|scope| scope.get(name)).cloned()
    }

    /// Check if a variable exists in any scope
    pub fn contains(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains_key(name))
    }

    /// Bindings of the current scope (for debugging)
    pub fn current_bindings(&self) -> Option<&HashMap<String, VarRef>> {
        self.scopes.last()
    }

    /// Every visible name, innermost scope first and sorted within a scope,
    /// without duplicates
    pub fn visible_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for scope in self.scopes.iter().rev() {
            let mut keys: Vec<&str> = scope.keys().map(String::as_str).collect();
            keys.sort_unstable();
            for name in keys {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Fresh copy of the registered default for a type (`None` for `auto`)
    pub fn default_value(&self, ty: Type) -> Option<Value> {
        self.defaults.get(&ty).map(Value::deep_copy)
    }

    /// Whether `value` belongs to the family of `ty`'s registered default
    pub fn family_matches(&self, ty: Type, value: &Value) -> bool {
        self.defaults
            .get(&ty)
            .is_some_and(|default| default.type_of() == value.type_of())
    }

    /// Clear all scopes except global, and the global scope itself
    pub fn reset(&mut self) {
        self.scopes.truncate(1);
        self.scopes[0].clear();
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
