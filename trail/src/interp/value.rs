//! Runtime values and variables for the interpreter

use super::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::ast::Type;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a variable; identity is the allocation
pub type VarRef = Rc<RefCell<Variable>>;

/// Shared list payload; every element is itself a variable
pub type ListRef = Rc<RefCell<Vec<VarRef>>>;

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Immutable string
    Str(Rc<String>),
    /// List (reference semantics: clones share elements)
    List(ListRef),
    /// The `none` value
    None,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Rc::new(s.into()))
    }

    /// Build a list of fresh, assigned element variables
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        let elements = items
            .into_iter()
            .map(|v| Variable::new(v).into_ref())
            .collect();
        Value::List(Rc::new(RefCell::new(elements)))
    }

    /// Type tag of this value
    pub fn type_of(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Bool(_) => Type::Bool,
            Value::Str(_) => Type::Str,
            Value::List(_) => Type::List,
            Value::None => Type::None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Copy with fresh list storage all the way down.
    ///
    /// A list reached twice maps to the same fresh list, so cycles and
    /// shared sublists keep their shape in the copy.
    pub fn deep_copy(&self) -> Value {
        self.copy_into(&mut Vec::new())
    }

    fn copy_into(&self, copied: &mut Vec<(*const (), ListRef)>) -> Value {
        let Value::List(items) = self else {
            return self.clone();
        };
        let ptr = Rc::as_ptr(items) as *const ();
        if let Some((_, fresh)) = copied.iter().find(|(seen, _)| *seen == ptr) {
            return Value::List(Rc::clone(fresh));
        }
        let fresh: ListRef = Rc::new(RefCell::new(Vec::new()));
        copied.push((ptr, Rc::clone(&fresh)));
        let elements = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            items
                .borrow()
                .iter()
                .map(|e| Variable::new(e.borrow().value.copy_into(copied)).into_ref())
                .collect::<Vec<_>>()
        });
        *fresh.borrow_mut() = elements;
        Value::List(fresh)
    }

    /// Equality that treats a pair of lists already under comparison as
    /// equal, so cyclic lists terminate
    fn eq_tracking(&self, other: &Value, pairs: &mut Vec<(*const (), *const ())>) -> bool {
        let (Value::List(a), Value::List(b)) = (self, other) else {
            return self.eq_scalar(other);
        };
        if Rc::ptr_eq(a, b) {
            return true;
        }
        let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
        if pairs.contains(&pair) {
            return true;
        }
        pairs.push(pair);
        let (a, b) = (a.borrow(), b.borrow());
        a.len() == b.len()
            && stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
                a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| x.borrow().value.eq_tracking(&y.borrow().value, pairs))
            })
    }

    fn eq_scalar(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::None, Value::None) => true,
            _ => false,
        }
    }

    /// Quoted form used for elements inside a rendered list
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<*const ()>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s.as_str()),
            Value::List(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if open.contains(&ptr) {
                    return write!(f, "[...]");
                }
                open.push(ptr);
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.borrow().value.fmt_nested(f, open)?;
                }
                open.pop();
                write!(f, "]")
            }
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(_) => self.fmt_nested(f, &mut Vec::new()),
            Value::None => write!(f, "none"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_tracking(other, &mut Vec::new())
    }
}

/// Runtime value container: a payload plus assignment and trace state
#[derive(Debug, Clone)]
pub struct Variable {
    value: Value,
    assigned: bool,
    traced: bool,
    name: Option<String>,
    /// Bumped on every write
    version: u64,
}

impl Variable {
    /// An assigned, untraced, anonymous variable
    pub fn new(value: Value) -> Self {
        Variable {
            value,
            assigned: true,
            traced: false,
            name: None,
            version: 0,
        }
    }

    pub fn none() -> Self {
        Self::new(Value::None)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn into_ref(self) -> VarRef {
        Rc::new(RefCell::new(self))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn ty(&self) -> Type {
        self.value.type_of()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    pub fn is_traced(&self) -> bool {
        self.traced
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_assigned(&mut self, assigned: bool) {
        self.assigned = assigned;
    }

    pub(crate) fn mark_traced(&mut self) {
        self.traced = true;
    }

    /// Overwrite the payload in place; identity and trace state are kept
    pub fn assign(&mut self, value: Value) {
        self.value = value;
        self.assigned = true;
        self.version += 1;
    }
}
