//! Runtime errors for the interpreter

use crate::ast::{Span, Type};
use std::fmt;

/// Runtime error during execution
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Location of the instruction or expression that failed
    pub span: Option<Span>,
    /// Context stack at the innermost failing frame, outermost first
    pub backtrace: Vec<String>,
}

/// Kinds of runtime errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Target identifier fails the naming predicate
    InvalidName,
    /// Must-not-exist declaration over an existing binding
    DeclaredExisting,
    /// Must-exist declaration over a missing binding
    OverwriteMissing,
    /// A declared-only value used as a source
    UnassignedUse,
    /// Declared type or condition type does not match
    TypeMismatch,
    /// trace-start on a variable already under observation
    AlreadyTraced,
    /// Declaration would replace a traced binding
    TracedOverwrite,
    /// Call to an unregistered function
    UnknownFunction,
    /// Function registered twice
    DuplicateFunction,
    /// Argument count mismatch
    ArityMismatch,
    /// Undefined variable
    UndefinedVariable,
    /// Index out of bounds
    IndexOutOfBounds,
    /// Division by zero or integer overflow
    Arithmetic,
    /// Expression is not an assignable/traceable location
    InvalidTarget,
    /// break/continue outside a loop, return outside a function
    InvalidControl,
    /// Script-level assert failed
    AssertionFailed,
    /// IO error from a built-in
    Io,
    /// Call depth limit exceeded
    ResourceExhausted,
    /// Context or scope stack out of balance: an engine defect
    Internal,
}

/// Who is at fault for an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCategory {
    /// The running script is wrong
    Script,
    /// The interpreter or an extension is wrong
    Engine,
}

impl ErrorKind {
    pub fn category(self) -> FaultCategory {
        match self {
            ErrorKind::Internal => FaultCategory::Engine,
            _ => FaultCategory::Script,
        }
    }
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            message: message.into(),
            span: None,
            backtrace: Vec::new(),
        }
    }

    /// Attach a location unless a more precise one is already set
    pub fn at(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }

    pub fn is_engine_fault(&self) -> bool {
        self.kind.category() == FaultCategory::Engine
    }

    pub fn invalid_name(name: &str) -> Self {
        Self::new(ErrorKind::InvalidName, format!("invalid variable name: {name:?}"))
    }

    pub fn declared_existing(name: &str) -> Self {
        Self::new(
            ErrorKind::DeclaredExisting,
            format!("variable {name} is already declared in this scope"),
        )
    }

    pub fn overwrite_missing(name: &str) -> Self {
        Self::new(
            ErrorKind::OverwriteMissing,
            format!("cannot overwrite {name}: no such variable in this scope"),
        )
    }

    pub fn unassigned_use(what: &str) -> Self {
        Self::new(
            ErrorKind::UnassignedUse,
            format!("{what} was declared but never assigned"),
        )
    }

    pub fn type_mismatch(expected: &str, got: Type) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("type mismatch: expected {expected}, got {got}"),
        )
    }

    pub fn already_traced(label: &str) -> Self {
        Self::new(ErrorKind::AlreadyTraced, format!("{label} is already traced"))
    }

    pub fn traced_overwrite(name: &str) -> Self {
        Self::new(
            ErrorKind::TracedOverwrite,
            format!("cannot redeclare {name}: it is being traced"),
        )
    }

    pub fn unknown_function(name: &str, hint: &str) -> Self {
        Self::new(
            ErrorKind::UnknownFunction,
            format!("unknown function: {name}{hint}"),
        )
    }

    pub fn duplicate_function(name: &str) -> Self {
        Self::new(
            ErrorKind::DuplicateFunction,
            format!("function {name} is already defined"),
        )
    }

    pub fn arity_mismatch(name: &str, expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::ArityMismatch,
            format!("function {name} expects {expected} argument(s), got {got}"),
        )
    }

    pub fn undefined_variable(name: &str, hint: &str) -> Self {
        Self::new(
            ErrorKind::UndefinedVariable,
            format!("undefined variable: {name}{hint}"),
        )
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        Self::new(
            ErrorKind::IndexOutOfBounds,
            format!("index {index} out of bounds for length {len}"),
        )
    }

    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::Arithmetic, "division by zero")
    }

    pub fn overflow(op: &str) -> Self {
        Self::new(ErrorKind::Arithmetic, format!("integer overflow in {op}"))
    }

    pub fn invalid_target(what: &str) -> Self {
        Self::new(
            ErrorKind::InvalidTarget,
            format!("{what} is not a variable or element"),
        )
    }

    pub fn invalid_control(what: &str) -> Self {
        Self::new(ErrorKind::InvalidControl, what.to_string())
    }

    pub fn assertion_failed() -> Self {
        Self::new(ErrorKind::AssertionFailed, "assertion failed")
    }

    pub fn io_error(msg: &str) -> Self {
        Self::new(ErrorKind::Io, format!("IO error: {msg}"))
    }

    pub fn resource_exhausted(limit: usize) -> Self {
        Self::new(
            ErrorKind::ResourceExhausted,
            format!("call depth limit of {limit} exceeded"),
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.category() {
            FaultCategory::Script => write!(f, "Runtime error: {}", self.message),
            FaultCategory::Engine => write!(f, "Internal interpreter error: {}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_is_engine_fault() {
        assert_eq!(ErrorKind::Internal.category(), FaultCategory::Engine);
        assert!(RuntimeError::internal("depth").is_engine_fault());
    }

    #[test]
    fn test_script_faults() {
        for kind in [
            ErrorKind::DeclaredExisting,
            ErrorKind::UnassignedUse,
            ErrorKind::AlreadyTraced,
            ErrorKind::ResourceExhausted,
        ] {
            assert_eq!(kind.category(), FaultCategory::Script);
        }
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = RuntimeError::type_mismatch("bool", Type::Int);
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert!(err.message.contains("bool"));
        assert!(err.message.contains("int"));
    }

    #[test]
    fn test_at_keeps_first_span() {
        let err = RuntimeError::division_by_zero()
            .at(Span::new(4, 5))
            .at(Span::new(0, 10));
        assert_eq!(err.span, Some(Span::new(4, 5)));
    }

    #[test]
    fn test_display_by_category() {
        assert_eq!(
            RuntimeError::assertion_failed().to_string(),
            "Runtime error: assertion failed"
        );
        assert!(RuntimeError::internal("x")
            .to_string()
            .starts_with("Internal interpreter error"));
    }
}
