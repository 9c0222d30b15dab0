//! Abstract Syntax Tree definitions
//!
//! A program is an ordered sequence of [`Instruction`]s. Each statement form
//! is one [`InstrKind`] variant built from the small structs below; the
//! execution side lives in `interp::exec`.

mod expr;
mod span;
mod types;

pub use expr::*;
pub use span::*;
pub use types::*;

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

/// A script: the top-level instruction sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub body: Vec<Instruction>,
}

/// A single executable statement with its source location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: InstrKind,
    pub span: Span,
}

impl Instruction {
    pub fn new(kind: InstrKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InstrKind {
    While(WhileLoop),
    For(ForLoop),
    If(IfCondition),
    Declare(Declaration),
    Assign(Assignment),
    Call(VoidFunctionCall),
    FunctionDef(FunctionDef),
    Trace(TraceStart),
    Break,
    Continue,
    Return(Option<Spanned<Expr>>),
}

/// Condition and body shared by both loop forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopBody {
    pub cond: Spanned<Expr>,
    pub body: Vec<Instruction>,
    #[serde(skip)]
    pub(crate) iterating: Cell<bool>,
}

impl LoopBody {
    pub fn new(cond: Spanned<Expr>, body: Vec<Instruction>) -> Self {
        Self {
            cond,
            body,
            iterating: Cell::new(false),
        }
    }

    /// True while control is inside an active body of this loop
    pub fn is_iterating(&self) -> bool {
        self.iterating.get()
    }
}

/// while cond { body }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhileLoop {
    pub looped: LoopBody,
}

/// for (init; cond; step) { body }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForLoop {
    pub init: Box<Instruction>,
    pub step: Box<Instruction>,
    pub looped: LoopBody,
}

/// if cond { then } else { else }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfCondition {
    pub cond: Spanned<Expr>,
    pub then_branch: Vec<Instruction>,
    pub else_branch: Vec<Instruction>,
}

/// Policy for declaring over an existing binding in the current scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverwriteMode {
    MustNotExist,
    MustExist,
    Either,
}

/// type name = init;
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub ty: Type,
    pub init: Spanned<Expr>,
    /// Whether the new binding starts in the assigned state
    pub assigned: bool,
    pub mode: OverwriteMode,
}

impl Declaration {
    /// A plain `ty name = init;` declaration
    pub fn new(name: impl Into<String>, ty: Type, init: Spanned<Expr>) -> Self {
        Self {
            name: name.into(),
            ty,
            init,
            assigned: true,
            mode: OverwriteMode::MustNotExist,
        }
    }

    /// `ty name;`: bound to the type's default but not assigned
    pub fn declare_only(name: impl Into<String>, ty: Type, span: Span) -> Self {
        Self {
            assigned: false,
            ..Self::new(name, ty, Spanned::new(Expr::Default(ty), span))
        }
    }

    pub fn with_mode(mut self, mode: OverwriteMode) -> Self {
        self.mode = mode;
        self
    }
}

/// target = value;
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub target: Spanned<Expr>,
    pub value: Spanned<Expr>,
}

/// name(args); with the result discarded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoidFunctionCall {
    pub name: String,
    pub args: Vec<Spanned<Expr>>,
    #[serde(skip)]
    pub(crate) calls: Cell<u64>,
}

impl VoidFunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<Spanned<Expr>>) -> Self {
        Self {
            name: name.into(),
            args,
            calls: Cell::new(0),
        }
    }

    /// How many times this call site has been executed
    pub fn times_called(&self) -> u64 {
        self.calls.get()
    }
}

/// func name(params) { body }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub func: Rc<UserFunction>,
}

/// A user-defined function as stored in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Instruction>,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// trace(targets);
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStart {
    pub targets: Vec<Spanned<Expr>>,
}
