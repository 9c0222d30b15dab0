//! Execution context stack
//!
//! Every executing instruction owns exactly one [`Frame`]. The stack is used
//! for diagnostics (backtraces), for the balance check after each
//! instruction, and by `break`/`continue`/`return` to find their enclosing
//! loop or function.

use crate::ast::Span;
use std::fmt;

/// Which instruction kind a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    WhileLoop,
    ForLoop,
    If,
    Declaration,
    Assignment,
    PredefinedCall,
    UserFunction,
    TraceStart,
    FunctionDef,
    Break,
    Continue,
    Return,
}

impl Status {
    pub fn is_loop(self) -> bool {
        matches!(self, Status::WhileLoop | Status::ForLoop)
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::WhileLoop => "while-loop",
            Status::ForLoop => "for-loop",
            Status::If => "if",
            Status::Declaration => "declaration",
            Status::Assignment => "assignment",
            Status::PredefinedCall => "predefined-call",
            Status::UserFunction => "user-function",
            Status::TraceStart => "trace-start",
            Status::FunctionDef => "function-definition",
            Status::Break => "break",
            Status::Continue => "continue",
            Status::Return => "return",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A record of one executing instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub status: Status,
    /// Location of the originating instruction
    pub span: Span,
    /// Function or target name, when there is one
    pub detail: Option<String>,
}

impl Frame {
    pub fn new(status: Status, span: Span) -> Self {
        Frame {
            status,
            span,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} `{}` at {}", self.status, detail, self.span),
            None => write!(f, "{} at {}", self.status, self.span),
        }
    }
}

/// Stack of frames, innermost last
#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<Frame>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        self.frames.len()
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Frames between the top of the stack and the nearest function call
    fn current_activation(&self) -> impl Iterator<Item = &Frame> {
        self.frames
            .iter()
            .rev()
            .take_while(|frame| frame.status != Status::UserFunction)
    }

    /// Loop nesting depth inside the current function activation
    pub fn loop_depth(&self) -> usize {
        self.current_activation()
            .filter(|frame| frame.status.is_loop())
            .count()
    }

    /// Whether a user function is executing anywhere below the top
    pub fn in_function(&self) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.status == Status::UserFunction)
    }

    /// One line per frame, outermost first
    pub fn describe(&self) -> Vec<String> {
        self.frames.iter().map(Frame::to_string).collect()
    }
}
