//! RAII guards pairing every scope push and frame push with its removal.
//!
//! Both guards hold `&mut Interpreter` and deref to it, so code inside the
//! guarded region uses the interpreter transparently. On drop the guarded
//! stack is truncated back to the depth recorded at entry, which runs on
//! normal completion, `?` propagation and unwinding alike.

use super::context::Frame;
use super::error::{InterpResult, RuntimeError};
use super::Interpreter;
use std::ops::{Deref, DerefMut};
use tracing::error;

/// Guard for one local scope
pub struct ScopeGuard<'a> {
    interp: &'a mut Interpreter,
    base: usize,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.interp.scopes.truncate(self.base);
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interp
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interp
    }
}

/// Guard for one context frame
pub struct FrameGuard<'a> {
    interp: &'a mut Interpreter,
    base: usize,
}

impl FrameGuard<'_> {
    /// Check that everything pushed inside this frame was released again
    fn check_balance(&self, scope_depth: usize) -> InterpResult<()> {
        let depth = self.interp.context.depth();
        let scopes = self.interp.scopes.depth();
        if depth == self.base + 1 && scopes == scope_depth {
            return Ok(());
        }
        let owner = self
            .interp
            .context
            .frames()
            .get(self.base)
            .map_or_else(|| "<lost frame>".to_string(), Frame::to_string);
        error!(%owner, depth, expected = self.base + 1, scopes, scope_depth, "stack imbalance");
        Err(RuntimeError::internal(format!(
            "{owner} left the stacks unbalanced: context depth {depth} (expected {}), scope depth {scopes} (expected {scope_depth})",
            self.base + 1
        )))
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.interp.context.truncate(self.base);
    }
}

impl Deref for FrameGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interp
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interp
    }
}

impl Interpreter {
    /// Open a local scope that is closed when the guard drops
    pub fn scoped(&mut self) -> ScopeGuard<'_> {
        let base = self.scopes.depth();
        self.scopes.push_scope();
        ScopeGuard { interp: self, base }
    }

    /// Run `f` inside a fresh local scope
    pub fn with_scope<T>(&mut self, f: impl FnOnce(&mut Interpreter) -> T) -> T {
        let mut scoped = self.scoped();
        f(&mut *scoped)
    }

    /// Push a frame that is popped when the guard drops
    pub fn enter_frame(&mut self, frame: Frame) -> FrameGuard<'_> {
        let base = self.context.depth();
        self.context.push(frame);
        FrameGuard { interp: self, base }
    }

    /// Run `f` under `frame`, then verify both stacks are back where they were.
    ///
    /// A fault leaving the innermost frame picks up the context backtrace.
    pub fn framed<T>(
        &mut self,
        frame: Frame,
        f: impl FnOnce(&mut Interpreter) -> InterpResult<T>,
    ) -> InterpResult<T> {
        let scope_depth = self.scopes.depth();
        let span = frame.span;
        let mut framed = self.enter_frame(frame);
        let mut result = f(&mut *framed);
        if let Err(err) = &mut result
            && err.backtrace.is_empty()
        {
            err.backtrace = framed.context.describe();
        }
        if let Err(fault) = framed.check_balance(scope_depth) {
            framed.scopes.truncate(scope_depth);
            return Err(fault.at(span));
        }
        result.map_err(|err| err.at(span))
    }
}
