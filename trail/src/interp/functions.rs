//! Function registry and call machinery

use super::context::{Frame, Status};
use super::error::{InterpResult, RuntimeError};
use super::exec::Flow;
use super::value::{Value, Variable};
use super::Interpreter;
use crate::ast::{Declaration, Expr, Span, Spanned, UserFunction};
use crate::util::{find_similar_name, format_suggestion_hint};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// Native handler: receives evaluated, assigned arguments
pub type BuiltinFn = fn(&mut Interpreter, Vec<Variable>, Span) -> InterpResult<Value>;

/// What a name resolves to
#[derive(Debug, Clone)]
pub enum Callee {
    Builtin(BuiltinFn),
    User(Rc<UserFunction>),
}

impl Callee {
    pub fn status(&self) -> Status {
        match self {
            Callee::Builtin(_) => Status::PredefinedCall,
            Callee::User(_) => Status::UserFunction,
        }
    }
}

/// Name → builtin handler or user-defined function
#[derive(Debug, Default)]
pub struct Functions {
    builtins: HashMap<String, BuiltinFn>,
    user: HashMap<String, Rc<UserFunction>>,
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a native handler
    pub fn register_builtin(&mut self, name: impl Into<String>, handler: BuiltinFn) {
        self.builtins.insert(name.into(), handler);
    }

    /// Register a user function; each name may be defined once
    pub fn define(&mut self, func: Rc<UserFunction>) -> InterpResult<()> {
        if self.user.contains_key(&func.name) {
            return Err(RuntimeError::duplicate_function(&func.name));
        }
        self.user.insert(func.name.clone(), func);
        Ok(())
    }

    /// User functions shadow builtins of the same name
    pub fn resolve(&self, name: &str) -> Option<Callee> {
        if let Some(func) = self.user.get(name) {
            return Some(Callee::User(Rc::clone(func)));
        }
        self.builtins.get(name).map(|handler| Callee::Builtin(*handler))
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn is_user(&self, name: &str) -> bool {
        self.user.contains_key(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.is_user(name) || self.is_builtin(name)
    }

    pub fn user_function(&self, name: &str) -> Option<&Rc<UserFunction>> {
        self.user.get(name)
    }

    /// Every registered name, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .user
            .keys()
            .chain(self.builtins.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Forget user functions, keep builtins
    pub fn clear_user(&mut self) {
        self.user.clear();
    }
}

impl Interpreter {
    /// Resolve `name`, failing with a did-you-mean hint
    pub fn lookup_function(&self, name: &str) -> InterpResult<Callee> {
        self.functions.resolve(name).ok_or_else(|| {
            let names = self.functions.names();
            let hint = format_suggestion_hint(find_similar_name(name, &names, 2));
            RuntimeError::unknown_function(name, &hint)
        })
    }

    /// Call a function by name with already evaluated arguments.
    ///
    /// Returns the value produced by `return`, or `None` when the body
    /// finishes without one. The caller owns the call-site frame.
    pub fn call_by_name(
        &mut self,
        name: &str,
        args: Vec<Variable>,
        span: Span,
    ) -> InterpResult<Option<Variable>> {
        match self.lookup_function(name)? {
            Callee::Builtin(handler) => {
                trace!(name, args = args.len(), "builtin call");
                let value = handler(self, args, span).map_err(|e| e.at(span))?;
                Ok(Some(Variable::new(value)))
            }
            Callee::User(func) => self.call_user(&func, args, span),
        }
    }

    fn call_user(
        &mut self,
        func: &UserFunction,
        args: Vec<Variable>,
        span: Span,
    ) -> InterpResult<Option<Variable>> {
        if func.params.len() != args.len() {
            return Err(
                RuntimeError::arity_mismatch(&func.name, func.params.len(), args.len()).at(span),
            );
        }

        self.call_depth += 1;
        if self.call_depth > self.config.max_call_depth {
            self.call_depth -= 1;
            return Err(RuntimeError::resource_exhausted(self.config.max_call_depth).at(span));
        }
        debug!(name = %func.name, depth = self.call_depth, "call");

        let result = self.with_scope(|interp| {
            for (param, arg) in func.params.iter().zip(args) {
                let decl = Declaration::new(
                    param.name.clone(),
                    param.ty,
                    Spanned::new(Expr::NoneLit, span),
                );
                interp.bind(&decl, arg)?;
            }
            interp.run_block(&func.body)
        });
        self.call_depth -= 1;

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(None),
            Flow::Break | Flow::Continue => Err(RuntimeError::invalid_control(
                "break/continue cannot leave a function body",
            )
            .at(span)),
        }
    }

    /// Call from inside an expression: gets its own frame, yields `none` for
    /// functions that return nothing
    pub fn invoke(&mut self, name: &str, args: Vec<Variable>, span: Span) -> InterpResult<Variable> {
        let status = self.lookup_function(name).map_err(|e| e.at(span))?.status();
        let frame = Frame::new(status, span).with_detail(name);
        let result = self.framed(frame, |interp| interp.call_by_name(name, args, span))?;
        Ok(result.unwrap_or_else(Variable::none))
    }
}
