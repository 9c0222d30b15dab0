//! Instruction engine
//!
//! Every statement form runs through [`Instruction::execute`]: push one
//! frame, perform the effect, verify both stacks balanced, pop the frame.
//! Non-local control (`break`, `continue`, `return`) travels outward as a
//! [`Flow`] value, never as an error.

use super::context::{Frame, Status};
use super::error::{InterpResult, RuntimeError};
use super::value::{VarRef, Variable};
use super::{Interpreter, STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::ast::{
    Assignment, Declaration, Expr, ForLoop, FunctionDef, IfCondition, InstrKind, Instruction,
    LoopBody, OverwriteMode, Spanned, TraceStart, Type, VoidFunctionCall, WhileLoop,
};
use crate::util::is_valid_name;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, trace};

/// How control leaves an instruction
#[derive(Debug, Clone)]
pub enum Flow {
    /// Continue with the next instruction
    Next,
    Break,
    Continue,
    /// Leave the current function with an optional value
    Return(Option<Variable>),
}

impl Flow {
    pub fn is_next(&self) -> bool {
        matches!(self, Flow::Next)
    }
}

impl Instruction {
    /// Frame this instruction pushes when it executes
    pub fn frame(&self, interp: &Interpreter) -> Frame {
        let frame = Frame::new(Status::Declaration, self.span);
        match &self.kind {
            InstrKind::While(_) => Frame { status: Status::WhileLoop, ..frame },
            InstrKind::For(_) => Frame { status: Status::ForLoop, ..frame },
            InstrKind::If(_) => Frame { status: Status::If, ..frame },
            InstrKind::Declare(decl) => frame.with_detail(decl.name.clone()),
            InstrKind::Assign(assign) => Frame {
                status: Status::Assignment,
                ..frame.with_detail(assign.target.node.to_string())
            },
            InstrKind::Call(call) => {
                let status = if interp.functions.is_user(&call.name) {
                    Status::UserFunction
                } else {
                    Status::PredefinedCall
                };
                Frame { status, ..frame.with_detail(call.name.clone()) }
            }
            InstrKind::FunctionDef(def) => Frame {
                status: Status::FunctionDef,
                ..frame.with_detail(def.func.name.clone())
            },
            InstrKind::Trace(_) => Frame { status: Status::TraceStart, ..frame },
            InstrKind::Break => Frame { status: Status::Break, ..frame },
            InstrKind::Continue => Frame { status: Status::Continue, ..frame },
            InstrKind::Return(_) => Frame { status: Status::Return, ..frame },
        }
    }

    /// Execute with automatic stack growth for deep recursion
    pub fn execute(&self, interp: &mut Interpreter) -> InterpResult<Flow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            interp.steps += 1;
            let frame = self.frame(interp);
            trace!(step = interp.steps, status = %frame.status, span = %self.span, "execute");
            interp.framed(frame, |interp| self.run(interp))
        })
    }

    fn run(&self, interp: &mut Interpreter) -> InterpResult<Flow> {
        match &self.kind {
            InstrKind::While(while_loop) => while_loop.run(interp),
            InstrKind::For(for_loop) => for_loop.run(interp),
            InstrKind::If(cond) => cond.run(interp),
            InstrKind::Declare(decl) => {
                interp.declare(decl)?;
                interp.record_traces(self.span);
                Ok(Flow::Next)
            }
            InstrKind::Assign(assign) => {
                assign.run(interp)?;
                interp.record_traces(self.span);
                Ok(Flow::Next)
            }
            InstrKind::Call(call) => {
                call.run(interp, self)?;
                interp.record_traces(self.span);
                Ok(Flow::Next)
            }
            InstrKind::FunctionDef(def) => def.run(interp),
            InstrKind::Trace(start) => start.run(interp),
            InstrKind::Break => {
                if interp.context.loop_depth() == 0 {
                    return Err(RuntimeError::invalid_control("break outside of a loop"));
                }
                Ok(Flow::Break)
            }
            InstrKind::Continue => {
                if interp.context.loop_depth() == 0 {
                    return Err(RuntimeError::invalid_control("continue outside of a loop"));
                }
                Ok(Flow::Continue)
            }
            InstrKind::Return(value) => {
                if !interp.context.in_function() {
                    return Err(RuntimeError::invalid_control("return outside of a function"));
                }
                let value = match value {
                    Some(expr) => Some(Variable::new(interp.eval_value(expr)?.into_value())),
                    None => None,
                };
                Ok(Flow::Return(value))
            }
        }
    }
}

impl Interpreter {
    /// Run instructions in order until one leaves with a non-`Next` flow
    pub fn run_block(&mut self, body: &[Instruction]) -> InterpResult<Flow> {
        for instr in body {
            let flow = instr.execute(self)?;
            if !flow.is_next() {
                return Ok(flow);
            }
        }
        Ok(Flow::Next)
    }

    /// Validate a declaration target against the current scope
    fn check_declaration(&self, decl: &Declaration) -> InterpResult<()> {
        if !is_valid_name(&decl.name) {
            return Err(RuntimeError::invalid_name(&decl.name));
        }
        let existing = self.scopes.get_local(&decl.name);
        match (decl.mode, &existing) {
            (OverwriteMode::MustNotExist, Some(_)) => {
                return Err(RuntimeError::declared_existing(&decl.name));
            }
            (OverwriteMode::MustExist, None) => {
                return Err(RuntimeError::overwrite_missing(&decl.name));
            }
            _ => {}
        }
        if existing.is_some_and(|var| var.borrow().is_traced()) {
            return Err(RuntimeError::traced_overwrite(&decl.name));
        }
        Ok(())
    }

    /// Execute a declaration: check the target, evaluate, bind
    pub fn declare(&mut self, decl: &Declaration) -> InterpResult<VarRef> {
        self.check_declaration(decl)?;
        let value = self.eval(&decl.init)?;
        self.bind_checked(decl, value, &decl.init)
    }

    /// Bind an already evaluated value as if by `decl`
    pub fn bind(&mut self, decl: &Declaration, value: Variable) -> InterpResult<VarRef> {
        self.check_declaration(decl)?;
        self.bind_checked(decl, value, &decl.init)
    }

    fn bind_checked(
        &mut self,
        decl: &Declaration,
        value: Variable,
        source: &Spanned<Expr>,
    ) -> InterpResult<VarRef> {
        if !value.is_assigned() {
            let what = value.name().map_or_else(|| source.node.to_string(), str::to_string);
            return Err(RuntimeError::unassigned_use(&what).at(source.span));
        }
        if decl.ty != Type::Auto && !self.scopes.family_matches(decl.ty, value.value()) {
            return Err(
                RuntimeError::type_mismatch(decl.ty.keyword(), value.ty()).at(source.span),
            );
        }
        let mut fresh = Variable::new(value.into_value()).with_name(decl.name.clone());
        fresh.set_assigned(decl.assigned);
        let var = fresh.into_ref();
        self.scopes.define(decl.name.clone(), Rc::clone(&var));
        Ok(var)
    }
}

/// Marks a loop as iterating, restoring the previous state on drop
struct Iterating<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> Iterating<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Iterating { flag, previous }
    }
}

impl Drop for Iterating<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

impl LoopBody {
    /// One pass over the body in a fresh scope
    fn iterate(&self, interp: &mut Interpreter) -> InterpResult<Flow> {
        let _iterating = Iterating::enter(&self.iterating);
        interp.with_scope(|interp| interp.run_block(&self.body))
    }

    /// Run iterations while the condition holds, calling `step` after each
    fn run_with_step(
        &self,
        interp: &mut Interpreter,
        mut step: impl FnMut(&mut Interpreter) -> InterpResult<()>,
    ) -> InterpResult<Flow> {
        while interp.eval_condition(&self.cond)? {
            match self.iterate(interp)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Next | Flow::Continue => {}
            }
            step(interp)?;
        }
        Ok(Flow::Next)
    }
}

impl WhileLoop {
    fn run(&self, interp: &mut Interpreter) -> InterpResult<Flow> {
        self.looped.run_with_step(interp, |_| Ok(()))
    }
}

impl ForLoop {
    fn run(&self, interp: &mut Interpreter) -> InterpResult<Flow> {
        interp.with_scope(|interp| {
            expect_next(self.init.execute(interp)?, "for-loop initializer")?;
            self.looped.run_with_step(interp, |interp| {
                expect_next(self.step.execute(interp)?, "for-loop step")
            })
        })
    }
}

/// Simple statements never produce a control signal
fn expect_next(flow: Flow, what: &str) -> InterpResult<()> {
    match flow {
        Flow::Next => Ok(()),
        other => Err(RuntimeError::internal(format!("{what} produced {other:?}"))),
    }
}

impl IfCondition {
    fn run(&self, interp: &mut Interpreter) -> InterpResult<Flow> {
        let branch = if interp.eval_condition(&self.cond)? {
            &self.then_branch
        } else {
            &self.else_branch
        };
        interp.with_scope(|interp| interp.run_block(branch))
    }
}

impl Assignment {
    fn run(&self, interp: &mut Interpreter) -> InterpResult<()> {
        if self.target.node.root_name().is_some_and(str::is_empty) {
            return Err(RuntimeError::invalid_name("").at(self.target.span));
        }
        let value = interp.eval_value(&self.value)?;
        let target = interp.resolve(&self.target)?;
        target.borrow_mut().assign(value.into_value());
        Ok(())
    }
}

impl VoidFunctionCall {
    fn run(&self, interp: &mut Interpreter, instr: &Instruction) -> InterpResult<()> {
        let args = interp.eval_args(&self.args)?;
        interp.call_by_name(&self.name, args, instr.span)?;
        self.calls.set(self.calls.get() + 1);
        Ok(())
    }
}

impl FunctionDef {
    fn run(&self, interp: &mut Interpreter) -> InterpResult<Flow> {
        debug!(name = %self.func.name, params = self.func.params.len(), "define function");
        interp.functions.define(Rc::clone(&self.func))?;
        Ok(Flow::Next)
    }
}

impl TraceStart {
    fn run(&self, interp: &mut Interpreter) -> InterpResult<Flow> {
        for target in &self.targets {
            let label = target.node.to_string();
            if !target.node.is_location() {
                return Err(RuntimeError::invalid_target(&label).at(target.span));
            }
            let var = interp.resolve(target)?;
            if var.borrow().is_traced() {
                return Err(RuntimeError::already_traced(&label).at(target.span));
            }
            var.borrow_mut().mark_traced();
            let id = interp.tracer.watch(&var, label.as_str());
            debug!(%label, id = id.0, "trace start");
        }
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::interp::{ErrorKind, Value};

    fn sp<T>(node: T) -> Spanned<T> {
        Spanned::new(node, Span::default())
    }

    fn instr(kind: InstrKind) -> Instruction {
        Instruction::new(kind, Span::default())
    }

    fn declare(name: &str, ty: Type, init: Expr) -> Instruction {
        instr(InstrKind::Declare(Declaration::new(name, ty, sp(init))))
    }

    fn int_of(interp: &Interpreter, name: &str) -> Option<i64> {
        interp.lookup(name).and_then(|v| v.value().as_int())
    }

    #[test]
    fn test_declaration_binds_named_variable() {
        let mut interp = Interpreter::new();
        declare("x", Type::Int, Expr::IntLit(3))
            .execute(&mut interp)
            .unwrap();
        let x = interp.lookup("x").unwrap();
        assert_eq!(x.name(), Some("x"));
        assert_eq!(x.value().as_int(), Some(3));
        assert_eq!(interp.context.depth(), 0);
    }

    #[test]
    fn test_declaration_type_families() {
        let mut interp = Interpreter::new();
        let err = declare("x", Type::Int, Expr::FloatLit(1.0))
            .execute(&mut interp)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        declare("y", Type::Auto, Expr::FloatLit(1.0))
            .execute(&mut interp)
            .unwrap();
    }

    #[test]
    fn test_declare_only_is_unassigned() {
        let mut interp = Interpreter::new();
        instr(InstrKind::Declare(Declaration::declare_only("x", Type::Int, Span::default())))
            .execute(&mut interp)
            .unwrap();
        let x = interp.lookup("x").unwrap();
        assert!(!x.is_assigned());
        assert_eq!(x.value(), &Value::Int(0));
    }

    #[test]
    fn test_invalid_name_checked_first() {
        let mut interp = Interpreter::new();
        let err = declare("1x", Type::Int, Expr::Var("missing".into()))
            .execute(&mut interp)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidName);
    }

    #[test]
    fn test_overwrite_either_replaces_identity() {
        let mut interp = Interpreter::new();
        declare("x", Type::Int, Expr::IntLit(1))
            .execute(&mut interp)
            .unwrap();
        let before = interp.scopes.get("x").unwrap();
        let decl = Declaration::new("x", Type::Int, sp(Expr::IntLit(2))).with_mode(OverwriteMode::Either);
        instr(InstrKind::Declare(decl)).execute(&mut interp).unwrap();
        let after = interp.scopes.get("x").unwrap();
        assert!(!Rc::ptr_eq(&before, &after));
        assert_eq!(int_of(&interp, "x"), Some(2));
    }

    #[test]
    fn test_break_outside_loop() {
        let mut interp = Interpreter::new();
        let err = instr(InstrKind::Break).execute(&mut interp).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidControl);
        assert_eq!(interp.context.depth(), 0);
    }

    #[test]
    fn test_return_outside_function() {
        let mut interp = Interpreter::new();
        let err = instr(InstrKind::Return(None)).execute(&mut interp).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidControl);
    }

    #[test]
    fn test_iterating_flag_restored() {
        let flag = Cell::new(false);
        {
            let _outer = Iterating::enter(&flag);
            {
                let _inner = Iterating::enter(&flag);
                assert!(flag.get());
            }
            assert!(flag.get());
        }
        assert!(!flag.get());
    }

    #[test]
    fn test_expect_next_rejects_signals() {
        assert!(expect_next(Flow::Next, "init").is_ok());
        let err = expect_next(Flow::Break, "init").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }
}
