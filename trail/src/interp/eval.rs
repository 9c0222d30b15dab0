//! Expression evaluator
//!
//! `eval` produces a [`Variable`] (so callers can check the assigned flag of
//! whatever they read), `resolve` produces the location an assignment or a
//! trace-start writes to.

use super::error::{InterpResult, RuntimeError};
use super::value::{Value, VarRef, Variable};
use super::{Interpreter, STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::ast::{BinOp, Expr, Spanned, UnOp};
use crate::util::{find_similar_name, format_suggestion_hint};
use std::rc::Rc;

impl Interpreter {
    /// Evaluate an expression with automatic stack growth for deep recursion
    pub fn eval(&mut self, expr: &Spanned<Expr>) -> InterpResult<Variable> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(expr))
            .map_err(|e| e.at(expr.span))
    }

    /// Evaluate an expression that is used as a value source
    pub fn eval_value(&mut self, expr: &Spanned<Expr>) -> InterpResult<Variable> {
        let var = self.eval(expr)?;
        if !var.is_assigned() {
            let what = var.name().map_or_else(|| expr.node.to_string(), str::to_string);
            return Err(RuntimeError::unassigned_use(&what).at(expr.span));
        }
        Ok(var)
    }

    /// Evaluate a loop or branch condition: an assigned `bool`
    pub fn eval_condition(&mut self, expr: &Spanned<Expr>) -> InterpResult<bool> {
        let var = self.eval_value(expr)?;
        var.value()
            .as_bool()
            .ok_or_else(|| RuntimeError::type_mismatch("bool", var.ty()).at(expr.span))
    }

    /// Evaluate call arguments left to right
    pub fn eval_args(&mut self, args: &[Spanned<Expr>]) -> InterpResult<Vec<Variable>> {
        args.iter().map(|arg| self.eval_value(arg)).collect()
    }

    /// Find the variable an expression denotes
    pub fn resolve(&mut self, expr: &Spanned<Expr>) -> InterpResult<VarRef> {
        match &expr.node {
            Expr::Var(name) => self.lookup_ref(name).map_err(|e| e.at(expr.span)),
            Expr::Index { base, index } => {
                let base_ref = self.resolve(base)?;
                let idx = self.eval_index(index)?;
                let base_var = base_ref.borrow();
                if !base_var.is_assigned() {
                    return Err(RuntimeError::unassigned_use(&base.node.to_string()).at(base.span));
                }
                match base_var.value() {
                    Value::List(items) => element(&items.borrow(), idx).map_err(|e| e.at(expr.span)),
                    Value::Str(_) => Err(RuntimeError::invalid_target(&format!(
                        "{} (strings are immutable)",
                        expr.node
                    ))
                    .at(expr.span)),
                    other => Err(RuntimeError::type_mismatch("list", other.type_of()).at(base.span)),
                }
            }
            other => Err(RuntimeError::invalid_target(&other.to_string()).at(expr.span)),
        }
    }

    fn lookup_ref(&self, name: &str) -> InterpResult<VarRef> {
        self.scopes.get(name).ok_or_else(|| {
            let names = self.scopes.visible_names();
            let hint = format_suggestion_hint(find_similar_name(name, &names, 2));
            RuntimeError::undefined_variable(name, &hint)
        })
    }

    fn eval_index(&mut self, index: &Spanned<Expr>) -> InterpResult<i64> {
        let var = self.eval_value(index)?;
        var.value()
            .as_int()
            .ok_or_else(|| RuntimeError::type_mismatch("int", var.ty()).at(index.span))
    }

    fn eval_inner(&mut self, expr: &Spanned<Expr>) -> InterpResult<Variable> {
        let value = match &expr.node {
            Expr::IntLit(n) => Value::Int(*n),
            Expr::FloatLit(x) => Value::Float(*x),
            Expr::BoolLit(b) => Value::Bool(*b),
            Expr::StrLit(s) => Value::str(s.as_str()),
            Expr::NoneLit => Value::None,
            Expr::Default(ty) => self.scopes.default_value(*ty).unwrap_or(Value::None),

            Expr::ListLit(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval_value(item).map(Variable::into_value))
                    .collect::<InterpResult<Vec<_>>>()?;
                Value::list(values)
            }

            Expr::Var(name) => return Ok(self.lookup_ref(name)?.borrow().clone()),

            Expr::Index { base, index } => {
                let base_var = self.eval_value(base)?;
                let idx = self.eval_index(index)?;
                return match base_var.value() {
                    Value::List(items) => Ok(element(&items.borrow(), idx)?.borrow().clone()),
                    Value::Str(s) => {
                        let ch = usize::try_from(idx)
                            .ok()
                            .and_then(|i| s.chars().nth(i))
                            .ok_or_else(|| {
                                RuntimeError::index_out_of_bounds(idx, s.chars().count())
                            })?;
                        Ok(Variable::new(Value::str(ch.to_string())))
                    }
                    other => Err(RuntimeError::type_mismatch("list or string", other.type_of())
                        .at(base.span)),
                };
            }

            Expr::Binary { left, op: BinOp::And, right } => {
                Value::Bool(self.eval_condition(left)? && self.eval_condition(right)?)
            }
            Expr::Binary { left, op: BinOp::Or, right } => {
                Value::Bool(self.eval_condition(left)? || self.eval_condition(right)?)
            }
            Expr::Binary { left, op, right } => {
                let lhs = self.eval_value(left)?.into_value();
                let rhs = self.eval_value(right)?.into_value();
                binary_op(*op, &lhs, &rhs)?
            }

            Expr::Unary { op, expr: operand } => {
                let value = self.eval_value(operand)?.into_value();
                unary_op(*op, &value)?
            }

            Expr::Call { func, args } => {
                let args = self.eval_args(args)?;
                return self.invoke(func, args, expr.span);
            }
        };
        Ok(Variable::new(value))
    }
}

fn element(items: &[VarRef], idx: i64) -> InterpResult<VarRef> {
    usize::try_from(idx)
        .ok()
        .and_then(|i| items.get(i))
        .map(Rc::clone)
        .ok_or_else(|| RuntimeError::index_out_of_bounds(idx, items.len()))
}

/// Both sides as floats when at least one is a float and both are numeric
fn float_pair(lhs: &Value, rhs: &Value) -> Option<(f64, f64)> {
    match (lhs, rhs) {
        (Value::Float(a), Value::Float(b)) => Some((*a, *b)),
        (Value::Int(a), Value::Float(b)) => Some((*a as f64, *b)),
        (Value::Float(a), Value::Int(b)) => Some((*a, *b as f64)),
        _ => None,
    }
}

fn operand_mismatch(op: BinOp, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::type_mismatch(
        &format!("operands supported by `{op}`"),
        if matches!(lhs, Value::Int(_) | Value::Float(_)) {
            rhs.type_of()
        } else {
            lhs.type_of()
        },
    )
}

fn binary_op(op: BinOp, lhs: &Value, rhs: &Value) -> InterpResult<Value> {
    use BinOp::*;

    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        let (a, b) = (*a, *b);
        return match op {
            Add => a.checked_add(b).map(Value::Int).ok_or_else(|| RuntimeError::overflow("addition")),
            Sub => a
                .checked_sub(b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::overflow("subtraction")),
            Mul => a
                .checked_mul(b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::overflow("multiplication")),
            Div | Mod if b == 0 => Err(RuntimeError::division_by_zero()),
            Div => a.checked_div(b).map(Value::Int).ok_or_else(|| RuntimeError::overflow("division")),
            Mod => a.checked_rem(b).map(Value::Int).ok_or_else(|| RuntimeError::overflow("modulo")),
            Eq => Ok(Value::Bool(a == b)),
            Ne => Ok(Value::Bool(a != b)),
            Lt => Ok(Value::Bool(a < b)),
            Le => Ok(Value::Bool(a <= b)),
            Gt => Ok(Value::Bool(a > b)),
            Ge => Ok(Value::Bool(a >= b)),
            And | Or => Err(operand_mismatch(op, lhs, rhs)),
        };
    }

    if let Some((a, b)) = float_pair(lhs, rhs) {
        return match op {
            Add => Ok(Value::Float(a + b)),
            Sub => Ok(Value::Float(a - b)),
            Mul => Ok(Value::Float(a * b)),
            Div | Mod if b == 0.0 => Err(RuntimeError::division_by_zero()),
            Div => Ok(Value::Float(a / b)),
            Mod => Ok(Value::Float(a % b)),
            Eq => Ok(Value::Bool(a == b)),
            Ne => Ok(Value::Bool(a != b)),
            Lt => Ok(Value::Bool(a < b)),
            Le => Ok(Value::Bool(a <= b)),
            Gt => Ok(Value::Bool(a > b)),
            Ge => Ok(Value::Bool(a >= b)),
            And | Or => Err(operand_mismatch(op, lhs, rhs)),
        };
    }

    match (op, lhs, rhs) {
        (Eq, _, _) => Ok(Value::Bool(lhs == rhs)),
        (Ne, _, _) => Ok(Value::Bool(lhs != rhs)),
        (Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (Add, Value::List(a), Value::List(b)) => {
            let values: Vec<Value> = a
                .borrow()
                .iter()
                .chain(b.borrow().iter())
                .map(|item| item.borrow().value().clone())
                .collect();
            Ok(Value::list(values))
        }
        (Lt | Le | Gt | Ge, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(match op {
            Lt => a < b,
            Le => a <= b,
            Gt => a > b,
            _ => a >= b,
        })),
        _ => Err(operand_mismatch(op, lhs, rhs)),
    }
}

fn unary_op(op: UnOp, value: &Value) -> InterpResult<Value> {
    match (op, value) {
        (UnOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::overflow("negation")),
        (UnOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::Neg, other) => Err(RuntimeError::type_mismatch("int or float", other.type_of())),
        (UnOp::Not, other) => Err(RuntimeError::type_mismatch("bool", other.type_of())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Span, Type};
    use crate::interp::ErrorKind;

    fn sp(node: Expr) -> Spanned<Expr> {
        Spanned::new(node, Span::default())
    }

    fn boxed(node: Expr) -> Box<Spanned<Expr>> {
        Box::new(sp(node))
    }

    fn bin(left: Expr, op: BinOp, right: Expr) -> Spanned<Expr> {
        sp(Expr::Binary {
            left: boxed(left),
            op,
            right: boxed(right),
        })
    }

    fn eval(expr: Spanned<Expr>) -> InterpResult<Value> {
        Interpreter::new().eval(&expr).map(Variable::into_value)
    }

    fn define(interp: &mut Interpreter, name: &str, var: Variable) {
        interp.scopes.define(name.to_string(), var.with_name(name).into_ref());
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(eval(bin(Expr::IntLit(7), BinOp::Div, Expr::IntLit(2))).unwrap(), Value::Int(3));
        assert_eq!(eval(bin(Expr::IntLit(7), BinOp::Mod, Expr::IntLit(4))).unwrap(), Value::Int(3));
        assert_eq!(eval(bin(Expr::IntLit(-3), BinOp::Mul, Expr::IntLit(4))).unwrap(), Value::Int(-12));
    }

    #[test]
    fn test_mixed_numeric_promotes() {
        assert_eq!(
            eval(bin(Expr::IntLit(1), BinOp::Add, Expr::FloatLit(0.5))).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            eval(bin(Expr::IntLit(2), BinOp::Lt, Expr::FloatLit(2.5))).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval(bin(Expr::IntLit(1), BinOp::Div, Expr::IntLit(0))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arithmetic);
    }

    #[test]
    fn test_overflow() {
        let err = eval(bin(Expr::IntLit(i64::MAX), BinOp::Add, Expr::IntLit(1))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arithmetic);
        assert!(err.message.contains("overflow"));
    }

    #[test]
    fn test_string_concat_and_compare() {
        assert_eq!(
            eval(bin(Expr::StrLit("ab".into()), BinOp::Add, Expr::StrLit("c".into()))).unwrap(),
            Value::str("abc")
        );
        assert_eq!(
            eval(bin(Expr::StrLit("a".into()), BinOp::Lt, Expr::StrLit("b".into()))).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_list_concat_is_fresh() {
        let mut interp = Interpreter::new();
        define(&mut interp, "a", Variable::new(Value::list([Value::Int(1)])));
        let joined = interp
            .eval(&bin(Expr::Var("a".into()), BinOp::Add, Expr::ListLit(vec![sp(Expr::IntLit(2))])))
            .unwrap();
        assert_eq!(joined.value(), &Value::list([Value::Int(1), Value::Int(2)]));
        let a = interp.lookup("a").unwrap();
        let (Value::List(a), Value::List(j)) = (a.value(), joined.value()) else { unreachable!() };
        assert!(!Rc::ptr_eq(&a.borrow()[0], &j.borrow()[0]));
    }

    #[test]
    fn test_short_circuit_skips_right() {
        // the right operand is undefined and never evaluated
        let expr = bin(Expr::BoolLit(false), BinOp::And, Expr::Var("missing".into()));
        assert_eq!(eval(expr).unwrap(), Value::Bool(false));
        let expr = bin(Expr::BoolLit(true), BinOp::Or, Expr::Var("missing".into()));
        assert_eq!(eval(expr).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_logic_requires_bool() {
        let err = eval(bin(Expr::IntLit(1), BinOp::And, Expr::BoolLit(true))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_unassigned_operand_rejected() {
        let mut interp = Interpreter::new();
        let mut x = Variable::new(Value::Int(0));
        x.set_assigned(false);
        define(&mut interp, "x", x);
        let err = interp
            .eval_value(&bin(Expr::Var("x".into()), BinOp::Add, Expr::IntLit(1)))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnassignedUse);
        assert!(err.message.contains('x'));
        // plain reads are allowed, the caller decides
        assert!(!interp.eval(&sp(Expr::Var("x".into()))).unwrap().is_assigned());
    }

    #[test]
    fn test_undefined_variable_hint() {
        let mut interp = Interpreter::new();
        define(&mut interp, "count", Variable::new(Value::Int(0)));
        let err = interp.eval(&sp(Expr::Var("cont".into()))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedVariable);
        assert!(err.message.contains("did you mean `count`"));
    }

    #[test]
    fn test_index_list_and_string() {
        let mut interp = Interpreter::new();
        define(&mut interp, "a", Variable::new(Value::list([Value::Int(4), Value::Int(5)])));
        define(&mut interp, "s", Variable::new(Value::str("hey")));
        let index = |base: &str, i: i64| {
            sp(Expr::Index {
                base: boxed(Expr::Var(base.into())),
                index: boxed(Expr::IntLit(i)),
            })
        };
        assert_eq!(interp.eval(&index("a", 1)).unwrap().value(), &Value::Int(5));
        assert_eq!(interp.eval(&index("s", 2)).unwrap().value(), &Value::str("y"));
        let err = interp.eval(&index("a", 2)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
        let err = interp.eval(&index("a", -1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
    }

    #[test]
    fn test_resolve_element_identity() {
        let mut interp = Interpreter::new();
        define(&mut interp, "a", Variable::new(Value::list([Value::Int(4)])));
        let target = sp(Expr::Index {
            base: boxed(Expr::Var("a".into())),
            index: boxed(Expr::IntLit(0)),
        });
        interp.resolve(&target).unwrap().borrow_mut().assign(Value::Int(9));
        assert_eq!(interp.lookup("a").unwrap().value(), &Value::list([Value::Int(9)]));
    }

    #[test]
    fn test_resolve_rejects_non_locations() {
        let mut interp = Interpreter::new();
        define(&mut interp, "s", Variable::new(Value::str("abc")));
        let err = interp.resolve(&sp(Expr::IntLit(1))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidTarget);
        let err = interp
            .resolve(&sp(Expr::Index {
                base: boxed(Expr::Var("s".into())),
                index: boxed(Expr::IntLit(0)),
            }))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidTarget);
    }

    #[test]
    fn test_condition_must_be_bool() {
        let mut interp = Interpreter::new();
        let err = interp.eval_condition(&sp(Expr::IntLit(1))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_default_values() {
        assert_eq!(eval(sp(Expr::Default(Type::Float))).unwrap(), Value::Float(0.0));
        assert_eq!(eval(sp(Expr::Default(Type::List))).unwrap(), Value::list([]));
    }

    #[test]
    fn test_call_in_expression() {
        let mut interp = Interpreter::new();
        let call = sp(Expr::Call {
            func: "len".into(),
            args: vec![sp(Expr::StrLit("four".into()))],
        });
        assert_eq!(interp.eval(&call).unwrap().value(), &Value::Int(4));
        assert_eq!(interp.context().depth(), 0);
    }
}
