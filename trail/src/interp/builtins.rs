//! Built-in functions

use super::error::{InterpResult, RuntimeError};
use super::functions::Functions;
use super::value::{Value, Variable};
use super::Interpreter;
use crate::ast::{Span, Type};
use std::io::Write;

pub(crate) fn register_builtins(functions: &mut Functions) {
    functions.register_builtin("print", builtin_print);
    functions.register_builtin("len", builtin_len);
    functions.register_builtin("append", builtin_append);
    functions.register_builtin("copy", builtin_copy);
    functions.register_builtin("str", builtin_str);
    functions.register_builtin("assert", builtin_assert);
}

fn expect_args(name: &str, args: &[Variable], count: usize) -> InterpResult<()> {
    if args.len() != count {
        return Err(RuntimeError::arity_mismatch(name, count, args.len()));
    }
    Ok(())
}

/// print(a, b, ...): space separated, newline terminated
fn builtin_print(interp: &mut Interpreter, args: Vec<Variable>, _span: Span) -> InterpResult<Value> {
    let line = args
        .iter()
        .map(|arg| arg.value().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(interp.output, "{line}")
        .and_then(|()| interp.output.flush())
        .map_err(|e| RuntimeError::io_error(&e.to_string()))?;
    Ok(Value::None)
}

/// len(list | string) -> int
fn builtin_len(_interp: &mut Interpreter, args: Vec<Variable>, _span: Span) -> InterpResult<Value> {
    expect_args("len", &args, 1)?;
    let len = match args[0].value() {
        Value::List(items) => items.borrow().len(),
        Value::Str(s) => s.chars().count(),
        other => return Err(RuntimeError::type_mismatch("list or string", other.type_of())),
    };
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| RuntimeError::overflow("len"))
}

/// append(list, value): pushes a fresh element onto the shared list
fn builtin_append(_interp: &mut Interpreter, args: Vec<Variable>, _span: Span) -> InterpResult<Value> {
    expect_args("append", &args, 2)?;
    let Value::List(items) = args[0].value() else {
        return Err(RuntimeError::type_mismatch("list", args[0].ty()));
    };
    let value = args[1].value().clone();
    items.borrow_mut().push(Variable::new(value).into_ref());
    Ok(Value::None)
}

/// copy(list) -> list with its own storage at every level
fn builtin_copy(_interp: &mut Interpreter, args: Vec<Variable>, _span: Span) -> InterpResult<Value> {
    expect_args("copy", &args, 1)?;
    match args[0].ty() {
        Type::List => Ok(args[0].value().deep_copy()),
        other => Err(RuntimeError::type_mismatch("list", other)),
    }
}

/// str(x) -> string rendering of any value
fn builtin_str(_interp: &mut Interpreter, args: Vec<Variable>, _span: Span) -> InterpResult<Value> {
    expect_args("str", &args, 1)?;
    Ok(Value::str(args[0].value().to_string()))
}

/// assert(cond)
fn builtin_assert(_interp: &mut Interpreter, args: Vec<Variable>, _span: Span) -> InterpResult<Value> {
    expect_args("assert", &args, 1)?;
    match args[0].value() {
        Value::Bool(true) => Ok(Value::None),
        Value::Bool(false) => Err(RuntimeError::assertion_failed()),
        other => Err(RuntimeError::type_mismatch("bool", other.type_of())),
    }
}
