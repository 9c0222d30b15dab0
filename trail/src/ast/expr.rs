//! Expression AST nodes

use super::{Spanned, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal
    IntLit(i64),
    /// Float literal
    FloatLit(f64),
    /// Boolean literal
    BoolLit(bool),
    /// String literal
    StrLit(String),
    /// `none`
    NoneLit,
    /// List literal: [a, b, c]
    ListLit(Vec<Spanned<Expr>>),

    /// Variable reference
    Var(String),

    /// Element access: base[index]
    Index {
        base: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },

    /// Binary operation
    Binary {
        left: Box<Spanned<Expr>>,
        op: BinOp,
        right: Box<Spanned<Expr>>,
    },

    /// Unary operation
    Unary {
        op: UnOp,
        expr: Box<Spanned<Expr>>,
    },

    /// Function call used as a value
    Call {
        func: String,
        args: Vec<Spanned<Expr>>,
    },

    /// Registered default value of a type (initializer of `int x;`)
    Default(Type),
}

impl Expr {
    /// Whether this expression denotes an assignable location
    pub fn is_location(&self) -> bool {
        match self {
            Expr::Var(_) => true,
            Expr::Index { base, .. } => base.node.is_location(),
            _ => false,
        }
    }

    /// Name of the variable at the root of a location (`a` in `a[i][j]`)
    pub fn root_name(&self) -> Option<&str> {
        match self {
            Expr::Var(name) => Some(name),
            Expr::Index { base, .. } => base.node.root_name(),
            _ => None,
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        write!(f, "{s}")
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Negation: -x
    Neg,
    /// Logical not: not x
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "not "),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Spanned<Expr>]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item.node)?;
    }
    Ok(())
}

fn write_operand(f: &mut fmt::Formatter<'_>, e: &Expr) -> fmt::Result {
    match e {
        Expr::Binary { .. } => write!(f, "({e})"),
        _ => write!(f, "{e}"),
    }
}

/// Renders source-like text; used for trace labels and diagnostics.
/// Nested binary operands are parenthesized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntLit(n) => write!(f, "{n}"),
            Expr::FloatLit(x) => write!(f, "{x:?}"),
            Expr::BoolLit(b) => write!(f, "{b}"),
            Expr::StrLit(s) => write!(f, "{s:?}"),
            Expr::NoneLit => write!(f, "none"),
            Expr::ListLit(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Index { base, index } => write!(f, "{}[{}]", base.node, index.node),
            Expr::Binary { left, op, right } => {
                write_operand(f, &left.node)?;
                write!(f, " {op} ")?;
                write_operand(f, &right.node)
            }
            Expr::Unary { op, expr } => {
                write!(f, "{op}")?;
                write_operand(f, &expr.node)
            }
            Expr::Call { func, args } => {
                write!(f, "{func}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Default(ty) => write!(f, "<default {ty}>"),
        }
    }
}
