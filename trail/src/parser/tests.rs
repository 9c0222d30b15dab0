//! Parser tests for Trail statement and expression forms

use crate::ast::{BinOp, Expr, InstrKind, OverwriteMode, Program, Type, UnOp};
use crate::lexer::tokenize;
use crate::parser::parse;

/// Helper to parse a program and return the AST
fn parse_program(source: &str) -> crate::error::Result<Program> {
    let tokens = tokenize(source)?;
    parse("test.tr", source, tokens)
}

/// Helper to parse and expect success
fn parse_ok(source: &str) -> Program {
    parse_program(source).expect("Parse should succeed")
}

/// Helper to check if parsing fails
fn parse_fails(source: &str) -> bool {
    parse_program(source).is_err()
}

/// Parse a single expression statement `x = <expr>;` and return the source expression
fn parse_value(expr: &str) -> Expr {
    let prog = parse_ok(&format!("x = {expr};"));
    match prog.body.into_iter().next().map(|i| i.kind) {
        Some(InstrKind::Assign(assign)) => assign.value.node,
        other => panic!("Expected Assign, got {other:?}"),
    }
}

// ============================================
// Declarations
// ============================================

#[test]
fn test_parse_declaration() {
    let prog = parse_ok("int x = 42;");
    assert_eq!(prog.body.len(), 1);
    if let InstrKind::Declare(decl) = &prog.body[0].kind {
        assert_eq!(decl.name, "x");
        assert_eq!(decl.ty, Type::Int);
        assert!(decl.assigned);
        assert_eq!(decl.mode, OverwriteMode::MustNotExist);
        assert!(matches!(decl.init.node, Expr::IntLit(42)));
    } else {
        panic!("Expected Declare");
    }
}

#[test]
fn test_parse_declare_only() {
    let prog = parse_ok("list xs;");
    if let InstrKind::Declare(decl) = &prog.body[0].kind {
        assert!(!decl.assigned);
        assert!(matches!(decl.init.node, Expr::Default(Type::List)));
    } else {
        panic!("Expected Declare");
    }
}

#[test]
fn test_parse_auto_needs_initializer() {
    assert!(!parse_fails("auto x = 1.5;"));
    assert!(parse_fails("auto x;"));
}

#[test]
fn test_parse_all_types() {
    for (word, ty) in [
        ("int", Type::Int),
        ("float", Type::Float),
        ("bool", Type::Bool),
        ("string", Type::Str),
        ("list", Type::List),
    ] {
        let prog = parse_ok(&format!("{word} v;"));
        let InstrKind::Declare(decl) = &prog.body[0].kind else {
            panic!("Expected Declare");
        };
        assert_eq!(decl.ty, ty);
    }
}

// ============================================
// Expressions
// ============================================

#[test]
fn test_parse_precedence() {
    // 1 + 2 * 3
    let Expr::Binary { op, right, .. } = parse_value("1 + 2 * 3") else {
        panic!("Expected Binary");
    };
    assert_eq!(op, BinOp::Add);
    assert!(matches!(right.node, Expr::Binary { op: BinOp::Mul, .. }));
}

#[test]
fn test_parse_logic_precedence() {
    // not binds looser than comparison, and binds tighter than or
    let expr = parse_value("a or not b < 1 and c");
    assert_eq!(expr.to_string(), "a or (not (b < 1) and c)");
}

#[test]
fn test_parse_left_associative() {
    assert_eq!(parse_value("10 - 3 - 2").to_string(), "(10 - 3) - 2");
}

#[test]
fn test_parse_parentheses() {
    assert_eq!(parse_value("(1 + 2) * 3").to_string(), "(1 + 2) * 3");
}

#[test]
fn test_parse_unary_minus() {
    let Expr::Unary { op, expr } = parse_value("-x") else {
        panic!("Expected Unary");
    };
    assert_eq!(op, UnOp::Neg);
    assert!(matches!(expr.node, Expr::Var(_)));
}

#[test]
fn test_parse_literals() {
    assert!(matches!(parse_value("2.5"), Expr::FloatLit(x) if x == 2.5));
    assert!(matches!(parse_value("true"), Expr::BoolLit(true)));
    assert!(matches!(parse_value("none"), Expr::NoneLit));
    assert!(matches!(parse_value(r#""a\tb""#), Expr::StrLit(s) if s == "a\tb"));
}

#[test]
fn test_parse_list_literal() {
    let Expr::ListLit(items) = parse_value("[1, [2], \"x\"]") else {
        panic!("Expected ListLit");
    };
    assert_eq!(items.len(), 3);
    assert!(matches!(parse_value("[]"), Expr::ListLit(items) if items.is_empty()));
}

#[test]
fn test_parse_nested_index_and_call() {
    let expr = parse_value("grid[i + 1][j]");
    assert_eq!(expr.to_string(), "grid[i + 1][j]");
    assert!(expr.is_location());
    let expr = parse_value("len(copy(a))");
    assert!(matches!(expr, Expr::Call { ref func, ref args } if func == "len" && args.len() == 1));
}

#[test]
fn test_parse_comparison_not_chained() {
    assert!(parse_fails("x = 1 < 2 < 3;"));
}

// ============================================
// Statements
// ============================================

#[test]
fn test_parse_assignment_to_element() {
    let prog = parse_ok("a[0] = a[1];");
    let InstrKind::Assign(assign) = &prog.body[0].kind else {
        panic!("Expected Assign");
    };
    assert_eq!(assign.target.node.root_name(), Some("a"));
}

#[test]
fn test_parse_invalid_assignment_target() {
    assert!(parse_fails("1 = x;"));
    assert!(parse_fails("f(x) = 2;"));
}

#[test]
fn test_parse_void_call() {
    let prog = parse_ok("print(1, \"two\");");
    let InstrKind::Call(call) = &prog.body[0].kind else {
        panic!("Expected Call");
    };
    assert_eq!(call.name, "print");
    assert_eq!(call.args.len(), 2);
    assert_eq!(call.times_called(), 0);
}

#[test]
fn test_parse_bare_expression_rejected() {
    assert!(parse_fails("x + 1;"));
}

#[test]
fn test_parse_if_else_chain() {
    let prog = parse_ok("if x < 0 { y = 1; } else if x == 0 { y = 2; } else { y = 3; }");
    let InstrKind::If(cond) = &prog.body[0].kind else {
        panic!("Expected If");
    };
    assert_eq!(cond.then_branch.len(), 1);
    assert_eq!(cond.else_branch.len(), 1);
    let InstrKind::If(inner) = &cond.else_branch[0].kind else {
        panic!("Expected nested If");
    };
    assert_eq!(inner.else_branch.len(), 1);
}

#[test]
fn test_parse_while() {
    let prog = parse_ok("while i < 10 { i = i + 1; }");
    let InstrKind::While(w) = &prog.body[0].kind else {
        panic!("Expected While");
    };
    assert_eq!(w.looped.body.len(), 1);
    assert!(!w.looped.is_iterating());
}

#[test]
fn test_parse_for() {
    let prog = parse_ok("for (int i = 0; i < 3; i = i + 1) { print(i); }");
    let InstrKind::For(f) = &prog.body[0].kind else {
        panic!("Expected For");
    };
    assert!(matches!(f.init.kind, InstrKind::Declare(_)));
    assert!(matches!(f.step.kind, InstrKind::Assign(_)));
    assert_eq!(f.looped.body.len(), 1);
}

#[test]
fn test_parse_function() {
    let prog = parse_ok("func add(int a, int b) { return a + b; }");
    let InstrKind::FunctionDef(def) = &prog.body[0].kind else {
        panic!("Expected FunctionDef");
    };
    assert_eq!(def.func.name, "add");
    assert_eq!(def.func.params.len(), 2);
    assert_eq!(def.func.params[1].ty, Type::Int);
    assert!(matches!(def.func.body[0].kind, InstrKind::Return(Some(_))));
}

#[test]
fn test_parse_function_no_params() {
    let prog = parse_ok("func main() { return; }");
    let InstrKind::FunctionDef(def) = &prog.body[0].kind else {
        panic!("Expected FunctionDef");
    };
    assert!(def.func.params.is_empty());
    assert!(matches!(def.func.body[0].kind, InstrKind::Return(None)));
}

#[test]
fn test_parse_param_requires_type() {
    assert!(parse_fails("func f(a) { }"));
}

#[test]
fn test_parse_trace_and_control() {
    let prog = parse_ok("trace(x, a[0]); while true { break; continue; }");
    let InstrKind::Trace(start) = &prog.body[0].kind else {
        panic!("Expected Trace");
    };
    assert_eq!(start.targets.len(), 2);
    let InstrKind::While(w) = &prog.body[1].kind else {
        panic!("Expected While");
    };
    assert!(matches!(w.looped.body[0].kind, InstrKind::Break));
    assert!(matches!(w.looped.body[1].kind, InstrKind::Continue));
}

#[test]
fn test_parse_comments() {
    let prog = parse_ok("// line comment\nint x = 1; # hash comment\n");
    assert_eq!(prog.body.len(), 1);
}

#[test]
fn test_parse_instruction_span() {
    let source = "int x = 1;\nx = 2;";
    let prog = parse_ok(source);
    assert_eq!(&source[prog.body[1].span.start..prog.body[1].span.end], "x = 2;");
}

// ============================================
// Errors
// ============================================

#[test]
fn test_parse_missing_semicolon() {
    let err = parse_program("int x = 1").unwrap_err();
    assert!(err.message().contains("expected `;`"));
    assert!(err.message().contains("end of input"));
}

#[test]
fn test_parse_unclosed_block() {
    assert!(parse_fails("while true { x = 1;"));
}

#[test]
fn test_parse_error_span_points_at_token() {
    let err = parse_program("int x = ;").unwrap_err();
    assert_eq!(err.span().map(|s| s.start), Some(8));
}

#[test]
fn test_parse_deep_parentheses_rejected() {
    let source = format!("int x = {}1{};", "(".repeat(200_000), ")".repeat(200_000));
    let err = parse_program(&source).unwrap_err();
    assert!(err.message().contains("nesting deeper than"));
}

#[test]
fn test_parse_moderate_nesting_accepted() {
    let source = format!("int x = {}1{};", "(".repeat(100), ")".repeat(100));
    assert!(matches!(parse_ok(&source).body[0].kind, InstrKind::Declare(_)));
    assert!(!parse_fails(&format!("x = {}1;", "- ".repeat(100))));
    assert!(!parse_fails(&format!("b = {}true;", "not ".repeat(100))));
}

#[test]
fn test_parse_deep_prefix_chains_rejected() {
    assert!(parse_fails(&format!("x = {}1;", "-".repeat(50_000))));
    assert!(parse_fails(&format!("b = {}true;", "not ".repeat(50_000))));
}

#[test]
fn test_parse_deep_blocks_rejected() {
    let source = format!("{}{}", "while true { ".repeat(5_000), "}".repeat(5_000));
    let err = parse_program(&source).unwrap_err();
    assert!(err.message().contains("nesting deeper than"));
}
