//! Recursive descent parser
//!
//! Turns the token stream into a [`Program`]. Statement forms map one to one
//! onto [`InstrKind`] variants; expressions follow the usual precedence
//! ladder from `or` down to postfix indexing and calls.

use crate::ast::{
    Assignment, BinOp, Declaration, Expr, ForLoop, FunctionDef, IfCondition, InstrKind,
    Instruction, LoopBody, Param, Program, Span, Spanned, TraceStart, Type, UnOp, UserFunction,
    VoidFunctionCall, WhileLoop,
};
use crate::error::{CompileError, Result};
use crate::interp::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::lexer::Token;
use std::rc::Rc;

#[cfg(test)]
mod tests;

/// Deepest statement or expression nesting the parser accepts
pub const MAX_NESTING: usize = 1000;

/// Parse tokens into AST
pub fn parse(_filename: &str, source: &str, tokens: Vec<(Token, Span)>) -> Result<Program> {
    let mut parser = Parser::new(tokens, source.len());
    let mut body = Vec::new();
    while !parser.is_at_end() {
        body.push(parser.parse_statement()?);
    }
    Ok(Program { body })
}

/// Parser state
struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    /// Byte length of the source, used for end-of-input spans
    end: usize,
    /// Current statement and expression nesting
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>, end: usize) -> Self {
        Parser { tokens, pos: 0, end, depth: 0 }
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    fn peek(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(tok, _)| tok)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map_or(Span::new(self.end, self.end), |(_, span)| *span)
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(Span::default(), |(_, span)| *span)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, kind: &Token) -> bool {
        self.current()
            .is_some_and(|tok| std::mem::discriminant(tok) == std::mem::discriminant(kind))
    }

    fn advance(&mut self) -> Span {
        let span = self.current_span();
        if !self.is_at_end() {
            self.pos += 1;
        }
        span
    }

    /// Consume `kind` if it is next
    fn eat(&mut self, kind: &Token) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &Token) -> Result<Span> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("`{kind}`")))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span)> {
        match self.current() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                Ok((name, self.advance()))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let found = self
            .current()
            .map_or_else(|| "end of input".to_string(), |tok| format!("`{tok}`"));
        CompileError::parser(format!("expected {expected}, found {found}"), self.current_span())
    }

    fn current_type(&self) -> Option<Type> {
        self.current().and_then(Token::as_type)
    }

    /// Run one level of recursive descent, refusing to go past MAX_NESTING
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(CompileError::parser(
                format!("nesting deeper than {MAX_NESTING} levels"),
                self.current_span(),
            ));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || parse(self));
        self.depth -= 1;
        result
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> Result<Instruction> {
        self.nested(Self::parse_instruction)
    }

    fn parse_instruction(&mut self) -> Result<Instruction> {
        let start = self.current_span();
        match self.current() {
            Some(Token::Func) => self.parse_function(),
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => {
                self.advance();
                let looped = self.parse_loop_body()?;
                Ok(self.finish(InstrKind::While(WhileLoop { looped }), start))
            }
            Some(Token::For) => self.parse_for(),
            Some(Token::Trace) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let mut targets = vec![self.parse_expr()?];
                while self.eat(&Token::Comma) {
                    targets.push(self.parse_expr()?);
                }
                self.expect(&Token::RParen)?;
                self.expect(&Token::Semi)?;
                Ok(self.finish(InstrKind::Trace(TraceStart { targets }), start))
            }
            Some(Token::Break) => {
                self.advance();
                self.expect(&Token::Semi)?;
                Ok(self.finish(InstrKind::Break, start))
            }
            Some(Token::Continue) => {
                self.advance();
                self.expect(&Token::Semi)?;
                Ok(self.finish(InstrKind::Continue, start))
            }
            Some(Token::Return) => {
                self.advance();
                let value = if self.check(&Token::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Token::Semi)?;
                Ok(self.finish(InstrKind::Return(value), start))
            }
            _ => {
                let instr = self.parse_simple()?;
                self.expect(&Token::Semi)?;
                Ok(self.finish(instr.kind, start))
            }
        }
    }

    /// Instruction spanning from `start` to the last consumed token
    fn finish(&self, kind: InstrKind, start: Span) -> Instruction {
        Instruction::new(kind, start.merge(self.previous_span()))
    }

    /// Declaration, assignment or call, without the trailing `;`
    fn parse_simple(&mut self) -> Result<Instruction> {
        let start = self.current_span();
        if let Some(ty) = self.current_type() {
            self.advance();
            let (name, name_span) = self.expect_ident()?;
            let decl = if self.eat(&Token::Eq) {
                Declaration::new(name, ty, self.parse_expr()?)
            } else if ty == Type::Auto {
                return Err(CompileError::parser(
                    format!("`auto {name}` needs an initializer"),
                    name_span,
                ));
            } else {
                Declaration::declare_only(name, ty, name_span)
            };
            return Ok(self.finish(InstrKind::Declare(decl), start));
        }

        let expr = self.parse_expr()?;
        if self.eat(&Token::Eq) {
            if !expr.node.is_location() {
                return Err(CompileError::parser(
                    format!("cannot assign to `{}`", expr.node),
                    expr.span,
                ));
            }
            let value = self.parse_expr()?;
            let kind = InstrKind::Assign(Assignment { target: expr, value });
            return Ok(self.finish(kind, start));
        }
        match expr.node {
            Expr::Call { func, args } => {
                let kind = InstrKind::Call(VoidFunctionCall::new(func, args));
                Ok(self.finish(kind, start))
            }
            _ => Err(CompileError::parser(
                "expected a declaration, assignment or call",
                expr.span,
            )),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Instruction>> {
        self.expect(&Token::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.is_at_end() {
                return Err(self.unexpected("`}`"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_loop_body(&mut self) -> Result<LoopBody> {
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(LoopBody::new(cond, body))
    }

    fn parse_if(&mut self) -> Result<Instruction> {
        let start = self.expect(&Token::If)?;
        let cond = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                vec![self.parse_if()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        let kind = InstrKind::If(IfCondition {
            cond,
            then_branch,
            else_branch,
        });
        Ok(self.finish(kind, start))
    }

    fn parse_for(&mut self) -> Result<Instruction> {
        let start = self.expect(&Token::For)?;
        self.expect(&Token::LParen)?;
        let init = self.parse_simple()?;
        self.expect(&Token::Semi)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::Semi)?;
        let step = self.parse_simple()?;
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        let kind = InstrKind::For(ForLoop {
            init: Box::new(init),
            step: Box::new(step),
            looped: LoopBody::new(cond, body),
        });
        Ok(self.finish(kind, start))
    }

    fn parse_function(&mut self) -> Result<Instruction> {
        let start = self.expect(&Token::Func)?;
        let (name, _) = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let ty = self.current_type().ok_or_else(|| self.unexpected("parameter type"))?;
                self.advance();
                let (param, _) = self.expect_ident()?;
                params.push(Param { name: param, ty });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        let func = Rc::new(UserFunction {
            name,
            params,
            body,
            span,
        });
        Ok(self.finish(InstrKind::FunctionDef(FunctionDef { func }), start))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expr(&mut self) -> Result<Spanned<Expr>> {
        self.nested(Self::parse_or)
    }

    fn binary(left: Spanned<Expr>, op: BinOp, right: Spanned<Expr>) -> Spanned<Expr> {
        let span = left.span.merge(right.span);
        Spanned::new(
            Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span,
        )
    }

    fn parse_or(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Self::binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Self::binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Spanned<Expr>> {
        if self.check(&Token::Not) {
            let start = self.advance();
            let operand = self.nested(Self::parse_not)?;
            let span = start.merge(operand.span);
            return Ok(Spanned::new(
                Expr::Unary {
                    op: UnOp::Not,
                    expr: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Spanned<Expr>> {
        let left = self.parse_additive()?;
        let op = match self.current() {
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::NotEq) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::LtEq) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::GtEq) => BinOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Self::binary(left, op, right))
    }

    fn parse_additive(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Self::binary(left, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Self::binary(left, op, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Spanned<Expr>> {
        if self.check(&Token::Minus) {
            let start = self.advance();
            let operand = self.nested(Self::parse_unary)?;
            let span = start.merge(operand.span);
            return Ok(Spanned::new(
                Expr::Unary {
                    op: UnOp::Neg,
                    expr: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Spanned<Expr>> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::LBracket) {
            let index = self.parse_expr()?;
            let end = self.expect(&Token::RBracket)?;
            let span = expr.span.merge(end);
            expr = Spanned::new(
                Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
                span,
            );
        }
        Ok(expr)
    }

    /// Comma separated expressions up to `close`, which is consumed
    fn parse_list_until(&mut self, close: &Token) -> Result<(Vec<Spanned<Expr>>, Span)> {
        let mut items = Vec::new();
        if !self.check(close) {
            loop {
                items.push(self.parse_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(close)?;
        Ok((items, end))
    }

    fn parse_primary(&mut self) -> Result<Spanned<Expr>> {
        let span = self.current_span();
        let node = match self.current() {
            Some(Token::IntLit(n)) => Expr::IntLit(*n),
            Some(Token::FloatLit(x)) => Expr::FloatLit(*x),
            Some(Token::StringLit(s)) => Expr::StrLit(s.clone()),
            Some(Token::True) => Expr::BoolLit(true),
            Some(Token::False) => Expr::BoolLit(false),
            Some(Token::None) => Expr::NoneLit,
            Some(Token::Ident(name)) => {
                let name = name.clone();
                if matches!(self.peek(1), Some(Token::LParen)) {
                    self.pos += 2;
                    let (args, end) = self.parse_list_until(&Token::RParen)?;
                    return Ok(Spanned::new(Expr::Call { func: name, args }, span.merge(end)));
                }
                Expr::Var(name)
            }
            Some(Token::LBracket) => {
                self.advance();
                let (items, end) = self.parse_list_until(&Token::RBracket)?;
                return Ok(Spanned::new(Expr::ListLit(items), span.merge(end)));
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                let end = self.expect(&Token::RParen)?;
                return Ok(Spanned::new(inner.node, span.merge(end)));
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Spanned::new(node, span))
    }
}
