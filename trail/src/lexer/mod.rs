//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::Span;
use crate::error::{CompileError, Result};
use logos::Logos;

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(_) => {
                return Err(CompileError::lexer(
                    format!("unexpected input: {:?}", lexer.slice()),
                    span,
                ));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_keywords() {
        assert_eq!(
            kinds("func if else while for trace"),
            vec![Token::Func, Token::If, Token::Else, Token::While, Token::For, Token::Trace]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        assert_eq!(kinds("integer"), vec![Token::Ident("integer".into())]);
        assert_eq!(kinds("tracer"), vec![Token::Ident("tracer".into())]);
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(kinds("42 2.5"), vec![Token::IntLit(42), Token::FloatLit(2.5)]);
    }

    #[test]
    fn test_tokenize_string_literal() {
        assert_eq!(kinds(r#""hello world""#), vec![Token::StringLit("hello world".into())]);
    }

    #[test]
    fn test_tokenize_comparison_operators() {
        assert_eq!(
            kinds("== != < > <= >= ="),
            vec![Token::EqEq, Token::NotEq, Token::Lt, Token::Gt, Token::LtEq, Token::GtEq, Token::Eq]
        );
    }

    #[test]
    fn test_tokenize_declaration() {
        assert_eq!(
            kinds("list a = [1, -2];"),
            vec![
                Token::TyList,
                Token::Ident("a".into()),
                Token::Eq,
                Token::LBracket,
                Token::IntLit(1),
                Token::Comma,
                Token::Minus,
                Token::IntLit(2),
                Token::RBracket,
                Token::Semi,
            ]
        );
    }

    #[test]
    fn test_tokenize_spans() {
        let tokens = tokenize("int x").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 3));
        assert_eq!(tokens[1].1, Span::new(4, 5));
    }

    #[test]
    fn test_tokenize_skips_comments() {
        assert_eq!(kinds("x // note\n# other\ny"), vec![Token::Ident("x".into()), Token::Ident("y".into())]);
    }

    #[test]
    fn test_tokenize_error() {
        let err = tokenize("int x = 1 $").unwrap_err();
        assert!(err.message().contains('$'));
        assert_eq!(err.span(), Some(Span::new(10, 11)));
    }
}
