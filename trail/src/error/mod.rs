//! Error types and reporting

use crate::ast::Span;
use crate::interp::RuntimeError;
use thiserror::Error;

/// Result type alias for the front end (lexing, parsing, loading)
pub type Result<T> = std::result::Result<T, CompileError>;

/// Error raised before a script starts executing
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Lexer error at {span:?}: {message}")]
    Lexer { message: String, span: Span },

    #[error("Parser error at {span:?}: {message}")]
    Parser { message: String, span: Span },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Config error: {message}")]
    Config { message: String },
}

impl CompileError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } | Self::Parser { span, .. } => Some(*span),
            Self::Io { .. } | Self::Config { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lexer { message, .. }
            | Self::Parser { message, .. }
            | Self::Io { message }
            | Self::Config { message } => message,
        }
    }
}

/// Any failure of the load-and-run pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Compile(e) => e.span(),
            Error::Runtime(e) => e.span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Compile(e) => e.message(),
            Error::Runtime(e) => &e.message,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            Error::Compile(CompileError::Lexer { .. }) => "Lexer",
            Error::Compile(CompileError::Parser { .. }) => "Parser",
            Error::Compile(CompileError::Io { .. }) => "IO",
            Error::Compile(CompileError::Config { .. }) => "Config",
            Error::Runtime(e) if e.is_engine_fault() => "Internal",
            Error::Runtime(_) => "Runtime",
        }
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &Error) -> std::io::Result<()> {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = error.kind_label();
    let range = error.span().map_or(0..0, |s| s.start..s.end);

    let mut report = Report::build(ReportKind::Error, (filename, range.clone()));
    if error.span().is_some() {
        report = report.with_message(format!("{kind} error")).with_label(
            Label::new((filename, range))
                .with_message(error.message())
                .with_color(Color::Red),
        );
    } else {
        report = report.with_message(format!("{kind} error: {}", error.message()));
    }

    if let Error::Runtime(e) = error
        && !e.backtrace.is_empty()
    {
        report = report.with_note(format!("while executing:\n{}", e.backtrace.join("\n")));
    }

    report.finish().eprint((filename, Source::from(source)))
}
