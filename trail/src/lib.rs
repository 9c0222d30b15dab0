//! Trail interpreter library
//!
//! An explicitly-typed, dynamically-scoped educational language whose
//! variables can be traced: every change of an observed variable is
//! recorded and can be exported for replay or visualization.

pub mod ast;
pub mod config;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod util;

pub use ast::Span;
pub use config::Config;
pub use error::{CompileError, Error, Result};
pub use interp::Interpreter;

/// Tokenize and parse a whole script
pub fn load_program(filename: &str, source: &str) -> Result<ast::Program> {
    let tokens = lexer::tokenize(source)?;
    parser::parse(filename, source, tokens)
}

/// Parse `source` and run it on `interp`
pub fn run_source(
    interp: &mut Interpreter,
    filename: &str,
    source: &str,
) -> std::result::Result<(), Error> {
    let program = load_program(filename, source)?;
    interp.run(&program)?;
    Ok(())
}
