//! REPL (Read-Eval-Print Loop) for Trail
//!
//! Statements run against one persistent interpreter, so variables,
//! functions and traces survive between inputs. A line that is not a
//! statement is evaluated as an expression and its value printed.

use crate::interp::Interpreter;
use crate::load_program;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;

const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = ". ";
const HISTORY_FILE: &str = ".trail_history";

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    interpreter: Interpreter,
    history_path: Option<PathBuf>,
    /// Lines of an unfinished block
    pending: String,
}

impl Repl {
    /// Create a new REPL
    pub fn new() -> RlResult<Self> {
        Self::with_interpreter(Interpreter::new())
    }

    pub fn with_interpreter(interpreter: Interpreter) -> RlResult<Self> {
        let editor = DefaultEditor::new()?;

        // Try to find history file in home directory
        let history_path = dirs_home().map(|h| h.join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            interpreter,
            history_path,
            pending: String::new(),
        };

        if let Some(ref path) = repl.history_path {
            let _ = repl.editor.load_history(path);
        }

        Ok(repl)
    }

    /// Run the REPL
    pub fn run(&mut self) -> RlResult<()> {
        println!("Trail REPL v{}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :quit to exit.\n");

        loop {
            let prompt = if self.pending.is_empty() {
                PROMPT
            } else {
                CONTINUATION_PROMPT
            };
            match self.editor.readline(prompt) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(line);

                    if self.pending.is_empty() && line.starts_with(':') {
                        if self.handle_command(line) {
                            break;
                        }
                        continue;
                    }

                    self.feed(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    self.pending.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_path {
            let _ = self.editor.save_history(path);
        }

        Ok(())
    }

    /// Handle REPL commands (starting with :)
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":quit" | ":q" | ":exit" => {
                println!("Goodbye!");
                true
            }
            ":help" | ":h" | ":?" => {
                self.print_help();
                false
            }
            ":clear" => {
                print!("\x1B[2J\x1B[1;1H");
                false
            }
            ":vars" => {
                for line in self.describe_vars() {
                    println!("{line}");
                }
                false
            }
            ":traces" => {
                match self.interpreter.tracer().to_json() {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("Error: {e}"),
                }
                false
            }
            ":reset" => {
                self.interpreter.reset();
                println!("State cleared.");
                false
            }
            _ => {
                println!("Unknown command: {cmd}");
                println!("Type :help for help.");
                false
            }
        }
    }

    /// Print help message
    fn print_help(&self) {
        println!("Trail REPL Commands:");
        println!("  :help, :h, :?   Show this help");
        println!("  :quit, :q       Exit the REPL");
        println!("  :clear          Clear the screen");
        println!("  :vars           List visible variables");
        println!("  :traces         Dump trace histories as JSON");
        println!("  :reset          Forget variables, functions and traces");
        println!();
        println!("You can enter:");
        println!("  - Statements: int x = 1;  x = x + 1;  trace(x);");
        println!("  - Blocks over several lines: while x < 3 {{ ... }}");
        println!("  - Expressions: x * 2");
        println!();
        println!("Built-in functions:");
        println!("  print(a, ...)   Print values separated by spaces");
        println!("  len(x)          Length of a list or string");
        println!("  append(l, v)    Push v onto list l");
        println!("  copy(l)         Independent copy of list l");
        println!("  str(x)          String form of any value");
        println!("  assert(cond)    Fail unless cond is true");
    }

    /// `name: type = value` for every visible variable, sorted by name
    fn describe_vars(&self) -> Vec<String> {
        let scopes = self.interpreter.scopes();
        let mut names = scopes.visible_names();
        names.sort_unstable();
        names
            .into_iter()
            .filter_map(|name| {
                let var = scopes.get(name)?;
                let var = var.borrow();
                let traced = if var.is_traced() { " (traced)" } else { "" };
                Some(if var.is_assigned() {
                    format!("{name}: {} = {}{traced}", var.ty(), var.value())
                } else {
                    format!("{name}: {} (unassigned){traced}", var.ty())
                })
            })
            .collect()
    }

    /// Buffer a line; run the buffer once its braces balance
    fn feed(&mut self, line: &str) {
        if !self.pending.is_empty() {
            self.pending.push('\n');
        }
        self.pending.push_str(line);
        if brace_depth(&self.pending) > 0 {
            return;
        }
        let input = std::mem::take(&mut self.pending);
        self.eval_input(&input);
    }

    /// Run input as statements, falling back to printing it as an expression
    fn eval_input(&mut self, input: &str) {
        if let Err(message) = self.eval_source(input) {
            let as_print = format!("print({input});");
            if self.eval_source(&as_print).is_err() {
                eprintln!("{message}");
            }
        }
    }

    fn eval_source(&mut self, source: &str) -> Result<(), String> {
        let program = load_program("<repl>", source).map_err(|e| e.to_string())?;
        if let Err(err) = self.interpreter.run(&program) {
            // reported here so the expression fallback does not run it twice
            eprintln!("{err}");
            for frame in &err.backtrace {
                eprintln!("  in {frame}");
            }
        }
        Ok(())
    }
}

/// Unclosed `{` count, ignoring braces inside string literals
fn brace_depth(source: &str) -> i64 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in source.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            _ => {}
        }
    }
    depth
}

fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Value;

    fn repl() -> Repl {
        Repl::new().expect("Failed to create REPL")
    }

    #[test]
    fn test_handle_command_quit() {
        let mut repl = repl();
        assert!(repl.handle_command(":quit"));
        assert!(repl.handle_command(":q"));
        assert!(repl.handle_command(":exit"));
    }

    #[test]
    fn test_handle_command_non_quit() {
        let mut repl = repl();
        assert!(!repl.handle_command(":help"));
        assert!(!repl.handle_command(":vars"));
        assert!(!repl.handle_command(":unknown"));
    }

    #[test]
    fn test_state_persists_between_inputs() {
        let mut repl = repl();
        repl.feed("int x = 1;");
        repl.feed("x = x + 41;");
        let x = repl.interpreter.lookup("x").unwrap();
        assert_eq!(x.value(), &Value::Int(42));
    }

    #[test]
    fn test_multiline_block_waits_for_close() {
        let mut repl = repl();
        repl.feed("int n = 0;");
        repl.feed("while n < 3 {");
        assert!(!repl.pending.is_empty());
        repl.feed("n = n + 1;");
        repl.feed("}");
        assert!(repl.pending.is_empty());
        assert_eq!(repl.interpreter.lookup("n").unwrap().value(), &Value::Int(3));
    }

    #[test]
    fn test_runtime_error_keeps_state() {
        let mut repl = repl();
        repl.feed("int x = 1;");
        repl.feed("int x = 2;");
        assert_eq!(repl.interpreter.lookup("x").unwrap().value(), &Value::Int(1));
        assert_eq!(repl.interpreter.context().depth(), 0);
    }

    #[test]
    fn test_describe_vars() {
        let mut repl = repl();
        repl.feed("int b = 2; string a;");
        repl.feed("trace(b);");
        assert_eq!(
            repl.describe_vars(),
            vec!["a: string (unassigned)", "b: int = 2 (traced)"]
        );
    }

    #[test]
    fn test_reset() {
        let mut repl = repl();
        repl.feed("int x = 1;");
        repl.handle_command(":reset");
        assert!(repl.interpreter.lookup("x").is_none());
    }

    #[test]
    fn test_brace_depth() {
        assert_eq!(brace_depth("while x { if y {"), 2);
        assert_eq!(brace_depth("print(\"{\");"), 0);
        assert_eq!(brace_depth("}"), -1);
    }

    #[test]
    fn test_dirs_home_returns_some() {
        // HOME (or USERPROFILE) is set in test environments
        assert!(dirs_home().is_some());
    }
}
