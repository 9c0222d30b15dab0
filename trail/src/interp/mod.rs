//! Tree-walking interpreter
//!
//! One [`Interpreter`] value owns all execution state: the scope stack, the
//! context stack, the function registry and the tracer. Every instruction
//! receives it by `&mut`, so several interpreters can coexist.

mod builtins;
mod context;
mod error;
mod eval;
mod exec;
mod functions;
mod guard;
mod scope;
mod tracer;
mod value;

pub use context::{ContextStack, Frame, Status};
pub use error::{ErrorKind, FaultCategory, InterpResult, RuntimeError};
pub use exec::Flow;
pub use functions::{BuiltinFn, Callee, Functions};
pub use guard::{FrameGuard, ScopeGuard};
pub use scope::ScopeStack;
pub use tracer::{Snapshot, TraceId, TraceRecord, TracedVariable, Tracer};
pub use value::{ListRef, Value, VarRef, Variable};

use crate::ast::{Program, Span};
use crate::config::Config;
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use tracing::{debug, info};

/// Stack growth parameters for deep recursion
/// 128KB red zone, 4MB growth
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// In-memory sink for `print`, shared with the caller
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The interpreter
pub struct Interpreter {
    pub(crate) scopes: ScopeStack,
    pub(crate) context: ContextStack,
    pub(crate) functions: Functions,
    pub(crate) tracer: Tracer,
    pub(crate) config: Config,
    /// Current user-function nesting
    pub(crate) call_depth: usize,
    /// Instructions executed so far
    pub(crate) steps: u64,
    pub(crate) output: Box<dyn Write>,
}

impl Interpreter {
    /// Create a new interpreter with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let mut functions = Functions::new();
        builtins::register_builtins(&mut functions);
        Interpreter {
            scopes: ScopeStack::new(),
            context: ContextStack::new(),
            functions,
            tracer: Tracer::new(),
            config,
            call_depth: 0,
            steps: 0,
            output: Box::new(io::stdout()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// Direct access for host extensions; pushes here must be undone
    /// before the calling instruction finishes
    pub fn scopes_mut(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }

    pub fn context(&self) -> &ContextStack {
        &self.context
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Snapshot of the variable currently visible under `name`
    pub fn lookup(&self, name: &str) -> Option<Variable> {
        self.scopes.get(name).map(|var| var.borrow().clone())
    }

    /// Register a host-provided builtin (replaces one of the same name)
    pub fn register_builtin(&mut self, name: impl Into<String>, handler: BuiltinFn) {
        self.functions.register_builtin(name, handler);
    }

    /// Redirect `print` output to a buffer and return a handle to it
    pub fn capture_output(&mut self) -> SharedBuffer {
        let buffer = SharedBuffer::default();
        self.output = Box::new(buffer.clone());
        buffer
    }

    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    /// Run the top-level instruction sequence
    pub fn run(&mut self, program: &Program) -> InterpResult<()> {
        info!(instructions = program.body.len(), "run program");
        match self.run_block(&program.body)? {
            Flow::Next => Ok(()),
            flow => Err(RuntimeError::internal(format!(
                "control signal {flow:?} escaped the program"
            ))),
        }
    }

    /// Call a registered user function with no arguments
    pub fn run_entry(&mut self, name: &str) -> InterpResult<Option<Variable>> {
        let span = self
            .functions
            .user_function(name)
            .map_or_else(Span::default, |func| func.span);
        let status = self.lookup_function(name)?.status();
        debug!(name, ?status, "run entry");
        let frame = Frame::new(status, span).with_detail(name);
        self.framed(frame, |interp| interp.call_by_name(name, Vec::new(), span))
    }

    /// Append trace records for everything changed by the current instruction
    pub(crate) fn record_traces(&mut self, span: Span) {
        let appended = self.tracer.update(self.steps, span);
        if appended == 0 || !self.config.echo_traces {
            return;
        }
        for traced in self.tracer.histories() {
            if let Some(record) = traced.records.last()
                && record.step == self.steps
            {
                let value = serde_json::to_string(&record.value).unwrap_or_default();
                // echo failures are not script errors
                let _ = writeln!(self.output, "[trace] {} = {value}", traced.label);
            }
        }
    }

    /// Drop all variables, user functions and traces; keep builtins and config
    pub fn reset(&mut self) {
        self.scopes.reset();
        self.context = ContextStack::new();
        self.functions.clear_user();
        self.tracer = Tracer::new();
        self.call_depth = 0;
        self.steps = 0;
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
