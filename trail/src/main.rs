//! Trail interpreter CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use trail::error::{report_error, Error};
use trail::{load_program, Config, Interpreter};

#[derive(Parser)]
#[command(name = "trail", version, about = "Trail - an educational interpreter with variable tracing")]
struct Cli {
    /// Log interpreter activity (same as RUST_LOG=trail=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Trail script
    Run {
        /// Source file to run
        file: PathBuf,
        /// Function to call after the top level finishes (default: `main` if defined)
        #[arg(long)]
        entry: Option<String>,
        /// Write trace histories as JSON to this file
        #[arg(long)]
        trace_out: Option<PathBuf>,
        /// Override the maximum call depth
        #[arg(long)]
        max_depth: Option<usize>,
        /// Configuration file (default: ./trail.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Parse and dump AST as JSON (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
    /// Start an interactive session
    Repl,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) if verbose => EnvFilter::new("trail=debug"),
        Err(_) => return,
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Run {
            file,
            entry,
            trace_out,
            max_depth,
            config,
        } => run_file(&file, entry.as_deref(), trace_out.as_deref(), max_depth, config.as_deref()),
        Command::Parse { file } => parse_file(&file),
        Command::Tokens { file } => tokenize_file(&file),
        Command::Repl => start_repl(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_file(
    path: &Path,
    entry: Option<&str>,
    trace_out: Option<&Path>,
    max_depth: Option<usize>,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::discover(config)?;
    if let Some(depth) = max_depth {
        config = config.with_max_call_depth(depth);
    }

    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let outcome = execute(&mut Interpreter::with_config(config), &filename, &source, entry, trace_out);
    if let Err(err) = outcome {
        report_error(&filename, &source, &err)?;
        std::process::exit(1);
    }
    Ok(())
}

fn execute(
    interp: &mut Interpreter,
    filename: &str,
    source: &str,
    entry: Option<&str>,
    trace_out: Option<&Path>,
) -> Result<(), Error> {
    let program = load_program(filename, source)?;
    let outcome = interp.run(&program).map_err(Error::from).and_then(|()| {
        let entry = entry.or_else(|| interp.functions().is_user("main").then_some("main"));
        if let Some(name) = entry {
            let result = interp.run_entry(name)?;
            match result {
                Some(value) => println!("{}", value.value()),
                None => println!("none"),
            }
        }
        Ok(())
    });

    // histories are written even when the script failed part way
    if let Some(out) = trace_out {
        let json = interp
            .tracer()
            .to_json()
            .map_err(|e| trail::CompileError::io_error(e.to_string()))?;
        std::fs::write(out, json)
            .map_err(|e| trail::CompileError::io_error(format!("{}: {e}", out.display())))?;
    }
    outcome
}

fn parse_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let ast = load_program(&filename, &source)?;

    println!("{}", serde_json::to_string_pretty(&ast)?);
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;

    let tokens = trail::lexer::tokenize(&source)?;
    for (tok, span) in &tokens {
        println!("{:?} @ {}..{}", tok, span.start, span.end);
    }

    Ok(())
}

fn start_repl() -> Result<(), Box<dyn std::error::Error>> {
    let mut repl = trail::repl::Repl::new()?;
    repl.run()?;
    Ok(())
}
