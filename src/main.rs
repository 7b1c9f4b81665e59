use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;

use cinder::diagnostic::{Diagnostic, SourceFile, ansi::AnsiRenderer, json};
use cinder::{compiler, lexer, parser, vm};

const EXIT_USAGE: u8 = 1;
const EXIT_COMPILE: u8 = 65;
const EXIT_RUNTIME: u8 = 70;

/// Compile and run a cinder script.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Script to run
    file: PathBuf,
    /// Print the token stream and exit
    #[arg(long)]
    tokens: bool,
    /// Print the syntax tree as JSON and exit
    #[arg(long)]
    ast: bool,
    /// Print the bytecode of every function and exit
    #[arg(long)]
    bytecode: bool,
    /// Write the bytecode listing to PATH, then run
    #[arg(long, value_name = "PATH")]
    bytecode_out: Option<PathBuf>,
    /// Trace every instruction to stderr while running
    #[arg(long)]
    trace: bool,
    /// Report errors as JSON objects
    #[arg(long)]
    json: bool,
    /// Disable colored diagnostics (also via NO_COLOR)
    #[arg(long)]
    no_color: bool,
    #[arg(short, long)]
    verbose: bool,
}

/// Where and how diagnostics are written.
struct Reporter {
    file: String,
    source: Rc<SourceFile>,
    json: bool,
    renderer: AnsiRenderer,
}

impl Reporter {
    fn emit(&self, headline: String, diagnostic: Diagnostic) {
        let diagnostic = diagnostic.with_shared_source(Rc::clone(&self.source));
        if self.json {
            eprintln!("{}", json::render(&diagnostic));
        } else {
            eprint!("{}", self.renderer.render(&headline, &diagnostic));
        }
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(EXIT_USAGE) } else { ExitCode::SUCCESS };
        }
    };
    let verbose = args.verbose;
    let info = |msg: &str| {
        if verbose {
            eprintln!("[info] {msg}");
        }
    };

    info(&format!("reading {}", args.file.display()));
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", args.file.display());
            return ExitCode::from(EXIT_USAGE);
        }
    };
    if source.trim().is_empty() {
        info("empty source, nothing to do");
        return ExitCode::SUCCESS;
    }

    let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    let reporter = Reporter {
        file: args.file.display().to_string(),
        source: SourceFile::new(source.as_str()),
        json: args.json,
        renderer: AnsiRenderer { use_color },
    };

    info("lexing");
    let tokens = match lexer::lex(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            reporter.emit(e.report(&reporter.file), Diagnostic::from(&e));
            return ExitCode::from(EXIT_COMPILE);
        }
    };
    if args.tokens {
        for (token, range) in &tokens {
            let (row, col) = reporter.source.map.lookup(range.start);
            println!("{row}:{col}  {}", token.describe());
        }
        return ExitCode::SUCCESS;
    }

    info(&format!("parsing {} tokens", tokens.len()));
    let (ast, errors) = parser::parse(&source, tokens);
    if !errors.is_empty() {
        for e in &errors {
            reporter.emit(e.report(&reporter.file), Diagnostic::from(e));
        }
        return ExitCode::from(EXIT_COMPILE);
    }
    if args.ast {
        return match serde_json::to_string_pretty(&ast) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: cannot serialize syntax tree: {e}");
                ExitCode::from(EXIT_USAGE)
            }
        };
    }

    info("compiling");
    let mut program = match compiler::compile(&ast) {
        Ok(program) => program,
        Err(errors) => {
            for e in &errors {
                reporter.emit(e.report(&reporter.file), Diagnostic::from(e));
            }
            return ExitCode::from(EXIT_COMPILE);
        }
    };
    if args.bytecode {
        print!("{}", program.dump());
        return ExitCode::SUCCESS;
    }
    if let Some(path) = &args.bytecode_out {
        info(&format!("writing bytecode to {}", path.display()));
        if let Err(e) = std::fs::write(path, program.dump()) {
            eprintln!("error: cannot write {}: {e}", path.display());
            return ExitCode::from(EXIT_USAGE);
        }
    }

    info("running");
    match vm::interpret(&mut program, args.trace) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.emit(e.report(&reporter.file), Diagnostic::from(&e));
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}
