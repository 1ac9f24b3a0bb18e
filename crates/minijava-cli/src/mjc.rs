//! MiniJava compiler CLI.
//!
//! Compiles a source file (or standard input) and, on success, writes the
//! artifacts into the output directory: `tree.dot`, `st.dot`, `cfg.dot`,
//! `bytecode.txt`, and the binary container `prog.bc`.
//!
//! Exit codes: 0 success, 1 lexical error (or I/O failure), 2 syntax error,
//! 4 semantic error. Diagnostics stream to standard error as they are
//! emitted.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use minijava_codegen::{compile, CompileOutput};
use minijava_syntax::diagnostics::StreamSink;
use minijava_syntax::graphviz::ast_to_dot;
use minijava_syntax::source::SourceBuffer;

/// MiniJava compiler.
#[derive(Parser)]
#[command(name = "mjc", about = "MiniJava compiler")]
struct Cli {
    /// Source file; standard input when omitted.
    source: Option<PathBuf>,

    /// Directory for the generated artifacts.
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let source = match read_source(cli.source.as_deref()) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Error: {error}");
            return 1;
        }
    };

    let mut sink = StreamSink::stderr();
    let output = match compile(source.as_str(), &mut sink) {
        Ok(output) => output,
        Err(error) => {
            eprintln!("Compilation failed: {error}");
            return error.exit_code();
        }
    };

    match write_artifacts(&output, &cli.output_dir) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("Error: {error}");
            1
        }
    }
}

fn read_source(path: Option<&Path>) -> std::io::Result<SourceBuffer> {
    match path {
        Some(path) => SourceBuffer::from_file(path),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok(SourceBuffer::from_string(source))
        }
    }
}

fn write_artifacts(output: &CompileOutput, directory: &Path) -> std::io::Result<()> {
    fs::create_dir_all(directory)?;

    fs::write(directory.join("tree.dot"), ast_to_dot(&output.ast))?;
    fs::write(directory.join("st.dot"), output.symbol_table.to_graphviz())?;
    fs::write(directory.join("cfg.dot"), output.cfg.to_graphviz())?;
    fs::write(directory.join("bytecode.txt"), output.program.to_string())?;

    let container = fs::File::create(directory.join("prog.bc"))?;
    output
        .program
        .serialize(container)
        .map_err(|error| std::io::Error::other(error.to_string()))?;

    tracing::debug!(directory = %directory.display(), "artifacts written");
    Ok(())
}
