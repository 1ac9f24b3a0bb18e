//! MiniJava bytecode VM CLI.
//!
//! Loads a `prog.bc` container and interprets it. `println` output goes to
//! standard out; exit code 0 on `STOP`, 1 on any runtime fault.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use minijava_bytecode::BytecodeProgram;
use minijava_vm::Vm;

/// MiniJava bytecode interpreter.
#[derive(Parser)]
#[command(name = "mjvm", about = "MiniJava bytecode interpreter")]
struct Cli {
    /// Bytecode container produced by the compiler.
    program: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let file = match File::open(&cli.program) {
        Ok(file) => file,
        Err(error) => {
            eprintln!("Error: unable to open {}: {error}", cli.program.display());
            return 1;
        }
    };

    let program = match BytecodeProgram::deserialize(BufReader::new(file)) {
        Ok(program) => program,
        Err(error) => {
            eprintln!("Error: malformed bytecode container: {error}");
            return 1;
        }
    };
    tracing::debug!(methods = program.methods().len(), "container loaded");

    let mut vm = match Vm::new(&program) {
        Ok(vm) => vm,
        Err(error) => {
            eprintln!("VM error: {error}");
            return 1;
        }
    };

    let mut stdout = std::io::stdout();
    match vm.run(&mut stdout) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("VM error: {error}");
            1
        }
    }
}
