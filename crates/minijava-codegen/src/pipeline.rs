//! The staged compilation pipeline: lex → parse → symbol table → type check
//! → IR → passes → emit.
//!
//! Every stage reports through the shared [`DiagnosticSink`]; when a stage
//! leaves errors behind, the following stages refuse to run and the failure
//! surfaces as the matching [`CompileError`] variant, which carries the
//! process exit code the CLI uses (1 lexical, 2 syntax, 4 semantic).

use thiserror::Error;

use minijava_bytecode::BytecodeProgram;
use minijava_ir::cfg::Cfg;
use minijava_ir::lower::generate_ir;
use minijava_ir::passes::default_pass_manager;
use minijava_sema::builder::build_symbol_table;
use minijava_sema::scope::SymbolTable;
use minijava_sema::typecheck::check_types;
use minijava_syntax::ast::Program;
use minijava_syntax::diagnostics::DiagnosticSink;
use minijava_syntax::lexer::Lexer;
use minijava_syntax::parser::{ParseError, Parser};

use crate::emit::{emit_bytecode, EmitError};

/// Options controlling the pipeline. Optimization runs the standard pass
/// pipeline once; turning it off emits the raw lowered CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { optimize: true }
    }
}

/// Everything a successful compilation produces. The CLI serialises
/// `program` and renders the other pieces into the debug dumps.
#[derive(Debug)]
pub struct CompileOutput {
    pub ast: Program,
    pub symbol_table: SymbolTable,
    pub cfg: Cfg,
    pub program: BytecodeProgram,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{count} lexical error(s)")]
    Lexical { count: usize },

    #[error(transparent)]
    Syntax(#[from] ParseError),

    #[error("{count} semantic error(s)")]
    Semantic { count: usize },

    #[error("{count} IR generation error(s)")]
    IrGeneration { count: usize },

    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl CompileError {
    /// Process exit code for the compiler CLI. Code 3 (AST error) is
    /// reserved and never produced.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Lexical { .. } => 1,
            CompileError::Syntax(_) => 2,
            CompileError::Semantic { .. }
            | CompileError::IrGeneration { .. }
            | CompileError::Emit(_) => 4,
        }
    }
}

pub fn compile(
    source: &str,
    sink: &mut dyn DiagnosticSink,
) -> Result<CompileOutput, CompileError> {
    compile_with_options(source, sink, CompileOptions::default())
}

pub fn compile_with_options(
    source: &str,
    sink: &mut dyn DiagnosticSink,
    options: CompileOptions,
) -> Result<CompileOutput, CompileError> {
    // 1. Lex and parse. Lexical errors dominate: the parser ran over a
    //    stream with Invalid tokens dropped, so its verdict is unreliable.
    let lexer = Lexer::new(source, sink);
    let mut parser = Parser::new(lexer);
    let lexical_errors = parser.lexical_error_count();
    let parsed = parser.parse_goal();
    if lexical_errors > 0 {
        return Err(CompileError::Lexical {
            count: lexical_errors,
        });
    }
    let ast = parsed?;
    tracing::debug!(classes = ast.classes.len() + 1, "parsed");

    // 2. Build the symbol table.
    let mut symbol_table = SymbolTable::new();
    let build = build_symbol_table(&ast, &mut symbol_table, sink);
    if !build.ok() {
        return Err(CompileError::Semantic {
            count: build.error_count,
        });
    }

    // 3. Type check.
    let (type_info, check) = check_types(&ast, &mut symbol_table, sink);
    if !check.ok() {
        return Err(CompileError::Semantic {
            count: check.error_count,
        });
    }
    tracing::debug!(typed_nodes = type_info.len(), "type check passed");

    // 4. Lower to the CFG.
    let mut cfg = Cfg::new();
    let lowered = generate_ir(&ast, &mut cfg, &mut symbol_table, &type_info, sink);
    if !lowered.ok() {
        return Err(CompileError::IrGeneration {
            count: lowered.error_count,
        });
    }

    // 5. Optimize.
    if options.optimize {
        let changed = default_pass_manager().run(&mut cfg);
        tracing::debug!(changed, "ir passes");
    }

    // 6. Emit the container.
    let program = emit_bytecode(&cfg, &symbol_table)?;

    Ok(CompileOutput {
        ast,
        symbol_table,
        cfg,
        program,
    })
}
