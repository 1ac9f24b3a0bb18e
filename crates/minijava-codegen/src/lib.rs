//! Bytecode generation for MiniJava programs.
//!
//! This crate closes the compilation pipeline: [`emit`] linearises an
//! optimized CFG into the bytecode container, and [`pipeline`] wires every
//! stage together behind a single [`compile`] entry point with staged error
//! reporting.

pub mod emit;
pub mod pipeline;

pub use emit::{emit_bytecode, EmitError};
pub use pipeline::{compile, compile_with_options, CompileError, CompileOptions, CompileOutput};
