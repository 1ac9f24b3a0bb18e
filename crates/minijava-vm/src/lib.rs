//! Stack virtual machine for the bytecode container.
//!
//! # Architecture
//!
//! - [`Vm`] owns the loaded program, a data stack of 64-bit signed values,
//!   a stack of activation records, an object heap, and an array heap. Both
//!   heaps grow monotonically; references are 1-based indices and 0 is the
//!   null reference.
//! - [`RuntimeError`] captures every trap condition (stack underflow, null
//!   receiver, bounds violation, division by zero); a trap halts execution
//!   and surfaces as a non-zero process exit in the CLI.
//!
//! Execution is strictly synchronous: `CALL` pushes the current activation
//! and `RET` restores it, so every call is matched by exactly one return.

pub mod error;
pub mod machine;

pub use error::RuntimeError;
pub use machine::Vm;
