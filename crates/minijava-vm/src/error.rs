//! Trap conditions that halt the interpreter.

use thiserror::Error;

use minijava_bytecode::Opcode;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("data stack underflow")]
    StackUnderflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("array index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("negative array length {0}")]
    NegativeArrayLength(i64),

    #[error("invalid array reference {0}")]
    InvalidArrayReference(i64),

    #[error("invalid object reference {0}")]
    InvalidObjectReference(i64),

    #[error("'this' is not initialized")]
    NullReceiver,

    #[error("variable '{0}' not found")]
    UnknownVariable(String),

    #[error("field '{0}' not found")]
    UnknownField(String),

    #[error("no such method '{0}'")]
    UnknownMethod(String),

    #[error("no such block '{0}'")]
    UnknownBlock(String),

    #[error("program counter out of bounds in block '{0}'")]
    PcOutOfBounds(String),

    #[error("return without a calling activation")]
    ActivationUnderflow,

    #[error("instruction parameter does not match opcode {0:?}")]
    MalformedInstruction(Opcode),

    #[error("program has no methods")]
    EmptyProgram,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
