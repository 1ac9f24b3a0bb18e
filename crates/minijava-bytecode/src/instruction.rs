//! A bytecode instruction: an opcode plus at most one parameter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::opcode::{Opcode, ParamKind};

/// The three instruction shapes: pure stack instruction, integer parameter
/// (`CONST`), string parameter (jump targets, variable names, class names).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Stack(Opcode),
    Int(Opcode, i64),
    Str(Opcode, String),
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Stack(opcode)
            | Instruction::Int(opcode, _)
            | Instruction::Str(opcode, _) => *opcode,
        }
    }

    /// Whether the carried parameter matches the opcode's wire shape.
    pub fn is_well_formed(&self) -> bool {
        let expected = self.opcode().param_kind();
        match self {
            Instruction::Stack(_) => expected == ParamKind::None,
            Instruction::Int(_, _) => expected == ParamKind::Int,
            Instruction::Str(_, _) => expected == ParamKind::Str,
        }
    }

    pub fn int_param(&self) -> Option<i64> {
        match self {
            Instruction::Int(_, value) => Some(*value),
            _ => None,
        }
    }

    pub fn str_param(&self) -> Option<&str> {
        match self {
            Instruction::Str(_, name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Stack(opcode) => write!(f, "{}", opcode.mnemonic()),
            Instruction::Int(opcode, value) => write!(f, "{}\t{value}", opcode.mnemonic()),
            Instruction::Str(opcode, name) => write!(f, "{}\t{name}", opcode.mnemonic()),
        }
    }
}
