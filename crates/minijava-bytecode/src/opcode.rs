//! The VM's opcode set.
//!
//! Byte values are part of the container format: one signed byte each, in
//! the order below. `num_enum` provides the fallible byte-to-opcode
//! conversion used by the deserializer.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Serialize,
    Deserialize)]
#[repr(i8)]
pub enum Opcode {
    Load = 0,
    Const = 1,
    Store = 2,
    Add = 3,
    Sub = 4,
    Mul = 5,
    Div = 6,
    Lt = 7,
    Gt = 8,
    Eq = 9,
    And = 10,
    Or = 11,
    Not = 12,
    Jmp = 13,
    Cjmp = 14,
    Call = 15,
    Ret = 16,
    Print = 17,
    Stop = 18,
    New = 19,
    NewArray = 20,
    ArrayLoad = 21,
    ArrayStore = 22,
    ArrayLength = 23,
}

/// Which parameter shape an opcode carries in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    None,
    Int,
    Str,
}

impl Opcode {
    pub fn param_kind(self) -> ParamKind {
        match self {
            Opcode::Const => ParamKind::Int,
            Opcode::Load
            | Opcode::Store
            | Opcode::Jmp
            | Opcode::Cjmp
            | Opcode::Call
            | Opcode::New => ParamKind::Str,
            _ => ParamKind::None,
        }
    }

    /// Mnemonic used by the human-readable listing.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Load => "ILOAD",
            Opcode::Const => "ICONST",
            Opcode::Store => "ISTORE",
            Opcode::Add => "IADD",
            Opcode::Sub => "ISUB",
            Opcode::Mul => "IMUL",
            Opcode::Div => "IDIV",
            Opcode::Lt => "ILT",
            Opcode::Gt => "IGT",
            Opcode::Eq => "IEQ",
            Opcode::And => "IAND",
            Opcode::Or => "IOR",
            Opcode::Not => "INOT",
            Opcode::Jmp => "GOTO",
            Opcode::Cjmp => "IFFALSE GOTO",
            Opcode::Call => "INVOKEVIRTUAL",
            Opcode::Ret => "IRETURN",
            Opcode::Print => "PRINT",
            Opcode::Stop => "STOP",
            Opcode::New => "NEW",
            Opcode::NewArray => "NEWARRAY",
            Opcode::ArrayLoad => "IALOAD",
            Opcode::ArrayStore => "IASTORE",
            Opcode::ArrayLength => "IALEN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_values_are_stable() {
        assert_eq!(i8::from(Opcode::Load), 0);
        assert_eq!(i8::from(Opcode::Stop), 18);
        assert_eq!(i8::from(Opcode::ArrayLength), 23);
    }

    #[test]
    fn byte_round_trip() {
        for byte in 0i8..=23 {
            let opcode = Opcode::try_from(byte).unwrap();
            assert_eq!(i8::from(opcode), byte);
        }
        assert!(Opcode::try_from(24i8).is_err());
        assert!(Opcode::try_from(-1i8).is_err());
    }

    #[test]
    fn param_kinds() {
        assert_eq!(Opcode::Const.param_kind(), ParamKind::Int);
        assert_eq!(Opcode::Load.param_kind(), ParamKind::Str);
        assert_eq!(Opcode::New.param_kind(), ParamKind::Str);
        assert_eq!(Opcode::Add.param_kind(), ParamKind::None);
        assert_eq!(Opcode::ArrayStore.param_kind(), ParamKind::None);
    }
}
