//! Three-address code: one flat instruction with at most three operand
//! positions. Operands are either variable names or signed 64-bit immediates.

use std::fmt;

use serde::{Deserialize, Serialize};

use minijava_syntax::ast::BinaryOp;

/// A value position in a TAC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Var(String),
    Imm(i64),
}

impl Operand {
    pub fn var(name: impl Into<String>) -> Self {
        Operand::Var(name.into())
    }

    /// Placeholder operand produced for nodes that failed to lower.
    pub fn empty() -> Self {
        Operand::Var(String::new())
    }

    pub fn as_immediate(&self) -> Option<i64> {
        match self {
            Operand::Imm(value) => Some(*value),
            Operand::Var(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{name}"),
            Operand::Imm(value) => write!(f, "{value}"),
        }
    }
}

/// A single IR instruction. `CondJump` is "jump if false": control moves to
/// `target` when the condition is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tac {
    Binary {
        op: BinaryOp,
        result: String,
        lhs: Operand,
        rhs: Operand,
    },
    Not {
        result: String,
        value: Operand,
    },
    Copy {
        result: String,
        value: Operand,
    },
    ArrayAccess {
        result: String,
        array: Operand,
        index: Operand,
    },
    ArrayStore {
        array: String,
        index: Operand,
        value: Operand,
    },
    ArrayLength {
        result: String,
        array: Operand,
    },
    New {
        result: String,
        class_name: String,
    },
    NewArray {
        result: String,
        length: Operand,
    },
    Jump {
        target: String,
    },
    CondJump {
        target: String,
        condition: Operand,
    },
    Param {
        value: Operand,
    },
    Call {
        result: String,
        receiver: Operand,
        method: String,
        arg_count: usize,
    },
    Return {
        value: Operand,
    },
    Print {
        value: Operand,
    },
}

impl Tac {
    /// The scalar variable this instruction writes, if any. `ArrayStore`
    /// writes an element, not a variable.
    pub fn defined_variable(&self) -> Option<&str> {
        match self {
            Tac::Binary { result, .. }
            | Tac::Not { result, .. }
            | Tac::Copy { result, .. }
            | Tac::ArrayAccess { result, .. }
            | Tac::ArrayLength { result, .. }
            | Tac::New { result, .. }
            | Tac::NewArray { result, .. }
            | Tac::Call { result, .. } => Some(result),
            _ => None,
        }
    }
}

impl fmt::Display for Tac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tac::Binary {
                op,
                result,
                lhs,
                rhs,
            } => write!(f, "{result} := {lhs} {op} {rhs}"),
            Tac::Not { result, value } => write!(f, "{result} := ! {value}"),
            Tac::Copy { result, value } => write!(f, "{result} := {value}"),
            Tac::ArrayAccess {
                result,
                array,
                index,
            } => write!(f, "{result} := {array}[{index}]"),
            Tac::ArrayStore {
                array,
                index,
                value,
            } => write!(f, "{array}[{index}] := {value}"),
            Tac::ArrayLength { result, array } => write!(f, "{result} := length {array}"),
            Tac::New { result, class_name } => write!(f, "{result} := new {class_name}"),
            Tac::NewArray { result, length } => write!(f, "{result} := new int, {length}"),
            Tac::Jump { target } => write!(f, "goto {target}"),
            Tac::CondJump { target, condition } => {
                write!(f, "iffalse {condition} goto {target}")
            }
            Tac::Param { value } => write!(f, "param {value}"),
            Tac::Call {
                result,
                receiver,
                method,
                arg_count,
            } => write!(f, "{result} := call {method} on {receiver}, {arg_count} args"),
            Tac::Return { value } => write!(f, "return {value}"),
            Tac::Print { value } => write!(f, "print {value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_listing_format() {
        let add = Tac::Binary {
            op: BinaryOp::Add,
            result: "_t0".into(),
            lhs: Operand::var("x"),
            rhs: Operand::Imm(1),
        };
        assert_eq!(add.to_string(), "_t0 := x + 1");

        let jump = Tac::CondJump {
            target: "block_2".into(),
            condition: Operand::var("_t0"),
        };
        assert_eq!(jump.to_string(), "iffalse _t0 goto block_2");

        let call = Tac::Call {
            result: "_t1".into(),
            receiver: Operand::var("this"),
            method: "Foo.run".into(),
            arg_count: 2,
        };
        assert_eq!(call.to_string(), "_t1 := call Foo.run on this, 2 args");
    }

    #[test]
    fn defined_variables() {
        let copy = Tac::Copy {
            result: "x".into(),
            value: Operand::Imm(3),
        };
        assert_eq!(copy.defined_variable(), Some("x"));

        let store = Tac::ArrayStore {
            array: "xs".into(),
            index: Operand::Imm(0),
            value: Operand::Imm(1),
        };
        assert_eq!(store.defined_variable(), None);

        let ret = Tac::Return {
            value: Operand::var("x"),
        };
        assert_eq!(ret.defined_variable(), None);
    }
}
