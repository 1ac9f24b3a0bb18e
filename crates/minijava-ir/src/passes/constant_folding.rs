//! Per-block constant folding.
//!
//! Walks each block's instructions in order with a local environment mapping
//! variable names to known constant values. Known variables are substituted
//! into operand positions (only when the value fits a 32-bit signed
//! immediate), pure operators over two constants collapse into a `Copy`, and
//! any other write invalidates its target. A method call clears the whole
//! environment: callees may touch anything through the heap.
//!
//! Integer semantics are two's-complement wrapping; division by zero is
//! never folded, the instruction stays for the VM to trap on.

use std::collections::{HashMap, HashSet};

use minijava_syntax::ast::BinaryOp;

use crate::cfg::Cfg;
use crate::passes::IrPass;
use crate::tac::{Operand, Tac};

type ConstantEnvironment = HashMap<String, i64>;

pub struct ConstantFoldingPass;

impl IrPass for ConstantFoldingPass {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&mut self, cfg: &mut Cfg) -> bool {
        let mut changed = false;
        let mut visited = HashSet::new();
        for root in cfg.roots().to_vec() {
            for block in cfg.reachable_from(root) {
                if !visited.insert(block) {
                    continue;
                }
                changed |= fold_block(cfg.block_mut(block).instructions_mut());
            }
        }
        changed
    }
}

fn fold_block(instructions: &mut [Tac]) -> bool {
    let mut environment = ConstantEnvironment::new();
    let mut changed = false;

    for instruction in instructions {
        changed |= substitute(instruction, &environment);

        if let Some(folded) = try_fold(instruction, &environment) {
            if let Ok(immediate) = i32::try_from(folded) {
                let result = instruction
                    .defined_variable()
                    .map(str::to_string)
                    .unwrap_or_default();
                *instruction = Tac::Copy {
                    result: result.clone(),
                    value: Operand::Imm(i64::from(immediate)),
                };
                environment.insert(result, folded);
                changed = true;
                continue;
            }
        }

        match instruction {
            Tac::Call { .. } => environment.clear(),
            Tac::Copy { result, value } => match resolve(value, &environment) {
                Some(constant) => {
                    environment.insert(result.clone(), constant);
                }
                None => {
                    environment.remove(result);
                }
            },
            _ => {
                if let Some(result) = instruction.defined_variable() {
                    environment.remove(result);
                }
            }
        }
    }

    changed
}

/// Rewrites variable operands with known values into immediates. Values
/// outside the 32-bit signed range stay symbolic.
fn substitute(instruction: &mut Tac, environment: &ConstantEnvironment) -> bool {
    match instruction {
        Tac::Binary { lhs, rhs, .. } => {
            let a = substitute_operand(lhs, environment);
            let b = substitute_operand(rhs, environment);
            a | b
        }
        Tac::ArrayAccess { array, index, .. } => {
            let a = substitute_operand(array, environment);
            let b = substitute_operand(index, environment);
            a | b
        }
        Tac::ArrayStore { index, value, .. } => {
            let a = substitute_operand(index, environment);
            let b = substitute_operand(value, environment);
            a | b
        }
        Tac::Not { value, .. }
        | Tac::Copy { value, .. }
        | Tac::Param { value }
        | Tac::Return { value }
        | Tac::Print { value } => substitute_operand(value, environment),
        Tac::ArrayLength { array, .. } => substitute_operand(array, environment),
        Tac::NewArray { length, .. } => substitute_operand(length, environment),
        Tac::CondJump { condition, .. } => substitute_operand(condition, environment),
        Tac::Call { receiver, .. } => substitute_operand(receiver, environment),
        Tac::New { .. } | Tac::Jump { .. } => false,
    }
}

fn substitute_operand(operand: &mut Operand, environment: &ConstantEnvironment) -> bool {
    let Operand::Var(name) = operand else {
        return false;
    };
    let Some(&value) = environment.get(name.as_str()) else {
        return false;
    };
    if i32::try_from(value).is_err() {
        return false;
    }
    *operand = Operand::Imm(value);
    true
}

/// Evaluates pure operators when both operands resolve to constants.
fn try_fold(instruction: &Tac, environment: &ConstantEnvironment) -> Option<i64> {
    match instruction {
        Tac::Binary { op, lhs, rhs, .. } => {
            let lhs = resolve(lhs, environment)?;
            let rhs = resolve(rhs, environment)?;
            fold_binary(*op, lhs, rhs)
        }
        Tac::Not { value, .. } => {
            let value = resolve(value, environment)?;
            Some(if value == 0 { 1 } else { 0 })
        }
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, lhs: i64, rhs: i64) -> Option<i64> {
    let folded = match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div => {
            if rhs == 0 {
                return None;
            }
            lhs.wrapping_div(rhs)
        }
        BinaryOp::Lt => i64::from(lhs < rhs),
        BinaryOp::Gt => i64::from(lhs > rhs),
        BinaryOp::Eq => i64::from(lhs == rhs),
        BinaryOp::And => i64::from(lhs != 0 && rhs != 0),
        BinaryOp::Or => i64::from(lhs != 0 || rhs != 0),
    };
    Some(folded)
}

fn resolve(operand: &Operand, environment: &ConstantEnvironment) -> Option<i64> {
    match operand {
        Operand::Imm(value) => Some(*value),
        Operand::Var(name) => environment.get(name.as_str()).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy(result: &str, value: i64) -> Tac {
        Tac::Copy {
            result: result.into(),
            value: Operand::Imm(value),
        }
    }

    #[test]
    fn folds_arithmetic_chain() {
        let mut instructions = vec![
            Tac::Binary {
                op: BinaryOp::Mul,
                result: "_t0".into(),
                lhs: Operand::Imm(3),
                rhs: Operand::Imm(4),
            },
            Tac::Binary {
                op: BinaryOp::Add,
                result: "_t1".into(),
                lhs: Operand::Imm(2),
                rhs: Operand::var("_t0"),
            },
            Tac::Copy {
                result: "x".into(),
                value: Operand::var("_t1"),
            },
            Tac::Return {
                value: Operand::var("x"),
            },
        ];

        assert!(fold_block(&mut instructions));
        assert_eq!(instructions[0], copy("_t0", 12));
        assert_eq!(instructions[1], copy("_t1", 14));
        assert_eq!(instructions[2], copy("x", 14));
        assert_eq!(
            instructions[3],
            Tac::Return {
                value: Operand::Imm(14),
            }
        );

        // Second run over the folded block reports no change.
        assert!(!fold_block(&mut instructions));
    }

    #[test]
    fn division_by_zero_is_left_alone() {
        let mut instructions = vec![Tac::Binary {
            op: BinaryOp::Div,
            result: "_t0".into(),
            lhs: Operand::Imm(1),
            rhs: Operand::Imm(0),
        }];
        assert!(!fold_block(&mut instructions));
        assert!(matches!(instructions[0], Tac::Binary { .. }));
    }

    #[test]
    fn method_call_clears_the_environment() {
        let mut instructions = vec![
            copy("x", 7),
            Tac::Call {
                result: "_t0".into(),
                receiver: Operand::var("this"),
                method: "Foo.poke".into(),
                arg_count: 0,
            },
            Tac::Binary {
                op: BinaryOp::Add,
                result: "_t1".into(),
                lhs: Operand::var("x"),
                rhs: Operand::Imm(1),
            },
        ];

        fold_block(&mut instructions);
        // `x` may have been rewritten by the callee; the add must survive.
        assert!(matches!(instructions[2], Tac::Binary { .. }));
    }

    #[test]
    fn redefinition_invalidates_known_value(){
        let mut instructions = vec![
            copy("x", 1),
            Tac::ArrayLength {
                result: "x".into(),
                array: Operand::var("xs"),
            },
            Tac::Binary {
                op: BinaryOp::Add,
                result: "_t0".into(),
                lhs: Operand::var("x"),
                rhs: Operand::Imm(1),
            },
        ];
        fold_block(&mut instructions);
        assert!(matches!(instructions[2], Tac::Binary { .. }));
    }

    #[test]
    fn comparisons_fold_to_zero_or_one() {
        let mut instructions = vec![
            Tac::Binary {
                op: BinaryOp::Lt,
                result: "a".into(),
                lhs: Operand::Imm(1),
                rhs: Operand::Imm(2),
            },
            Tac::Binary {
                op: BinaryOp::Eq,
                result: "b".into(),
                lhs: Operand::Imm(3),
                rhs: Operand::Imm(3),
            },
            Tac::Binary {
                op: BinaryOp::And,
                result: "c".into(),
                lhs: Operand::var("a"),
                rhs: Operand::var("b"),
            },
            Tac::Not {
                result: "d".into(),
                value: Operand::var("c"),
            },
        ];

        assert!(fold_block(&mut instructions));
        assert_eq!(instructions[0], copy("a", 1));
        assert_eq!(instructions[1], copy("b", 1));
        assert_eq!(instructions[2], copy("c", 1));
        assert_eq!(instructions[3], copy("d", 0));
    }

    #[test]
    fn values_beyond_i32_are_not_materialized() {
        let big = i64::from(i32::MAX) + 1;
        let mut instructions = vec![
            Tac::Copy {
                result: "x".into(),
                value: Operand::Imm(big),
            },
            Tac::Param {
                value: Operand::var("x"),
            },
        ];
        fold_block(&mut instructions);
        assert_eq!(
            instructions[1],
            Tac::Param {
                value: Operand::var("x"),
            }
        );
    }
}
