//! Conditional-jump folding.
//!
//! A `CondJump` whose condition is already an immediate always goes the same
//! way. When the condition is zero the jump is taken: it becomes an
//! unconditional `Jump` to its own target. When the condition is non-zero it
//! is never taken: it becomes a `Jump` to the fall-through, which is the
//! following `Jump` instruction's target or the block's current true exit.
//! Either way the trailing `Jump` sibling is dropped and the block is left
//! with a single true exit.

use crate::cfg::{BlockId, Cfg};
use crate::passes::IrPass;
use crate::tac::{Operand, Tac};

pub struct ConditionalJumpFoldingPass;

impl IrPass for ConditionalJumpFoldingPass {
    fn name(&self) -> &'static str {
        "conditional-jump-folding"
    }

    fn run(&mut self, cfg: &mut Cfg) -> bool {
        let mut changed = false;
        for root in cfg.roots().to_vec() {
            for block in cfg.reachable_from(root) {
                changed |= fold_block(cfg, block);
            }
        }
        changed
    }
}

struct FoldDecision {
    index: usize,
    target_label: String,
    target_block: BlockId,
}

fn fold_block(cfg: &mut Cfg, block: BlockId) -> bool {
    let mut changed = false;
    let mut index = 0;

    while index < cfg.block(block).instructions().len() {
        if let Some(decision) = decide(cfg, block, index) {
            apply(cfg, block, decision);
            changed = true;
        }
        index += 1;
    }

    changed
}

fn decide(cfg: &Cfg, block: BlockId, index: usize) -> Option<FoldDecision> {
    let instructions = cfg.block(block).instructions();
    let Tac::CondJump { target, condition } = &instructions[index] else {
        return None;
    };
    let condition = condition.as_immediate()?;

    let target_label = if condition == 0 {
        // Jump taken.
        target.clone()
    } else {
        // Jump not taken: fall through.
        match instructions.get(index + 1) {
            Some(Tac::Jump { target }) => target.clone(),
            _ => cfg
                .true_exit(block)
                .map(|exit| cfg.block_name(exit).to_string())?,
        }
    };

    let target_block = if condition == 0 {
        cfg.false_exit(block)
    } else {
        cfg.true_exit(block)
    }
    .or_else(|| cfg.block_named(&target_label))?;

    Some(FoldDecision {
        index,
        target_label,
        target_block,
    })
}

fn apply(cfg: &mut Cfg, block: BlockId, decision: FoldDecision) {
    let instructions = cfg.block_mut(block).instructions_mut();
    instructions[decision.index] = Tac::Jump {
        target: decision.target_label,
    };
    if matches!(instructions.get(decision.index + 1), Some(Tac::Jump { .. })) {
        instructions.remove(decision.index + 1);
    }
    cfg.set_true_exit(block, decision.target_block);
    cfg.clear_false_exit(block);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// entry: iffalse <cond> goto else; goto then
    /// then: goto join / else: goto join / join: (empty)
    fn diamond(condition: Operand) -> (Cfg, BlockId, BlockId, BlockId) {
        let mut cfg = Cfg::new();
        let entry = cfg.add_method_root("A", "m");
        let then_block = cfg.new_block();
        let else_block = cfg.new_block();
        let join = cfg.new_block();

        cfg.set_current(entry);
        cfg.add_instruction(Tac::CondJump {
            target: cfg.block_name(else_block).to_string(),
            condition,
        });
        cfg.add_instruction(Tac::Jump {
            target: cfg.block_name(then_block).to_string(),
        });
        cfg.set_true_exit(entry, then_block);
        cfg.set_false_exit(entry, else_block);

        for arm in [then_block, else_block] {
            cfg.set_current(arm);
            cfg.add_instruction(Tac::Jump {
                target: cfg.block_name(join).to_string(),
            });
            cfg.set_true_exit(arm, join);
        }

        (cfg, entry, then_block, else_block)
    }

    #[test]
    fn zero_condition_folds_to_the_false_arm() {
        let (mut cfg, entry, _, else_block) = diamond(Operand::Imm(0));

        let mut pass = ConditionalJumpFoldingPass;
        assert!(pass.run(&mut cfg));

        let instructions = cfg.block(entry).instructions();
        assert_eq!(instructions.len(), 1);
        assert_eq!(
            instructions[0],
            Tac::Jump {
                target: "block_1".into(),
            }
        );
        assert_eq!(cfg.true_exit(entry), Some(else_block));
        assert_eq!(cfg.false_exit(entry), None);
    }

    #[test]
    fn nonzero_condition_folds_to_the_fall_through() {
        let (mut cfg, entry, then_block, _) = diamond(Operand::Imm(1));

        let mut pass = ConditionalJumpFoldingPass;
        assert!(pass.run(&mut cfg));

        let instructions = cfg.block(entry).instructions();
        assert_eq!(instructions.len(), 1);
        assert_eq!(
            instructions[0],
            Tac::Jump {
                target: "block_0".into(),
            }
        );
        assert_eq!(cfg.true_exit(entry), Some(then_block));
        assert_eq!(cfg.false_exit(entry), None);
    }

    #[test]
    fn symbolic_condition_is_untouched() {
        let (mut cfg, entry, _, _) = diamond(Operand::var("flag"));

        let mut pass = ConditionalJumpFoldingPass;
        assert!(!pass.run(&mut cfg));
        assert_eq!(cfg.block(entry).instructions().len(), 2);
        assert!(cfg.false_exit(entry).is_some());
    }

    #[test]
    fn folding_is_idempotent() {
        let (mut cfg, _, _, _) = diamond(Operand::Imm(0));
        let mut pass = ConditionalJumpFoldingPass;
        assert!(pass.run(&mut cfg));
        assert!(!pass.run(&mut cfg));
    }
}
