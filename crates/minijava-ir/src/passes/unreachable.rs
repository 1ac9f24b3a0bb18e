//! Unreachable-block elimination: flood-fill from every method root and drop
//! whatever was never reached, typically the arms orphaned by jump folding.

use crate::cfg::Cfg;
use crate::passes::IrPass;

pub struct UnreachableBlockEliminationPass;

impl IrPass for UnreachableBlockEliminationPass {
    fn name(&self) -> &'static str {
        "unreachable-block-elimination"
    }

    fn run(&mut self, cfg: &mut Cfg) -> bool {
        cfg.remove_unreachable()
    }
}
