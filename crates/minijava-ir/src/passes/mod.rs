//! IR passes and their manager.
//!
//! A pass reports whether it changed the graph; the manager runs its passes
//! once each, in registration order, and reports the disjunction.

mod constant_folding;
mod jump_folding;
mod unreachable;

pub use constant_folding::ConstantFoldingPass;
pub use jump_folding::ConditionalJumpFoldingPass;
pub use unreachable::UnreachableBlockEliminationPass;

use crate::cfg::Cfg;

pub trait IrPass {
    fn name(&self) -> &'static str;

    /// Returns `true` iff the pass changed the graph.
    fn run(&mut self, cfg: &mut Cfg) -> bool;
}

#[derive(Default)]
pub struct IrPassManager {
    passes: Vec<Box<dyn IrPass>>,
}

impl IrPassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: Box<dyn IrPass>) {
        self.passes.push(pass);
    }

    pub fn run(&mut self, cfg: &mut Cfg) -> bool {
        let mut changed = false;
        for pass in &mut self.passes {
            let pass_changed = pass.run(cfg);
            tracing::debug!(pass = pass.name(), changed = pass_changed, "ir pass");
            changed |= pass_changed;
        }
        changed
    }
}

/// The standard optimization pipeline: fold constants, fold the conditional
/// jumps those constants decide, then drop the blocks that became dead.
pub fn default_pass_manager() -> IrPassManager {
    let mut manager = IrPassManager::new();
    manager.add_pass(Box::new(ConstantFoldingPass));
    manager.add_pass(Box::new(ConditionalJumpFoldingPass));
    manager.add_pass(Box::new(UnreachableBlockEliminationPass));
    manager
}
