pub mod cfg;
pub mod lower;
pub mod passes;
pub mod tac;

// Re-export commonly used types
pub use cfg::{BasicBlock, BlockId, Cfg, ExitKind};
pub use lower::generate_ir;
pub use passes::{default_pass_manager, ConditionalJumpFoldingPass, ConstantFoldingPass,
    IrPass, IrPassManager, UnreachableBlockEliminationPass};
pub use tac::{Operand, Tac};
