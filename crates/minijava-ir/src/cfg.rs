//! Basic blocks and the control-flow graph.
//!
//! The graph is a [`StableDiGraph`] whose nodes are [`BasicBlock`]s and whose
//! edges carry an [`ExitKind`]: a block with a single successor uses a `True`
//! edge (fall-through or unconditional jump); a block ending in a conditional
//! jump has both a `True` and a `False` edge. Stable indices let the
//! unreachable-block pass delete nodes without invalidating the rest.
//!
//! Blocks are named: `ClassName.methodName` for method roots, `block_<n>`
//! otherwise. Jump TACs refer to these names, so the graph keeps a name
//! index alongside the node storage.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use crate::tac::Tac;

/// Handle to a basic block in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(NodeIndex);

impl From<NodeIndex> for BlockId {
    fn from(index: NodeIndex) -> Self {
        BlockId(index)
    }
}

/// Which way an edge leaves a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    True,
    False,
}

#[derive(Debug)]
pub struct BasicBlock {
    name: String,
    instructions: Vec<Tac>,
}

impl BasicBlock {
    fn new(name: String) -> Self {
        BasicBlock {
            name,
            instructions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &[Tac] {
        &self.instructions
    }

    pub fn instructions_mut(&mut self) -> &mut Vec<Tac> {
        &mut self.instructions
    }

    pub fn push(&mut self, tac: Tac) {
        self.instructions.push(tac);
    }
}

/// The control-flow graph for a whole program: one root block per method,
/// plus a construction cursor and the temp/block name counters.
#[derive(Debug, Default)]
pub struct Cfg {
    graph: StableDiGraph<BasicBlock, ExitKind>,
    names: HashMap<String, BlockId>,
    roots: Vec<BlockId>,
    current: Option<BlockId>,
    temp_index: u32,
    block_index: u32,
}

impl Cfg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh temporary name, `_t<k>`.
    pub fn temp_name(&mut self) -> String {
        let name = format!("_t{}", self.temp_index);
        self.temp_index += 1;
        name
    }

    /// Fresh anonymous block, named `block_<k>`.
    pub fn new_block(&mut self) -> BlockId {
        let name = format!("block_{}", self.block_index);
        self.block_index += 1;
        self.insert_block(name)
    }

    /// Fresh method root block, named `<ClassName>.<methodName>`.
    pub fn add_method_root(&mut self, class_name: &str, method_name: &str) -> BlockId {
        let id = self.insert_block(format!("{class_name}.{method_name}"));
        self.roots.push(id);
        id
    }

    fn insert_block(&mut self, name: String) -> BlockId {
        let id = BlockId(self.graph.add_node(BasicBlock::new(name.clone())));
        self.names.insert(name, id);
        id
    }

    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    pub fn current(&self) -> Option<BlockId> {
        self.current
    }

    pub fn set_current(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    /// Append an instruction to the current block.
    pub fn add_instruction(&mut self, tac: Tac) {
        debug_assert!(self.current.is_some(), "no current block during lowering");
        if let Some(current) = self.current {
            self.graph[current.0].push(tac);
        }
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.graph[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.graph[id.0]
    }

    pub fn block_name(&self, id: BlockId) -> &str {
        self.graph[id.0].name()
    }

    pub fn block_named(&self, name: &str) -> Option<BlockId> {
        self.names.get(name).copied()
    }

    pub fn set_true_exit(&mut self, from: BlockId, to: BlockId) {
        self.replace_exit(from, to, ExitKind::True);
    }

    pub fn set_false_exit(&mut self, from: BlockId, to: BlockId) {
        self.replace_exit(from, to, ExitKind::False);
    }

    pub fn clear_false_exit(&mut self, from: BlockId) {
        self.remove_exit(from, ExitKind::False);
    }

    fn replace_exit(&mut self, from: BlockId, to: BlockId, kind: ExitKind) {
        self.remove_exit(from, kind);
        self.graph.add_edge(from.0, to.0, kind);
    }

    fn remove_exit(&mut self, from: BlockId, kind: ExitKind) {
        let existing: Vec<_> = self
            .graph
            .edges(from.0)
            .filter(|edge| *edge.weight() == kind)
            .map(|edge| edge.id())
            .collect();
        for edge in existing {
            self.graph.remove_edge(edge);
        }
    }

    pub fn true_exit(&self, from: BlockId) -> Option<BlockId> {
        self.exit(from, ExitKind::True)
    }

    pub fn false_exit(&self, from: BlockId) -> Option<BlockId> {
        self.exit(from, ExitKind::False)
    }

    fn exit(&self, from: BlockId, kind: ExitKind) -> Option<BlockId> {
        self.graph
            .edges(from.0)
            .find(|edge| *edge.weight() == kind)
            .map(|edge| BlockId(edge.target()))
    }

    /// Depth-first preorder from `root`, following the true exit before the
    /// false exit. This is the bytecode emission order.
    pub fn reachable_from(&self, root: BlockId) -> Vec<BlockId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(block) = stack.pop() {
            if !visited.insert(block) {
                continue;
            }
            order.push(block);
            // Pushed false-first so the true exit is visited first.
            if let Some(false_exit) = self.false_exit(block) {
                stack.push(false_exit);
            }
            if let Some(true_exit) = self.true_exit(block) {
                stack.push(true_exit);
            }
        }
        order
    }

    /// Flood-fill from every method root and drop unreached blocks.
    /// Returns `true` when anything was removed.
    pub fn remove_unreachable(&mut self) -> bool {
        let mut reachable = HashSet::new();
        for root in self.roots.clone() {
            for block in self.reachable_from(root) {
                reachable.insert(block);
            }
        }

        let doomed: Vec<BlockId> = self
            .graph
            .node_indices()
            .map(BlockId)
            .filter(|id| !reachable.contains(id))
            .collect();

        for id in &doomed {
            self.names.remove(&self.graph[id.0].name().to_string());
            self.graph.remove_node(id.0);
            if self.current == Some(*id) {
                self.current = None;
            }
        }

        !doomed.is_empty()
    }

    /// Renders every method's blocks as a `digraph` for `output/cfg.dot`.
    pub fn to_graphviz(&self) -> String {
        let mut out = String::from("digraph {\ngraph [splines=ortho]\nnode [shape=box]\n");
        for root in &self.roots {
            for id in self.reachable_from(*root) {
                let block = self.block(id);
                let mut label = format!("[{}]", block.name());
                for tac in block.instructions() {
                    let _ = write!(label, "\\n{tac}");
                }
                let _ = writeln!(out, "\"{}\" [label=\"{label}\"]", block.name());
                if let Some(true_exit) = self.true_exit(id) {
                    let _ = writeln!(
                        out,
                        "\"{}\" -> \"{}\" [xlabel=\"true\"];",
                        block.name(),
                        self.block_name(true_exit)
                    );
                }
                if let Some(false_exit) = self.false_exit(id) {
                    let _ = writeln!(
                        out,
                        "\"{}\" -> \"{}\" [xlabel=\"false\"];",
                        block.name(),
                        self.block_name(false_exit)
                    );
                }
            }
        }
        out.push_str("}\n");
        out
    }
}
