//! Basic blocks and the control flow graph.

use std::fmt;

use metrics::counter;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, trace_span};

use qscript_ir::{BytecodeIr, ControlTransfer, Instruction, InstructionRef, Label};

/// Index of a block in [`ControlFlowGraph::blocks`].
pub type BlockId = usize;

/// How a block ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchType {
    /// Falls through to the next block.
    None,
    Return,
    Jump,
    ConditionalJump,
    Call,
}

impl From<Option<ControlTransfer>> for BranchType {
    fn from(transfer: Option<ControlTransfer>) -> Self {
        match transfer {
            None => Self::None,
            Some(ControlTransfer::Return) => Self::Return,
            Some(ControlTransfer::Jump) => Self::Jump,
            Some(ControlTransfer::ConditionalJump) => Self::ConditionalJump,
            Some(ControlTransfer::Call) => Self::Call,
        }
    }
}

/// Contiguous instruction range `[start, end)` of one segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    pub segment: usize,
    pub start: usize,
    pub end: usize,
    pub branch_type: BranchType,
    /// Labels targeted by the terminating instruction.
    pub branch_labels: Vec<Label>,
    predecessors: Vec<BlockId>,
    successors: Vec<BlockId>,
}

impl BasicBlock {
    const fn new(
        segment: usize,
        start: usize,
        end: usize,
        branch_type: BranchType,
        branch_labels: Vec<Label>,
    ) -> Self {
        Self {
            segment,
            start,
            end,
            branch_type,
            branch_labels,
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    /// Blocks with an edge into this one.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Blocks this one has an edge to.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub const fn contains(&self, at: InstructionRef) -> bool {
        at.segment == self.segment && self.start <= at.index && at.index < self.end
    }

    /// References to the block's instructions in program order.
    pub fn instructions(&self) -> impl DoubleEndedIterator<Item = InstructionRef> + '_ {
        (self.start..self.end).map(|i| InstructionRef::new(self.segment, i))
    }
}

/// Control flow graph over all instruction segments of a program.
#[derive(Clone, Debug, Default)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    instruction_to_block: FxHashMap<InstructionRef, BlockId>,
    label_to_block: FxHashMap<Label, BlockId>,
}

impl ControlFlowGraph {
    /// Build the graph for every instruction segment of `ir`.
    ///
    /// Branches to labels that do not resolve are dropped, leaving the graph
    /// incomplete but usable.
    #[must_use]
    pub fn create(ir: &BytecodeIr) -> Self {
        let _span = trace_span!("cfg_create").entered();
        let mut cfg = Self::default();

        for (segment_index, segment) in ir.instruction_segments() {
            let mut start = 0;
            let last = segment.instructions.len().saturating_sub(1);

            for (index, instruction) in segment.instructions.iter().enumerate() {
                let branch_type = BranchType::from(instruction.opcode.class.control_transfer());
                if branch_type == BranchType::None && index != last {
                    continue;
                }
                cfg.push_block(BasicBlock::new(
                    segment_index,
                    start,
                    index + 1,
                    branch_type,
                    branch_labels(instruction, branch_type),
                ));
                start = index + 1;
            }
        }

        // Labels on empty segments lead to the next block control falls into.
        for (segment_index, segment) in ir.instruction_segments() {
            let Some(block) = InstructionRef::entry(ir, segment_index)
                .and_then(|entry| cfg.instruction_to_block.get(&entry).copied())
            else {
                continue;
            };
            for &label in &segment.labels {
                cfg.label_to_block.insert(label, block);
            }
        }

        cfg.link();
        counter!("qscript_cfg_blocks_total").increment(cfg.blocks.len() as u64);
        debug!(
            blocks = cfg.blocks.len(),
            labels = cfg.label_to_block.len(),
            "built control flow graph"
        );
        cfg
    }

    fn push_block(&mut self, block: BasicBlock) {
        let id = self.blocks.len();
        for at in block.instructions() {
            self.instruction_to_block.insert(at, id);
        }
        self.blocks.push(block);
    }

    fn link(&mut self) {
        let mut calls = Vec::new();

        for id in 0..self.blocks.len() {
            let next = (id + 1 < self.blocks.len()).then_some(id + 1);
            match self.blocks[id].branch_type {
                BranchType::Return => continue,
                BranchType::Call => calls.extend(next.map(|next| (id, next))),
                BranchType::None | BranchType::ConditionalJump => {
                    if let Some(next) = next {
                        self.link_to(id, next);
                    }
                }
                BranchType::Jump => {}
            }

            for i in 0..self.blocks[id].branch_labels.len() {
                let label = self.blocks[id].branch_labels[i];
                match self.label_to_block.get(&label) {
                    Some(&target) => self.link_to(id, target),
                    None => trace!(block = id, label, "unresolved branch label"),
                }
            }
        }

        for (caller, return_to) in calls {
            for i in 0..self.blocks[caller].branch_labels.len() {
                let label = self.blocks[caller].branch_labels[i];
                if let Some(&callee) = self.label_to_block.get(&label) {
                    self.link_returning_blocks(callee, return_to);
                }
            }
        }
    }

    /// Give every `Return` block reachable from `callee` an edge to
    /// `return_to`.
    fn link_returning_blocks(&mut self, callee: BlockId, return_to: BlockId) {
        if self.blocks[callee].branch_type == BranchType::Return {
            self.link_to(callee, return_to);
            return;
        }

        let mut encountered = FxHashSet::default();
        encountered.insert(callee);
        let mut stack = vec![callee];
        while let Some(id) = stack.pop() {
            for i in 0..self.blocks[id].successors.len() {
                let next = self.blocks[id].successors[i];
                if !encountered.insert(next) {
                    continue;
                }
                if self.blocks[next].branch_type == BranchType::Return {
                    self.link_to(next, return_to);
                } else {
                    stack.push(next);
                }
            }
        }
    }

    fn link_to(&mut self, from: BlockId, to: BlockId) {
        if !self.blocks[from].successors.contains(&to) {
            self.blocks[from].successors.push(to);
            self.blocks[to].predecessors.push(from);
        }
    }

    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id)
    }

    /// Block containing the instruction at `at`.
    #[must_use]
    pub fn block_for_instruction(&self, at: InstructionRef) -> Option<BlockId> {
        self.instruction_to_block.get(&at).copied()
    }

    /// First block of the segment carrying `label`.
    #[must_use]
    pub fn block_for_label(&self, label: Label) -> Option<BlockId> {
        self.label_to_block.get(&label).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.blocks.iter().map(|b| b.successors.len()).sum()
    }
}

fn branch_labels(instruction: &Instruction, branch_type: BranchType) -> Vec<Label> {
    match branch_type {
        BranchType::None | BranchType::Return => Vec::new(),
        BranchType::Jump | BranchType::ConditionalJump | BranchType::Call => {
            instruction.instruction_labels()
        }
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, block) in self.blocks.iter().enumerate() {
            write!(
                f,
                "block {id}: segment {} [{}, {}) {:?}",
                block.segment, block.start, block.end, block.branch_type
            )?;
            if !block.branch_labels.is_empty() {
                write!(f, " labels {:?}", block.branch_labels)?;
            }
            writeln!(f, " -> {:?}", block.successors)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qscript_ir::*;

    fn build(f: impl FnOnce(IrBuilder) -> IrBuilder) -> BytecodeIr {
        f(IrBuilder::new()).build().unwrap()
    }

    #[test]
    fn test_single_instruction() {
        let ir = build(|b| b.segment(&[0]).op(&OP_RET, &[]));
        let cfg = ControlFlowGraph::create(&ir);

        assert_eq!(cfg.len(), 1);
        let block = &cfg.blocks()[0];
        assert_eq!((block.start, block.end), (0, 1));
        assert_eq!(block.branch_type, BranchType::Return);
        assert!(block.predecessors().is_empty());
        assert!(block.successors().is_empty());
    }

    #[test]
    fn test_single_unconditional_jump() {
        let ir = build(|b| {
            b.segment(&[0])
                .op(&OP_JMP, &[1])
                .segment(&[1])
                .op(&OP_RET, &[])
        });
        let cfg = ControlFlowGraph::create(&ir);

        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.blocks()[0].branch_type, BranchType::Jump);
        assert_eq!(cfg.blocks()[0].successors(), &[1]);
        assert_eq!(cfg.blocks()[1].predecessors(), &[0]);
    }

    #[test]
    fn test_single_call() {
        let ir = build(|b| {
            b.segment(&[0])
                .op(&OP_CALL, &[100])
                .op(&OP_RET, &[])
                .segment(&[100])
                .op(&OP_RET, &[])
        });
        let cfg = ControlFlowGraph::create(&ir);

        assert_eq!(cfg.len(), 3);
        let [call, ret, callee] = cfg.blocks() else {
            panic!("expected three blocks");
        };
        assert_eq!((call.start, call.end), (0, 1));
        assert_eq!(call.branch_type, BranchType::Call);
        assert_eq!(call.branch_labels, vec![100]);
        assert_eq!(call.successors(), &[2]);

        assert_eq!((ret.start, ret.end), (1, 2));
        assert_eq!(ret.branch_type, BranchType::Return);
        assert_eq!(ret.predecessors(), &[2]);
        assert!(ret.successors().is_empty());

        assert_eq!((callee.start, callee.end), (0, 1));
        assert_eq!(callee.predecessors(), &[0]);
        assert_eq!(callee.successors(), &[1]);
    }

    #[test]
    fn test_conditional_jump_with_fall_through() {
        let ir = build(|b| {
            b.segment(&[0])
                .op(&OP_JMP_G, &[1, 2, 100])
                .op(&OP_NOP, &[])
                .op(&OP_RET, &[])
                .segment(&[100])
                .op(&OP_NOP, &[])
                .op(&OP_RET, &[])
        });
        let cfg = ControlFlowGraph::create(&ir);

        assert_eq!(cfg.len(), 3);
        let [cond, fall, target] = cfg.blocks() else {
            panic!("expected three blocks");
        };
        assert_eq!(cond.branch_type, BranchType::ConditionalJump);
        assert_eq!(cond.successors(), &[1, 2]);
        assert_eq!((fall.start, fall.end), (1, 3));
        assert_eq!(fall.predecessors(), &[0]);
        assert_eq!((target.start, target.end), (0, 2));
        assert_eq!(target.predecessors(), &[0]);
    }

    #[test]
    fn test_switch_jump() {
        let ir = build(|b| {
            b.segment(&[0])
                .op(&OP_SWITCH_JMP, &[10, 1, 2])
                .segment(&[1])
                .op(&OP_RET, &[])
                .segment(&[2])
                .op(&OP_RET, &[])
        });
        let cfg = ControlFlowGraph::create(&ir);

        let switch = &cfg.blocks()[0];
        assert_eq!(switch.branch_labels, vec![1, 2]);
        // Fallthrough and the first target are the same block.
        assert_eq!(switch.successors(), &[1, 2]);
    }

    #[test]
    fn test_nested_returns_link_to_caller() {
        let ir = build(|b| {
            b.segment(&[0])
                .op(&OP_CALL, &[10])
                .op(&OP_NOP, &[])
                .op(&OP_RET, &[])
                .segment(&[10])
                .op(&OP_JMPI_E, &[1, 0, 11])
                .op(&OP_RET, &[])
                .segment(&[11])
                .op(&OP_RET, &[])
        });
        let cfg = ControlFlowGraph::create(&ir);

        let return_to = cfg.block_for_instruction(InstructionRef::new(0, 1)).unwrap();
        let callee_ret = cfg.block_for_instruction(InstructionRef::new(1, 1)).unwrap();
        let other_ret = cfg.block_for_label(11).unwrap();
        assert!(cfg.blocks()[callee_ret].successors().contains(&return_to));
        assert!(cfg.blocks()[other_ret].successors().contains(&return_to));
    }

    #[test]
    fn test_unresolved_label_is_not_an_error() {
        let ir = build(|b| b.segment(&[0]).op(&OP_JMP, &[42]));
        let cfg = ControlFlowGraph::create(&ir);
        assert_eq!(cfg.len(), 1);
        assert!(cfg.blocks()[0].successors().is_empty());
        assert_eq!(cfg.block_for_label(42), None);
    }

    #[test]
    fn test_label_on_empty_segment_resolves_to_next_block() {
        let ir = build(|b| {
            b.segment(&[0])
                .op(&OP_JMP, &[1])
                .segment(&[1])
                .segment(&[2])
                .op(&OP_RET, &[])
                .segment(&[3])
        });
        let cfg = ControlFlowGraph::create(&ir);

        let target = cfg.block_for_label(2).unwrap();
        assert_eq!(cfg.block_for_label(1), Some(target));
        assert_eq!(cfg.blocks()[0].successors(), &[target]);
        assert_eq!(cfg.block_for_label(3), None);
    }

    #[test]
    fn test_every_instruction_in_one_block() {
        let ir = build(|b| {
            b.segment(&[0])
                .op(&OP_LETI, &[1, 2])
                .op(&OP_JMP_ON, &[0, 1])
                .op(&OP_SYNC, &[])
                .op(&OP_CALL, &[0])
                .op(&OP_ADDI, &[1, 1])
                .data(&[5], vec![1])
                .segment(&[6])
                .op(&OP_NOP, &[])
        });
        let cfg = ControlFlowGraph::create(&ir);

        for (segment, instructions) in ir.instruction_segments() {
            for index in 0..instructions.len() {
                let at = InstructionRef::new(segment, index);
                let containing: Vec<_> = cfg.blocks().iter().filter(|b| b.contains(at)).collect();
                assert_eq!(containing.len(), 1, "{at}");
                assert!(cfg.block_for_instruction(at).is_some());
            }
        }
    }
}
