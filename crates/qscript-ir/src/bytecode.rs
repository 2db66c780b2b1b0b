//! Whole-program IR.

use crate::Label;
use crate::instruction::Instruction;
use crate::reference::InstructionRef;
use crate::segment::{InstructionSegment, Segment};

/// Ordered list of segments; the unit of analysis and execution.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BytecodeIr {
    segments: Vec<Segment>,
}

impl BytecodeIr {
    #[must_use]
    pub const fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Instruction segment at `index`, if that segment holds instructions.
    #[must_use]
    pub fn instruction_segment(&self, index: usize) -> Option<&InstructionSegment> {
        self.segment(index).and_then(Segment::as_instructions)
    }

    /// All instruction segments with their segment indices.
    pub fn instruction_segments(&self) -> impl Iterator<Item = (usize, &InstructionSegment)> {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_instructions().map(|s| (i, s)))
    }

    /// Index of the segment carrying `label`. When several segments carry
    /// it, the last one wins.
    #[must_use]
    pub fn segment_index_by_label(&self, label: Label) -> Option<usize> {
        self.segments.iter().rposition(|s| s.has_label(label))
    }

    #[must_use]
    pub fn instruction(&self, at: InstructionRef) -> Option<&Instruction> {
        self.instruction_segment(at.segment)?
            .instructions
            .get(at.index)
    }

    /// Total number of instructions over all instruction segments.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.instruction_segments().map(|(_, s)| s.len()).sum()
    }
}

impl From<Vec<Segment>> for BytecodeIr {
    fn from(segments: Vec<Segment>) -> Self {
        Self::new(segments)
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::IrBuilder;
    use crate::opcode::*;

    #[test]
    fn test_repeated_label_resolves_to_last_segment() {
        let ir = IrBuilder::new()
            .segment(&[7])
            .op(&OP_NOP, &[])
            .segment(&[1, 7])
            .op(&OP_RET, &[])
            .data(&[7], vec![0])
            .segment(&[2])
            .op(&OP_RET, &[])
            .build()
            .unwrap();

        assert_eq!(ir.segment_index_by_label(7), Some(2));
        assert_eq!(ir.segment_index_by_label(1), Some(1));
        assert_eq!(ir.segment_index_by_label(9), None);
    }
}
