//! Pointers to instructions inside a program.

use std::fmt;

use crate::bytecode::BytecodeIr;
use crate::instruction::Instruction;

/// A `(segment, instruction)` position in a [`BytecodeIr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionRef {
    pub segment: usize,
    pub index: usize,
}

impl InstructionRef {
    #[must_use]
    pub const fn new(segment: usize, index: usize) -> Self {
        Self { segment, index }
    }

    /// First instruction of a segment.
    #[must_use]
    pub const fn start_of(segment: usize) -> Self {
        Self { segment, index: 0 }
    }

    /// Resolve the reference against `ir`.
    #[must_use]
    pub fn instruction(self, ir: &BytecodeIr) -> Option<&Instruction> {
        ir.instruction(self)
    }

    /// The instruction executed after this one when control falls through.
    ///
    /// Moves within the segment, then into the following segment if it also
    /// holds instructions. Empty instruction segments are skipped. Returns
    /// `None` at the end of the program or before a data/string segment.
    #[must_use]
    pub fn next(self, ir: &BytecodeIr) -> Option<Self> {
        let segment = ir.instruction_segment(self.segment)?;
        if self.index + 1 < segment.len() {
            return Some(Self::new(self.segment, self.index + 1));
        }

        Self::entry(ir, self.segment + 1)
    }

    /// First instruction run when control enters `segment`.
    ///
    /// An empty instruction segment passes control on to the segment after
    /// it, the same way falling through does. Returns `None` when no
    /// instruction is reached before the end of the program or a
    /// data/string segment.
    #[must_use]
    pub fn entry(ir: &BytecodeIr, segment: usize) -> Option<Self> {
        let mut current = segment;
        loop {
            if !ir.instruction_segment(current)?.is_empty() {
                return Some(Self::start_of(current));
            }
            current += 1;
        }
    }
}

impl fmt::Display for InstructionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment, self.index)
    }
}
