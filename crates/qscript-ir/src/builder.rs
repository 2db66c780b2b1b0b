//! Fluent construction of [`BytecodeIr`].

use crate::Label;
use crate::bytecode::BytecodeIr;
use crate::error::{IrError, Result};
use crate::instruction::{Arg, Instruction, SourceLoc};
use crate::opcode::Opcode;
use crate::segment::{DataSegment, InstructionSegment, Segment, StringSegment};

/// Builder for programs.
///
/// Errors are deferred: the first invalid instruction is reported by
/// [`IrBuilder::build`] and later calls are ignored.
#[derive(Default)]
pub struct IrBuilder {
    segments: Vec<Segment>,
    error: Option<IrError>,
}

impl IrBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new instruction segment.
    #[must_use]
    pub fn segment(mut self, labels: &[Label]) -> Self {
        self.segments
            .push(InstructionSegment::new(labels.to_vec(), Vec::new()).into());
        self
    }

    /// Append an instruction with integer arguments.
    #[must_use]
    pub fn op(self, opcode: &'static Opcode, args: &[i32]) -> Self {
        self.instr(opcode, args.iter().copied().map(Arg::Int).collect())
    }

    /// Append an instruction with arbitrary arguments.
    #[must_use]
    pub fn instr(self, opcode: &'static Opcode, args: Vec<Arg>) -> Self {
        self.push(Instruction::new(opcode, args))
    }

    /// Append an instruction carrying a source location.
    #[must_use]
    pub fn instr_at(self, opcode: &'static Opcode, args: Vec<Arg>, loc: SourceLoc) -> Self {
        self.push(Instruction::new(opcode, args).map(|i| i.with_source_loc(loc)))
    }

    fn push(mut self, instruction: Result<Instruction>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let instruction = match instruction {
            Ok(instruction) => instruction,
            Err(err) => {
                self.error = Some(err);
                return self;
            }
        };
        match self.segments.last_mut() {
            Some(Segment::Instructions(segment)) => segment.instructions.push(instruction),
            _ => self.error = Some(IrError::NoOpenSegment),
        }
        self
    }

    /// Append a data segment.
    #[must_use]
    pub fn data(mut self, labels: &[Label], data: Vec<u8>) -> Self {
        self.segments.push(
            DataSegment {
                labels: labels.to_vec(),
                data,
            }
            .into(),
        );
        self
    }

    /// Append a string segment.
    #[must_use]
    pub fn string(mut self, labels: &[Label], value: &str) -> Self {
        self.segments.push(
            StringSegment {
                labels: labels.to_vec(),
                value: value.to_string(),
            }
            .into(),
        );
        self
    }

    /// Finish the program.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while adding instructions.
    pub fn build(self) -> Result<BytecodeIr> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(BytecodeIr::new(self.segments)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::*;
    use crate::segment::SegmentKind;

    #[test]
    fn test_build_program() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[6, 1337])
            .op(&OP_RET, &[])
            .string(&[1], "text")
            .data(&[2, 3], vec![0xff])
            .build()
            .unwrap();

        assert_eq!(ir.segments().len(), 3);
        assert_eq!(ir.segments()[1].kind(), SegmentKind::String);
        assert_eq!(ir.segment_index_by_label(3), Some(2));
        assert_eq!(ir.instruction_count(), 2);
    }

    #[test]
    fn test_first_error_reported() {
        let err = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[6])
            .op(&OP_RET, &[1])
            .build()
            .unwrap_err();
        assert!(matches!(err, IrError::ArgumentCount { mnemonic: "leti", .. }));
    }

    #[test]
    fn test_instruction_without_segment() {
        let err = IrBuilder::new().op(&OP_RET, &[]).build().unwrap_err();
        assert_eq!(err, IrError::NoOpenSegment);

        let err = IrBuilder::new()
            .data(&[0], vec![])
            .op(&OP_RET, &[])
            .build()
            .unwrap_err();
        assert_eq!(err, IrError::NoOpenSegment);
    }

    #[test]
    fn test_source_loc_attached() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .instr_at(&OP_NOP, vec![], SourceLoc::new(3, 5, 3))
            .build()
            .unwrap();
        let inst = ir.instruction(crate::InstructionRef::start_of(0)).unwrap();
        assert_eq!(inst.source_loc, Some(SourceLoc::new(3, 5, 3)));
    }
}
