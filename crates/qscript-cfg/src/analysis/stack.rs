//! Argument stack tracking during a backward scan.

use rustc_hash::FxHashSet;

use qscript_ir::{Instruction, OpClass, PushSource, StackInteraction};

use super::{Solver, Step, Target};
use crate::graph::BlockId;
use crate::value_set::ValueSet;

impl Solver<'_> {
    /// Effect of `instruction` on the argument stack slot `position` slots
    /// below the top.
    ///
    /// Walking backwards, a push either is the slot we want or moves the slot
    /// one closer to the top. An instruction that pops its arguments hides
    /// that many slots.
    pub(super) fn stack_effect(
        &mut self,
        path: &FxHashSet<BlockId>,
        block: BlockId,
        index: usize,
        instruction: &Instruction,
        position: usize,
    ) -> Step {
        let opcode = instruction.opcode;
        match opcode.class {
            OpClass::ArgPush(source) if position == 0 => {
                Step::Found(self.pushed_value(path, block, index, instruction, source))
            }
            OpClass::ArgPush(_) => Step::Continue(Target::Stack(position - 1)),
            _ if opcode.stack == StackInteraction::Pop => {
                Step::Continue(Target::Stack(position + opcode.popped_args()))
            }
            _ => Step::Continue(Target::Stack(position)),
        }
    }

    fn pushed_value(
        &mut self,
        path: &FxHashSet<BlockId>,
        block: BlockId,
        index: usize,
        instruction: &Instruction,
        source: PushSource,
    ) -> ValueSet {
        let Some(arg) = instruction.int_arg(0) else {
            return ValueSet::all();
        };
        match source {
            PushSource::Register => self.find(path, block, index, Target::Register(arg)),
            PushSource::Literal(_) => ValueSet::of(arg),
            PushSource::RegisterAddress | PushSource::LabelAddress | PushSource::String => {
                ValueSet::all()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use qscript_ir::*;

    use crate::analysis::stack_value;
    use crate::graph::ControlFlowGraph;
    use crate::value_set::ValueSet;

    fn stack_at(ir: &BytecodeIr, segment: usize, index: usize, position: usize) -> ValueSet {
        let cfg = ControlFlowGraph::create(ir);
        stack_value(&cfg, ir, InstructionRef::new(segment, index), position)
    }

    #[test]
    fn test_literal_pushes() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_ARG_PUSHL, &[3])
            .op(&OP_ARG_PUSHW, &[150])
            .op(&OP_SET_FLOOR_HANDLER, &[])
            .op(&OP_RET, &[])
            .segment(&[150])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(stack_at(&ir, 0, 2, 0), ValueSet::of(150));
        assert_eq!(stack_at(&ir, 0, 2, 1), ValueSet::of(3));
        assert!(stack_at(&ir, 0, 2, 2).is_empty());
    }

    #[test]
    fn test_register_push_resolves_register() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[60, 4])
            .op(&OP_ARG_PUSHR, &[60])
            .op(&OP_LETI, &[60, 9])
            .op(&OP_ARG_PUSHL, &[1])
            .op(&OP_SET_FLOOR_HANDLER, &[])
            .op(&OP_RET, &[])
            .segment(&[1])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        // The register is read at the push, before it is overwritten.
        assert_eq!(stack_at(&ir, 0, 4, 1), ValueSet::of(4));
    }

    #[test]
    fn test_popping_instruction_hides_slots() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_ARG_PUSHL, &[7])
            .op(&OP_ARG_PUSHL, &[1])
            .op(&OP_ARG_PUSHL, &[2])
            .op(&OP_P_DEAD_V3, &[])
            .op(&OP_ARG_PUSHB, &[5])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(stack_at(&ir, 0, 5, 0), ValueSet::of(5));
        assert_eq!(stack_at(&ir, 0, 5, 1), ValueSet::of(7));
    }

    #[test]
    fn test_address_pushes_are_unknown() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_ARG_PUSHA, &[3])
            .instr(&OP_ARG_PUSHS, vec![Arg::from("hello")])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert!(stack_at(&ir, 0, 2, 0).is_all());
        assert!(stack_at(&ir, 0, 2, 1).is_all());
    }

    #[test]
    fn test_pushes_across_blocks() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_ARG_PUSHL, &[11])
            .op(&OP_JMP, &[1])
            .segment(&[1])
            .op(&OP_ARG_PUSHL, &[12])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(stack_at(&ir, 1, 1, 0), ValueSet::of(12));
        assert_eq!(stack_at(&ir, 1, 1, 1), ValueSet::of(11));
    }
}
