//! Register definitions seen during a backward scan.

use rustc_hash::FxHashSet;
use tracing::warn;

use qscript_ir::{Instruction, InstructionRef, IntOp, OpClass, Operand, ParamKind, PushSource};

use super::{Solver, Target};
use crate::graph::BlockId;
use crate::value_set::ValueSet;

/// Registers a variadic call may receive its arguments in.
const VA_ARG_REGISTERS: std::ops::RangeInclusive<i32> = 1..=7;

impl Solver<'_> {
    /// Effect of `instruction` (at `index` in `block`) on `register`.
    ///
    /// `None` means the instruction leaves the register alone and the scan
    /// goes on.
    pub(super) fn register_effect(
        &mut self,
        path: &FxHashSet<BlockId>,
        block: BlockId,
        index: usize,
        instruction: &Instruction,
        register: i32,
    ) -> Option<ValueSet> {
        let arg = |n| instruction.int_arg(n);
        let writes_target = arg(0) == Some(register);

        match instruction.opcode.class {
            OpClass::Let if writes_target => {
                let source = arg(1)?;
                Some(self.find(path, block, index, Target::Register(source)))
            }
            OpClass::LetImmediate(_) | OpClass::SyncLetImmediate if writes_target => {
                Some(ValueSet::of(arg(1)?))
            }
            OpClass::Set if writes_target => Some(ValueSet::of(1)),
            OpClass::Clear if writes_target => Some(ValueSet::of(0)),
            OpClass::Rev if writes_target => {
                let prev = self.find(path, block, index, Target::Register(register));
                Some(if prev.is_empty() || (prev.size() == 1 && prev.get(0) == Some(0)) {
                    ValueSet::of(1)
                } else if prev.contains(0) {
                    range(0, 1)
                } else {
                    ValueSet::of(0)
                })
            }
            OpClass::Int {
                op: op @ (IntOp::Add | IntOp::Sub | IntOp::Mul | IntOp::Div),
                operand: Operand::Immediate,
            } if writes_target => {
                let scalar = arg(1)?;
                let mut prev = self.find(path, block, index, Target::Register(register));
                match op {
                    IntOp::Add => {
                        prev.scalar_add(scalar);
                    }
                    IntOp::Sub => {
                        prev.scalar_sub(scalar);
                    }
                    IntOp::Mul => {
                        prev.scalar_mul(scalar);
                    }
                    _ => {
                        if prev.scalar_div(scalar).is_err() {
                            return Some(ValueSet::all());
                        }
                    }
                }
                Some(prev)
            }
            OpClass::IfZoneClear if writes_target => Some(range(0, 1)),
            OpClass::GetDifficultyLevel if writes_target => Some(range(0, 2)),
            OpClass::GetSlotNumber if writes_target => Some(range(0, 3)),
            OpClass::GetRandom if arg(1) == Some(register) => {
                let base = arg(0)?;
                let min = self
                    .find(path, block, index, Target::Register(base))
                    .min()
                    .unwrap_or(0);
                let max = self
                    .find(path, block, index, Target::Register(base + 1))
                    .max()
                    .unwrap_or(0)
                    .max(min.saturating_add(1));
                Some(range(min, max - 1))
            }
            OpClass::StackPushMulti | OpClass::StackPopMulti => {
                let (base, count) = (arg(0)?, arg(1)?);
                (base <= register && i64::from(register) < i64::from(base) + i64::from(count))
                    .then(ValueSet::all)
            }
            OpClass::VaCall => {
                let values = self.va_call(path, block, index, register);
                (!values.is_empty()).then_some(values)
            }
            _ => writes_register(instruction, register).then(ValueSet::all),
        }
    }

    /// Values a variadic call leaves in `register`.
    ///
    /// The callee receives the arguments pushed since the last `va_start` of
    /// the block in r1 onwards; unfilled argument registers are zeroed.
    /// Without a `va_start` in the block every argument register is unknown.
    /// Returns an empty set for registers outside that window.
    fn va_call(
        &mut self,
        path: &FxHashSet<BlockId>,
        block: BlockId,
        call_index: usize,
        register: i32,
    ) -> ValueSet {
        if !VA_ARG_REGISTERS.contains(&register) {
            return ValueSet::empty();
        }
        let (ir, cfg) = (self.ir, self.cfg);
        let Some(basic_block) = cfg.block(block) else {
            return ValueSet::empty();
        };

        let mut va_start = None;
        let mut pushes: Vec<&Instruction> = Vec::new();
        for index in basic_block.start..call_index {
            let at = InstructionRef::new(basic_block.segment, index);
            let Some(instruction) = ir.instruction(at) else {
                continue;
            };
            match instruction.opcode.class {
                OpClass::VaStart => {
                    va_start = Some(index);
                    pushes.clear();
                }
                OpClass::ArgPush(_) if va_start.is_some() => pushes.push(instruction),
                _ => {}
            }
        }

        // Without a va_start in the block the pushes feeding the call are
        // outside the analysed range.
        let Some(va_start) = va_start else {
            return ValueSet::all();
        };
        let slot = usize::try_from(register - 1).unwrap_or(usize::MAX);
        let Some(push) = pushes.get(slot) else {
            return ValueSet::of(0);
        };
        match push.opcode.class {
            OpClass::ArgPush(PushSource::Register) => match push.int_arg(0) {
                Some(source) => self.find(path, block, va_start, Target::Register(source)),
                None => ValueSet::all(),
            },
            OpClass::ArgPush(PushSource::Literal(_)) => {
                push.int_arg(0).map_or_else(ValueSet::all, ValueSet::of)
            }
            _ => ValueSet::all(),
        }
    }
}

/// True if any written register tuple of `instruction` covers `register`.
fn writes_register(instruction: &Instruction, register: i32) -> bool {
    instruction
        .opcode
        .params
        .iter()
        .enumerate()
        .any(|(position, param)| {
            let ParamKind::RegTupRef(tuple) = param else {
                return false;
            };
            let Some(base) = instruction.int_arg(position) else {
                return false;
            };
            tuple.iter().zip(base..).any(|(access, reg)| access.writes() && reg == register)
        })
}

fn range(lo: i32, hi: i32) -> ValueSet {
    match ValueSet::of_interval(lo, hi) {
        Ok(values) => values,
        Err(err) => {
            warn!(%err, "bad interval in register analysis");
            ValueSet::all()
        }
    }
}

#[cfg(test)]
mod tests {
    use qscript_ir::*;

    use crate::analysis::register_value;
    use crate::graph::ControlFlowGraph;
    use crate::value_set::ValueSet;

    fn values_at(ir: &BytecodeIr, segment: usize, index: usize, register: u8) -> ValueSet {
        let cfg = ControlFlowGraph::create(ir);
        register_value(&cfg, ir, InstructionRef::new(segment, index), register)
    }

    fn set(lo: i32, hi: i32) -> ValueSet {
        ValueSet::of_interval(lo, hi).unwrap()
    }

    #[test]
    fn test_single_assignment() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[6, 1337])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 1, 6), ValueSet::of(1337));
        assert!(values_at(&ir, 0, 1, 7).is_empty());
    }

    #[test]
    fn test_let_copies_source() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETW, &[2, 77])
            .op(&OP_LET, &[3, 2])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 2, 3), ValueSet::of(77));
    }

    #[test]
    fn test_branch_merge() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_GET_RANDOM, &[10, 11])
            .op(&OP_JMPI_E, &[11, 5, 1])
            .op(&OP_LETI, &[12, 1])
            .op(&OP_JMP, &[2])
            .segment(&[1])
            .op(&OP_LETI, &[12, 2])
            .segment(&[2])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        let values = values_at(&ir, 2, 0, 12);
        assert_eq!(values, set(1, 2));
    }

    #[test]
    fn test_set_clear_rev() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_SET, &[1])
            .op(&OP_CLEAR, &[2])
            .op(&OP_REV, &[1])
            .op(&OP_REV, &[2])
            .op(&OP_REV, &[3])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 2, 1), ValueSet::of(1));
        assert_eq!(values_at(&ir, 0, 5, 1), ValueSet::of(0));
        assert_eq!(values_at(&ir, 0, 5, 2), ValueSet::of(1));
        // Unknown (empty) before rev reads as zero.
        assert_eq!(values_at(&ir, 0, 5, 3), ValueSet::of(1));
    }

    #[test]
    fn test_rev_of_mixed_values() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_GET_DIFFLVL, &[1])
            .op(&OP_REV, &[1])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 2, 1), set(0, 1));
    }

    #[test]
    fn test_scalar_arithmetic() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_GET_SLOTNUMBER, &[1])
            .op(&OP_ADDI, &[1, 10])
            .op(&OP_MULI, &[1, 2])
            .op(&OP_SUBI, &[1, 4])
            .op(&OP_DIVI, &[1, 2])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 2, 1), set(10, 13));
        assert_eq!(values_at(&ir, 0, 3, 1), set(20, 26));
        assert_eq!(values_at(&ir, 0, 4, 1), set(16, 22));
        assert_eq!(values_at(&ir, 0, 5, 1), set(8, 11));
    }

    #[test]
    fn test_division_by_zero_gives_all() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[1, 5])
            .op(&OP_DIVI, &[1, 0])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert!(values_at(&ir, 0, 2, 1).is_all());
    }

    #[test]
    fn test_builtin_ranges() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_IF_ZONE_CLEAR, &[1, 2])
            .op(&OP_GET_DIFFLVL, &[3])
            .op(&OP_GET_SLOTNUMBER, &[4])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 3, 1), set(0, 1));
        assert_eq!(values_at(&ir, 0, 3, 3), set(0, 2));
        assert_eq!(values_at(&ir, 0, 3, 4), set(0, 3));
    }

    #[test]
    fn test_get_random_range() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[20, 5])
            .op(&OP_LETI, &[21, 10])
            .op(&OP_GET_RANDOM, &[20, 30])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 3, 30), set(5, 9));
    }

    #[test]
    fn test_get_random_degenerate_bounds() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[20, 5])
            .op(&OP_LETI, &[21, 2])
            .op(&OP_GET_RANDOM, &[20, 30])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 3, 30), ValueSet::of(5));
    }

    #[test]
    fn test_stack_popm_clobbers_range() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[10, 1])
            .op(&OP_LETI, &[13, 1])
            .op(&OP_STACK_POPM, &[10, 3])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert!(values_at(&ir, 0, 3, 10).is_all());
        assert_eq!(values_at(&ir, 0, 3, 13), ValueSet::of(1));
    }

    #[test]
    fn test_generic_write_clobbers() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[1, 3])
            .op(&OP_LETI, &[2, 4])
            .op(&OP_ADD, &[1, 2])
            .op(&OP_STACK_POP, &[2])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert!(values_at(&ir, 0, 4, 1).is_all());
        assert!(values_at(&ir, 0, 4, 2).is_all());
    }

    #[test]
    fn test_sync_does_not_clobber() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[1, 9])
            .op(&OP_SYNC, &[])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 2, 1), ValueSet::of(9));
    }

    #[test]
    fn test_loop_gives_all() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[1, 0])
            .segment(&[1])
            .op(&OP_ADDI, &[1, 1])
            .op(&OP_JMPI_L, &[1, 10, 1])
            .segment(&[2])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert!(values_at(&ir, 2, 0, 1).is_all());
    }

    #[test]
    fn test_va_call_arguments() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_LETI, &[50, 8])
            .op(&OP_VA_START, &[])
            .op(&OP_ARG_PUSHL, &[42])
            .op(&OP_ARG_PUSHR, &[50])
            .op(&OP_ARG_PUSHA, &[50])
            .op(&OP_VA_CALL, &[1])
            .op(&OP_VA_END, &[])
            .op(&OP_RET, &[])
            .segment(&[1])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert_eq!(values_at(&ir, 0, 6, 1), ValueSet::of(42));
        assert_eq!(values_at(&ir, 0, 6, 2), ValueSet::of(8));
        assert!(values_at(&ir, 0, 6, 3).is_all());
        assert_eq!(values_at(&ir, 0, 6, 4), ValueSet::of(0));
        assert_eq!(values_at(&ir, 0, 6, 50), ValueSet::of(8));
    }

    #[test]
    fn test_va_call_without_va_start_is_unknown() {
        let ir = IrBuilder::new()
            .segment(&[0])
            .op(&OP_ARG_PUSHL, &[42])
            .op(&OP_VA_CALL, &[1])
            .op(&OP_RET, &[])
            .segment(&[1])
            .op(&OP_RET, &[])
            .build()
            .unwrap();
        assert!(values_at(&ir, 0, 2, 1).is_all());
        assert!(values_at(&ir, 0, 2, 7).is_all());
    }
}
