//! Instruction semantics.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use qscript_ir::{
    Episode, FloatOp, Instruction, InstructionRef, IntOp, JumpCondition, Label, OpClass, Operand,
    PushSource, REGISTER_COUNT, StackInteraction, Width,
};

use crate::error::{Result, VmError};
use crate::machine::{HaltReason, VirtualMachine};
use crate::random::Random;
use crate::registers::{REGISTER_SIZE, RegisterFile};
use crate::thread::{ArgKind, PoppedArgs, VARIABLE_STACK_SIZE};

/// Address handed out by `arg_pushs` for the pushed string.
pub(crate) const STRING_ARG_STORE_ADDRESS: u32 = 0x00a9_2700;

/// Bytes reserved for the pushed string; it is stored as UTF-16.
pub(crate) const STRING_ARG_STORE_SIZE: usize = 1024;

/// Label of the segment the game enters first.
const ENTRY_LABEL: Label = 0;

/// Registers `va_call` fills from the argument stack.
const VA_ARG_REGISTERS: std::ops::RangeInclusive<u8> = 1..=7;

const fn to_unsigned(value: i32) -> u32 {
    u32::from_ne_bytes(value.to_ne_bytes())
}

const fn to_signed(value: u32) -> i32 {
    i32::from_ne_bytes(value.to_ne_bytes())
}

fn int(instruction: &Instruction, index: usize) -> Result<i32> {
    instruction.int_arg(index).ok_or(VmError::BadArgument {
        mnemonic: instruction.opcode.mnemonic,
        index,
    })
}

fn reg(instruction: &Instruction, index: usize) -> Result<u8> {
    let value = int(instruction, index)?;
    u8::try_from(value).map_err(|_| VmError::InvalidRegister(i64::from(value)))
}

/// Register `offset` places after `base`.
fn reg_offset(base: u8, offset: i64) -> Result<u8> {
    let index = i64::from(base) + offset;
    u8::try_from(index).map_err(|_| VmError::InvalidRegister(index))
}

/// Floor division, wrapping on `MIN / -1`.
const fn floor_div(a: i32, b: i32) -> i32 {
    let quotient = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        quotient.wrapping_sub(1)
    } else {
        quotient
    }
}

fn int_op(op: IntOp, a: i32, b: i32) -> Result<i32> {
    Ok(match op {
        IntOp::Add => a.wrapping_add(b),
        IntOp::Sub => a.wrapping_sub(b),
        IntOp::Mul => a.wrapping_mul(b),
        IntOp::Div | IntOp::Mod if b == 0 => return Err(VmError::DivisionByZero),
        IntOp::Div => floor_div(a, b),
        IntOp::Mod => a.wrapping_rem(b),
        IntOp::And => a & b,
        IntOp::Or => a | b,
        IntOp::Xor => a ^ b,
        IntOp::Shl => a.wrapping_shl(to_unsigned(b)),
        IntOp::Shr => to_signed(to_unsigned(a).wrapping_shr(to_unsigned(b))),
    })
}

fn float_op(op: FloatOp, a: f32, b: f32) -> Result<f32> {
    Ok(match op {
        FloatOp::Add => a + b,
        FloatOp::Sub => a - b,
        FloatOp::Mul => a * b,
        FloatOp::Div if b == 0.0 => return Err(VmError::DivisionByZero),
        FloatOp::Div => a / b,
    })
}

/// Low byte of a literal.
const fn low_byte(value: i32) -> u8 {
    value.to_le_bytes()[0]
}

/// Low word of a literal.
const fn low_word(value: i32) -> u16 {
    let [lo, hi, _, _] = value.to_le_bytes();
    u16::from_le_bytes([lo, hi])
}

/// `get_random`: scale the 15-bit random value into `[0, hi)`, but never
/// below `low`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn scale_random(value: u32, low: i32, hi: i32) -> i32 {
    let fraction = value as f32 / Random::RANGE as f32;
    let scaled = (f64::from(fraction) * f64::from(hi)).floor() as i32;
    scaled.max(low)
}

impl VirtualMachine {
    /// Execute the instruction at `at` for the current thread.
    pub(crate) fn execute_instruction(&mut self, at: InstructionRef) -> Result<()> {
        let ir = Arc::clone(&self.ir);
        let instruction = ir
            .instruction(at)
            .ok_or(VmError::InvalidState("instruction pointer out of range"))?;
        let opcode = instruction.opcode;
        trace!(%at, %instruction, "dispatch");

        let stack_args = if opcode.stack == StackInteraction::Pop {
            self.pop_args(at, instruction)?
        } else {
            PoppedArgs::default()
        };

        let mut advance = true;
        match opcode.class {
            OpClass::Nop | OpClass::VaStart | OpClass::VaEnd => {}
            OpClass::Return => {
                self.ret()?;
                advance = false;
            }
            OpClass::Sync => {
                let live = self.threads.len();
                self.advance()?;
                // A thread ending at the sync already moved the cursor.
                if self.threads.len() == live {
                    self.thread_idx += 1;
                }
                advance = false;
            }
            OpClass::Exit => {
                debug!(%at, code = stack_args.signed(0), "exit");
                self.halt_with(HaltReason::Exit);
                advance = false;
            }
            OpClass::StartThread => {
                self.start_thread(int(instruction, 0)?)?;
            }
            OpClass::VaCall => {
                self.va_call()?;
                self.call(int(instruction, 0)?)?;
                advance = false;
            }
            OpClass::Jump => {
                self.jump(int(instruction, 0)?)?;
                advance = false;
            }
            OpClass::Call => {
                self.call(int(instruction, 0)?)?;
                advance = false;
            }
            OpClass::ConditionalJump(condition) => {
                let (taken, label) = self.evaluate_condition(instruction, condition)?;
                if taken {
                    self.jump(label)?;
                } else {
                    self.advance()?;
                }
                advance = false;
            }
            OpClass::SwitchJump | OpClass::SwitchCall => {
                let value = self.registers.unsigned(reg(instruction, 0)?);
                let index = usize::try_from(value)
                    .ok()
                    .and_then(|value| value.checked_add(1))
                    .unwrap_or(usize::MAX);
                let label = int(instruction, index)?;
                if opcode.class == OpClass::SwitchJump {
                    self.jump(label)?;
                } else {
                    self.call(label)?;
                }
                advance = false;
            }
            OpClass::Let => {
                let value = self.registers.unsigned(reg(instruction, 1)?);
                self.registers.set_unsigned(reg(instruction, 0)?, value);
            }
            OpClass::LetImmediate(Width::DWord) | OpClass::SyncLetImmediate => {
                self.registers
                    .set_signed(reg(instruction, 0)?, int(instruction, 1)?);
            }
            OpClass::LetImmediate(Width::Word) => {
                self.registers
                    .set_word(reg(instruction, 0)?, low_word(int(instruction, 1)?));
            }
            OpClass::LetImmediate(Width::Byte) => {
                self.registers
                    .set_byte(reg(instruction, 0)?, low_byte(int(instruction, 1)?));
            }
            OpClass::LetAddress => {
                let address = RegisterFile::address(reg(instruction, 1)?);
                self.registers.set_unsigned(reg(instruction, 0)?, address);
            }
            OpClass::Set => self.registers.set_signed(reg(instruction, 0)?, 1),
            OpClass::Clear => self.registers.set_signed(reg(instruction, 0)?, 0),
            OpClass::Rev => {
                let register = reg(instruction, 0)?;
                let value = i32::from(self.registers.signed(register) == 0);
                self.registers.set_signed(register, value);
            }
            OpClass::Int { op, operand } => {
                let register = reg(instruction, 0)?;
                let b = match operand {
                    Operand::Register => self.registers.signed(reg(instruction, 1)?),
                    Operand::Immediate => int(instruction, 1)?,
                };
                let value = int_op(op, self.registers.signed(register), b)?;
                self.registers.set_signed(register, value);
            }
            OpClass::FloatLetImmediate => {
                let value = instruction.float_arg(1).ok_or(VmError::BadArgument {
                    mnemonic: opcode.mnemonic,
                    index: 1,
                })?;
                self.registers.set_float(reg(instruction, 0)?, value);
            }
            OpClass::Float { op, operand } => {
                let register = reg(instruction, 0)?;
                let b = match operand {
                    Operand::Register => self.registers.float(reg(instruction, 1)?),
                    Operand::Immediate => {
                        instruction.float_arg(1).ok_or(VmError::BadArgument {
                            mnemonic: opcode.mnemonic,
                            index: 1,
                        })?
                    }
                };
                let value = float_op(op, self.registers.float(register), b)?;
                self.registers.set_float(register, value);
            }
            OpClass::StackPush => self.push_variables(reg(instruction, 0)?, 1)?,
            OpClass::StackPop => self.pop_variables(reg(instruction, 0)?, 1)?,
            OpClass::StackPushMulti => {
                self.push_variables(reg(instruction, 0)?, int(instruction, 1)?)?;
            }
            OpClass::StackPopMulti => {
                self.pop_variables(reg(instruction, 0)?, int(instruction, 1)?)?;
            }
            OpClass::ArgPush(source) => self.push_arg(instruction, source)?,
            OpClass::GetRandom => {
                let base = reg(instruction, 0)?;
                let low = self.registers.signed(base);
                let hi = self.registers.signed(reg_offset(base, 1)?);
                let value = scale_random(self.random.next_value(), low, hi);
                self.registers.set_signed(reg(instruction, 1)?, value);
            }
            OpClass::MapDesignate | OpClass::MapDesignateEx => {
                let base = reg(instruction, 0)?;
                let variant_offset = if opcode.class == OpClass::MapDesignate { 2 } else { 3 };
                let floor_id = self.registers.signed(base);
                let variant_id = self.registers.signed(reg_offset(base, variant_offset)?);
                self.io.map_designate(floor_id, variant_id);
            }
            OpClass::BbMapDesignate => {
                self.io
                    .map_designate(int(instruction, 0)?, int(instruction, 2)?);
            }
            OpClass::SetFloorHandler => {
                self.io
                    .set_floor_handler(stack_args.signed(0), stack_args.signed(1));
            }
            OpClass::SetEpisode => self.set_episode(at, int(instruction, 0)?),
            OpClass::WindowMessage => {
                if !self.window_msg_open {
                    let message = self.deref_string(stack_args.get(0))?;
                    self.window_msg_open = true;
                    self.io.window_msg(&message);
                }
            }
            OpClass::AddMessage => {
                if self.window_msg_open {
                    let message = self.deref_string(stack_args.get(0))?;
                    self.io.add_msg(&message);
                }
            }
            OpClass::WindowEnd => {
                if self.window_msg_open {
                    self.window_msg_open = false;
                    self.io.winend();
                }
            }
            OpClass::MessageEnd => self.io.mesend(),
            OpClass::PlayerDead => {
                let register = u8::try_from(stack_args.get(0))
                    .map_err(|_| VmError::InvalidRegister(i64::from(stack_args.get(0))))?;
                let dead = self.io.p_dead_v3(stack_args.signed(1));
                self.registers.set_signed(register, i32::from(dead));
            }
            OpClass::LetLabelAddress
            | OpClass::IfZoneClear
            | OpClass::GetDifficultyLevel
            | OpClass::GetSlotNumber
            | OpClass::GetTime => return Err(VmError::NotImplemented(opcode.mnemonic)),
        }

        if advance {
            self.advance()?;
        }
        Ok(())
    }

    /// Take the current thread's pushed arguments for a pop-mode instruction.
    fn pop_args(&mut self, at: InstructionRef, instruction: &Instruction) -> Result<PoppedArgs> {
        let opcode = instruction.opcode;
        let args = self.current_thread_mut()?.arg_stack.pop_args(opcode);
        let expected = opcode.params.len();
        if args.pushed != expected {
            let message = format!(
                "{} expects {expected} pushed arguments, found {}",
                opcode.mnemonic, args.pushed
            );
            warn!(%at, "{message}");
            self.io.warning(&message, Some(at));
        }
        Ok(args)
    }

    fn push_arg(&mut self, instruction: &Instruction, source: PushSource) -> Result<()> {
        let (value, kind) = match source {
            PushSource::Register => (
                self.registers.unsigned(reg(instruction, 0)?),
                ArgKind::DWord,
            ),
            PushSource::Literal(width) => {
                let value = int(instruction, 0)?;
                match width {
                    Width::Byte => (u32::from(low_byte(value)), ArgKind::Byte),
                    Width::Word => (u32::from(low_word(value)), ArgKind::Word),
                    Width::DWord => (to_unsigned(value), ArgKind::DWord),
                }
            }
            PushSource::RegisterAddress => (
                RegisterFile::address(reg(instruction, 0)?),
                ArgKind::DWord,
            ),
            PushSource::LabelAddress => {
                return Err(VmError::NotImplemented(instruction.opcode.mnemonic));
            }
            PushSource::String => {
                let value = instruction.str_arg(0).ok_or(VmError::BadArgument {
                    mnemonic: instruction.opcode.mnemonic,
                    index: 0,
                })?;
                self.string_arg_store = value.chars().take(STRING_ARG_STORE_SIZE / 2).collect();
                (STRING_ARG_STORE_ADDRESS, ArgKind::String)
            }
        };
        self.current_thread_mut()?.arg_stack.push(value, kind)
    }

    fn deref_string(&self, address: u32) -> Result<String> {
        if address == STRING_ARG_STORE_ADDRESS {
            return Ok(self.string_arg_store.clone());
        }
        let address = usize::try_from(address).unwrap_or(usize::MAX);
        if address > 0 && address < REGISTER_COUNT * REGISTER_SIZE {
            return Ok(self.registers.utf16_string_at(address));
        }
        Err(VmError::InvalidRegister(i64::try_from(address).unwrap_or(i64::MAX)))
    }

    /// Whether a conditional jump is taken, and its target.
    fn evaluate_condition(
        &self,
        instruction: &Instruction,
        condition: JumpCondition,
    ) -> Result<(bool, Label)> {
        match condition {
            JumpCondition::AllSet | JumpCondition::AllClear => {
                let label = int(instruction, 0)?;
                let want_set = condition == JumpCondition::AllSet;
                let mut taken = true;
                for index in 1..instruction.args.len() {
                    let value = self.registers.signed(reg(instruction, index)?);
                    if (value != 0) != want_set {
                        taken = false;
                        break;
                    }
                }
                Ok((taken, label))
            }
            JumpCondition::Compare {
                cmp,
                signed,
                operand,
            } => {
                let a = self.registers.signed(reg(instruction, 0)?);
                let b = match operand {
                    Operand::Register => self.registers.signed(reg(instruction, 1)?),
                    Operand::Immediate => int(instruction, 1)?,
                };
                let label = int(instruction, 2)?;
                let taken = if signed {
                    cmp.holds(a, b)
                } else {
                    cmp.holds(to_unsigned(a), to_unsigned(b))
                };
                Ok((taken, label))
            }
        }
    }

    /// Push `count` registers starting at `base` onto the variable stack.
    fn push_variables(&mut self, base: u8, count: i32) -> Result<()> {
        let end = i64::from(base) + i64::from(count);
        if end > 256 {
            return Err(VmError::InvalidRegister(end - 1));
        }
        let count = usize::try_from(count).unwrap_or(0);
        let thread = self.current_thread_mut()?;
        if thread.variable_stack.len() + count > VARIABLE_STACK_SIZE {
            return Err(VmError::VariableStackOverflow);
        }
        for offset in 0..count {
            let register = reg_offset(base, i64::try_from(offset).unwrap_or(i64::MAX))?;
            let value = self.registers.unsigned(register);
            self.current_thread_mut()?.push_variable(value)?;
        }
        Ok(())
    }

    /// Pop `count` values into the registers starting at `base`, last
    /// register first.
    fn pop_variables(&mut self, base: u8, count: i32) -> Result<()> {
        let end = i64::from(base) + i64::from(count);
        if end > 256 {
            return Err(VmError::InvalidRegister(end - 1));
        }
        let count = usize::try_from(count).unwrap_or(0);
        if self.current_thread_mut()?.variable_stack.len() < count {
            return Err(VmError::VariableStackUnderflow);
        }
        for offset in (0..count).rev() {
            let register = reg_offset(base, i64::try_from(offset).unwrap_or(i64::MAX))?;
            let value = self.current_thread_mut()?.pop_variable()?;
            self.registers.set_unsigned(register, value);
        }
        Ok(())
    }

    /// Move the pushed arguments into `r1..=r7`, zeroing the registers
    /// without an argument.
    fn va_call(&mut self) -> Result<()> {
        let thread = self.current_thread_mut()?;
        let values = thread.arg_stack.values().to_vec();
        thread.arg_stack.clear();
        let mut values = values.into_iter();
        for register in VA_ARG_REGISTERS {
            self.registers
                .set_unsigned(register, values.next().unwrap_or(0));
        }
        Ok(())
    }

    fn set_episode(&mut self, at: InstructionRef, code: i32) {
        if self.set_episode_called {
            self.warn_at(at, "calling set_episode more than once is not supported");
            return;
        }
        self.set_episode_called = true;

        let in_entry = self
            .ir
            .segment(at.segment)
            .is_some_and(|segment| segment.has_label(ENTRY_LABEL));
        if !in_entry {
            self.warn_at(
                at,
                &format!("calling set_episode outside of segment {ENTRY_LABEL} is not supported"),
            );
            return;
        }

        match Episode::from_code(code) {
            None => self.warn_at(at, &format!("unknown episode {code}")),
            Some(episode) if episode != self.episode => self.warn_at(
                at,
                &format!(
                    "set_episode {episode} does not match the quest's episode {}",
                    self.episode
                ),
            ),
            Some(_) => {}
        }
    }

    fn warn_at(&mut self, at: InstructionRef, message: &str) {
        warn!(%at, "{message}");
        self.io.warning(message, Some(at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_ops() {
        assert_eq!(int_op(IntOp::Add, i32::MAX, 1), Ok(i32::MIN));
        assert_eq!(int_op(IntOp::Sub, i32::MIN, 4444), Ok(2_147_479_204));
        assert_eq!(int_op(IntOp::Div, -7, 2), Ok(-4));
        assert_eq!(int_op(IntOp::Div, i32::MIN, -1), Ok(i32::MIN));
        assert_eq!(int_op(IntOp::Mod, -7, 2), Ok(-1));
        assert_eq!(int_op(IntOp::Mod, 5, 0), Err(VmError::DivisionByZero));
        assert_eq!(int_op(IntOp::Shr, -1, 28), Ok(0xf));
        assert_eq!(int_op(IntOp::Shl, 1, 33), Ok(2));
    }

    #[test]
    fn test_float_division_by_zero() {
        assert_eq!(float_op(FloatOp::Div, 1.0, 0.0), Err(VmError::DivisionByZero));
        assert_eq!(float_op(FloatOp::Mul, 1.5, 2.0), Ok(3.0));
    }

    #[test]
    fn test_scale_random() {
        assert_eq!(scale_random(0, 5, 10), 5);
        assert_eq!(scale_random(0x4000, 0, 10), 5);
        assert_eq!(scale_random(0x7fff, 0, 10), 9);
    }

    #[test]
    fn test_literal_truncation() {
        assert_eq!(low_byte(0x1234), 0x34);
        assert_eq!(low_word(-1), 0xffff);
    }
}
