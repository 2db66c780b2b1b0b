//! Per-thread execution state.

use std::fmt;

use qscript_ir::{InstructionRef, Opcode};

use crate::error::{Result, VmError};

/// Capacity of the argument stack.
pub const ARG_STACK_SIZE: usize = 8;

/// Capacity of the variable stack used by `stack_push`/`stack_pop`.
pub const VARIABLE_STACK_SIZE: usize = 16;

/// One call frame: the instruction about to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub at: InstructionRef,
}

impl StackFrame {
    #[must_use]
    pub const fn new(at: InstructionRef) -> Self {
        Self { at }
    }
}

/// Type tag of an argument stack slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArgKind {
    Byte,
    Word,
    #[default]
    DWord,
    String,
}

/// Typed values pushed by `arg_push*` for the next pop-mode instruction.
#[derive(Clone, Debug, Default)]
pub struct ArgStack {
    values: [u32; ARG_STACK_SIZE],
    kinds: [ArgKind; ARG_STACK_SIZE],
    len: usize,
}

/// Arguments taken off the stack by a pop-mode instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoppedArgs {
    /// One value per opcode parameter, zero where nothing was pushed.
    pub values: Vec<u32>,
    /// How many slots were actually pushed.
    pub pushed: usize,
}

impl PoppedArgs {
    /// Value for parameter `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> u32 {
        self.values.get(index).copied().unwrap_or(0)
    }

    /// Value for parameter `index`, reinterpreted as signed.
    #[must_use]
    pub fn signed(&self, index: usize) -> i32 {
        i32::from_ne_bytes(self.get(index).to_ne_bytes())
    }
}

impl ArgStack {
    /// # Errors
    ///
    /// Returns [`VmError::ArgumentStackOverflow`] when the stack is full.
    pub fn push(&mut self, value: u32, kind: ArgKind) -> Result<()> {
        if self.len >= ARG_STACK_SIZE {
            return Err(VmError::ArgumentStackOverflow);
        }
        self.values[self.len] = value;
        self.kinds[self.len] = kind;
        self.len += 1;
        Ok(())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pushed values, bottom first.
    #[must_use]
    pub fn values(&self) -> &[u32] {
        &self.values[..self.len]
    }

    #[must_use]
    pub fn kind(&self, slot: usize) -> Option<ArgKind> {
        (slot < self.len).then(|| self.kinds[slot])
    }

    /// Take the arguments of `opcode` and empty the stack.
    ///
    /// Slot `i` feeds parameter `i`, so the first push is the first
    /// argument.
    pub fn pop_args(&mut self, opcode: &Opcode) -> PoppedArgs {
        let pushed = self.len;
        let values = (0..opcode.params.len())
            .map(|i| if i < pushed { self.values[i] } else { 0 })
            .collect();
        self.clear();
        PoppedArgs { values, pushed }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// A cooperative VM thread.
#[derive(Clone, Debug)]
pub struct Thread {
    pub id: u32,
    pub call_stack: Vec<StackFrame>,
    pub arg_stack: ArgStack,
    pub variable_stack: Vec<u32>,
}

impl Thread {
    /// A thread starting at `entry`.
    #[must_use]
    pub fn new(id: u32, entry: InstructionRef) -> Self {
        Self {
            id,
            call_stack: vec![StackFrame::new(entry)],
            arg_stack: ArgStack::default(),
            variable_stack: Vec::with_capacity(VARIABLE_STACK_SIZE),
        }
    }

    /// Where the thread is about to execute, or `None` once it has returned
    /// from its entry point.
    #[must_use]
    pub fn current(&self) -> Option<InstructionRef> {
        self.call_stack.last().map(|frame| frame.at)
    }

    pub(crate) fn current_frame_mut(&mut self) -> Result<&mut StackFrame> {
        self.call_stack
            .last_mut()
            .ok_or(VmError::InvalidState("thread has no call frame"))
    }

    /// # Errors
    ///
    /// Returns [`VmError::VariableStackOverflow`] when the stack is full.
    pub fn push_variable(&mut self, value: u32) -> Result<()> {
        if self.variable_stack.len() >= VARIABLE_STACK_SIZE {
            return Err(VmError::VariableStackOverflow);
        }
        self.variable_stack.push(value);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`VmError::VariableStackUnderflow`] when the stack is empty.
    pub fn pop_variable(&mut self) -> Result<u32> {
        self.variable_stack
            .pop()
            .ok_or(VmError::VariableStackUnderflow)
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {}", self.id)?;
        match self.current() {
            Some(at) => write!(f, " at {at} (depth {})", self.call_stack.len()),
            None => f.write_str(" (finished)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qscript_ir::{OP_P_DEAD_V3, OP_SET_FLOOR_HANDLER};

    #[test]
    fn test_arg_stack_overflow() {
        let mut stack = ArgStack::default();
        for i in 0..ARG_STACK_SIZE {
            stack.push(u32::try_from(i).unwrap(), ArgKind::DWord).unwrap();
        }
        assert_eq!(
            stack.push(9, ArgKind::Byte),
            Err(VmError::ArgumentStackOverflow)
        );
        assert_eq!(stack.len(), ARG_STACK_SIZE);
    }

    #[test]
    fn test_pop_args_in_push_order() {
        let mut stack = ArgStack::default();
        stack.push(3, ArgKind::DWord).unwrap();
        stack.push(150, ArgKind::Word).unwrap();
        assert_eq!(stack.kind(1), Some(ArgKind::Word));

        let args = stack.pop_args(&OP_SET_FLOOR_HANDLER);
        assert_eq!(args.values, vec![3, 150]);
        assert_eq!(args.pushed, 2);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_pop_args_pads_missing_slots() {
        let mut stack = ArgStack::default();
        stack.push(u32::MAX, ArgKind::DWord).unwrap();
        let args = stack.pop_args(&OP_P_DEAD_V3);
        assert_eq!(args.pushed, 1);
        assert_eq!(args.signed(0), -1);
        assert_eq!(args.get(1), 0);
    }

    #[test]
    fn test_variable_stack_bounds() {
        let mut thread = Thread::new(0, InstructionRef::start_of(0));
        assert_eq!(thread.pop_variable(), Err(VmError::VariableStackUnderflow));
        for i in 0..16 {
            thread.push_variable(i).unwrap();
        }
        assert_eq!(thread.push_variable(16), Err(VmError::VariableStackOverflow));
        assert_eq!(thread.pop_variable(), Ok(15));
    }

    #[test]
    fn test_display() {
        let mut thread = Thread::new(4, InstructionRef::new(1, 2));
        assert_eq!(thread.to_string(), "thread 4 at 1:2 (depth 1)");
        thread.call_stack.clear();
        assert_eq!(thread.to_string(), "thread 4 (finished)");
    }
}
