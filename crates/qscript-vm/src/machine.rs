//! The scheduler: threads, execution loop and halting.

use std::fmt;
use std::sync::Arc;

use metrics::counter;
use rustc_hash::FxHashMap;
use tracing::{debug, error, trace, warn};

use qscript_ir::{BytecodeIr, Episode, InstructionRef, Label, SegmentKind};

use crate::config::VmConfig;
use crate::error::{Result, VmError};
use crate::interceptor::ExecutionInterceptor;
use crate::io::{TracingIo, VmIo};
use crate::random::Random;
use crate::registers::RegisterFile;
use crate::thread::{StackFrame, Thread};

/// Why the VM stopped for good.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HaltReason {
    /// The program executed `exit`.
    Exit,
    /// An instruction failed; see [`VirtualMachine::last_error`].
    Fault,
    /// One `execute()` call ran out of instruction budget.
    InstructionLimit,
    /// The host called [`VirtualMachine::halt`].
    Stopped,
}

impl HaltReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::Fault => "fault",
            Self::InstructionLimit => "instruction_limit",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one [`VirtualMachine::execute`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Every thread has finished.
    Suspended,
    /// The interceptor declined the next instruction.
    Paused,
    /// Every thread yielded at `sync`; call `vsync()` to resume.
    WaitingVsync,
    Halted(HaltReason),
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended => f.write_str("suspended"),
            Self::Paused => f.write_str("paused"),
            Self::WaitingVsync => f.write_str("waiting for vsync"),
            Self::Halted(reason) => write!(f, "halted ({reason})"),
        }
    }
}

/// Cooperative round-robin interpreter for one program.
pub struct VirtualMachine {
    pub(crate) config: VmConfig,
    pub(crate) io: Box<dyn VmIo>,
    interceptor: Option<Box<dyn ExecutionInterceptor>>,
    pub(crate) ir: Arc<BytecodeIr>,
    pub(crate) episode: Episode,
    label_to_segment: FxHashMap<Label, usize>,
    pub(crate) registers: RegisterFile,
    /// Backing store of the last `arg_pushs`.
    pub(crate) string_arg_store: String,
    pub(crate) threads: Vec<Thread>,
    /// Thread currently running; equal to `threads.len()` once all yielded.
    pub(crate) thread_idx: usize,
    next_thread_id: u32,
    pub(crate) random: Random,
    pub(crate) window_msg_open: bool,
    pub(crate) set_episode_called: bool,
    halted: bool,
    halt_reason: Option<HaltReason>,
    last_error: Option<VmError>,
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new(Box::new(TracingIo))
    }
}

impl fmt::Debug for VirtualMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("threads", &self.threads)
            .field("thread_idx", &self.thread_idx)
            .field("registers", &self.registers)
            .field("halted", &self.halted)
            .field("halt_reason", &self.halt_reason)
            .finish_non_exhaustive()
    }
}

impl VirtualMachine {
    /// An empty, halted VM. Load a program before executing.
    #[must_use]
    pub fn new(io: Box<dyn VmIo>) -> Self {
        Self::with_config(io, VmConfig::default())
    }

    #[must_use]
    pub fn with_config(io: Box<dyn VmIo>, config: VmConfig) -> Self {
        Self {
            config,
            io,
            interceptor: None,
            ir: Arc::new(BytecodeIr::default()),
            episode: Episode::default(),
            label_to_segment: FxHashMap::default(),
            registers: RegisterFile::new(),
            string_arg_store: String::new(),
            threads: Vec::new(),
            thread_idx: 0,
            next_thread_id: 0,
            random: Random::new(config.rng_seed),
            window_msg_open: false,
            set_episode_called: false,
            halted: true,
            halt_reason: None,
            last_error: None,
        }
    }

    /// Replace the program, resetting all runtime state.
    ///
    /// When several segments share a label, the last one wins.
    pub fn load_bytecode(&mut self, ir: Arc<BytecodeIr>, episode: Episode) {
        self.reset();

        self.label_to_segment.clear();
        for (index, segment) in ir.segments().iter().enumerate() {
            for &label in segment.labels() {
                self.label_to_segment.insert(label, index);
            }
        }

        debug!(
            segments = ir.segments().len(),
            labels = self.label_to_segment.len(),
            %episode,
            "loaded bytecode"
        );
        self.ir = ir;
        self.episode = episode;
        self.halted = false;
        self.halt_reason = None;
        self.last_error = None;
    }

    /// Schedule a new thread at `label`.
    ///
    /// # Errors
    ///
    /// Fails with [`VmError::InvalidState`] on a halted VM. Fails with
    /// [`VmError::UnresolvedLabel`], [`VmError::NotInstructionSegment`] or
    /// [`VmError::EmptyLabel`] when `label` does not lead to an instruction.
    pub fn start_thread(&mut self, label: Label) -> Result<u32> {
        if self.halted {
            return Err(VmError::InvalidState("cannot start a thread on a halted vm"));
        }
        let entry = self.resolve_entry(label)?;
        let id = self.next_thread_id;
        self.next_thread_id += 1;
        self.threads.push(Thread::new(id, entry));
        debug!(id, label, %entry, "started thread");
        Ok(id)
    }

    /// Run instructions until every thread yields, all threads finish, the
    /// interceptor pauses or the VM halts.
    ///
    /// Faults while executing are not returned: they halt the VM with
    /// [`HaltReason::Fault`], are reported to the [`VmIo`] and are available
    /// through [`Self::last_error`]. Errors are only returned when the VM is
    /// not runnable.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::InvalidState`] when the VM is halted, has no
    /// threads, or every thread is waiting for [`Self::vsync`].
    pub fn execute(&mut self) -> Result<ExecutionResult> {
        if self.halted {
            return Err(VmError::InvalidState("vm is halted"));
        }
        if self.threads.is_empty() {
            return Err(VmError::InvalidState("no threads to execute"));
        }
        if self.thread_idx >= self.threads.len() {
            return Err(VmError::InvalidState("all threads are waiting for vsync"));
        }

        let mut executed = 0;
        let result = loop {
            if executed >= self.config.max_instructions {
                warn!(
                    max = self.config.max_instructions,
                    "instruction limit reached, halting"
                );
                self.halt_with(HaltReason::InstructionLimit);
                break ExecutionResult::Halted(HaltReason::InstructionLimit);
            }

            let Some(at) = self.threads.get(self.thread_idx).and_then(Thread::current) else {
                self.fault(VmError::InvalidState("thread has no call frame"), None);
                break ExecutionResult::Halted(HaltReason::Fault);
            };

            if let Some(interceptor) = self.interceptor.as_mut() {
                if !interceptor.should_execute(at) {
                    break ExecutionResult::Paused;
                }
            }

            executed += 1;
            if let Err(err) = self.execute_instruction(at) {
                self.fault(err, Some(at));
                break ExecutionResult::Halted(HaltReason::Fault);
            }

            if self.halted {
                break ExecutionResult::Halted(self.halt_reason.unwrap_or(HaltReason::Exit));
            }
            if self.threads.is_empty() {
                break ExecutionResult::Suspended;
            }
            if self.thread_idx >= self.threads.len() {
                break ExecutionResult::WaitingVsync;
            }
        };

        counter!("qscript_vm_instructions_total").increment(executed as u64);
        trace!(executed, %result, "execute");
        Ok(result)
    }

    /// Start the next frame: rewind the thread cursor once every thread has
    /// yielded.
    pub fn vsync(&mut self) {
        if self.thread_idx >= self.threads.len() {
            self.thread_idx = 0;
        }
    }

    /// Stop the VM and clear all runtime state. Idempotent.
    pub fn halt(&mut self) {
        self.reset();
        if !self.halted {
            debug!("halted by host");
            self.halt_with(HaltReason::Stopped);
        }
    }

    pub fn set_interceptor(&mut self, interceptor: Option<Box<dyn ExecutionInterceptor>>) {
        self.interceptor = interceptor;
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    #[must_use]
    pub const fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    /// The fault that halted the VM, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&VmError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    #[must_use]
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    #[must_use]
    pub const fn episode(&self) -> Episode {
        self.episode
    }

    #[must_use]
    pub fn ir(&self) -> &BytecodeIr {
        &self.ir
    }

    /// Segment index of an instruction segment labelled `label`.
    pub(crate) fn resolve_label(&self, label: Label) -> Result<usize> {
        let segment = *self
            .label_to_segment
            .get(&label)
            .ok_or(VmError::UnresolvedLabel(label))?;
        match self.ir.segment(segment).map(qscript_ir::Segment::kind) {
            Some(SegmentKind::Instructions) => Ok(segment),
            Some(kind) => Err(VmError::NotInstructionSegment { label, kind }),
            None => Err(VmError::UnresolvedLabel(label)),
        }
    }

    /// First instruction run when control transfers to `label`. Empty
    /// instruction segments pass control on like fall-through does.
    pub(crate) fn resolve_entry(&self, label: Label) -> Result<InstructionRef> {
        let segment = self.resolve_label(label)?;
        InstructionRef::entry(&self.ir, segment).ok_or(VmError::EmptyLabel(label))
    }

    pub(crate) fn current_thread_mut(&mut self) -> Result<&mut Thread> {
        self.threads
            .get_mut(self.thread_idx)
            .ok_or(VmError::InvalidState("no current thread"))
    }

    /// Move the current thread to its next instruction. Falling off the end
    /// of the program ends the thread, which is only valid from its entry
    /// frame.
    pub(crate) fn advance(&mut self) -> Result<()> {
        let ir = Arc::clone(&self.ir);
        let thread = self.current_thread_mut()?;
        let depth = thread.call_stack.len();
        let frame = thread.current_frame_mut()?;
        if let Some(next) = frame.at.next(&ir) {
            frame.at = next;
            return Ok(());
        }
        if depth > 1 {
            return Err(VmError::EofWithCallStack);
        }
        thread.call_stack.pop();
        self.terminate_thread(self.thread_idx);
        Ok(())
    }

    pub(crate) fn jump(&mut self, label: Label) -> Result<()> {
        let entry = self.resolve_entry(label)?;
        self.current_thread_mut()?.current_frame_mut()?.at = entry;
        Ok(())
    }

    pub(crate) fn call(&mut self, label: Label) -> Result<()> {
        let entry = self.resolve_entry(label)?;
        self.current_thread_mut()?
            .call_stack
            .push(StackFrame::new(entry));
        Ok(())
    }

    /// Return from the current frame. Returning from the entry frame ends
    /// the thread; otherwise the caller moves past its call.
    pub(crate) fn ret(&mut self) -> Result<()> {
        let thread = self.current_thread_mut()?;
        thread.call_stack.pop();
        if thread.call_stack.is_empty() {
            self.terminate_thread(self.thread_idx);
            Ok(())
        } else {
            self.advance()
        }
    }

    /// Remove thread `index`, keeping the cursor on the same logical
    /// position in the round.
    pub(crate) fn terminate_thread(&mut self, index: usize) {
        if index >= self.threads.len() {
            return;
        }
        let thread = self.threads.remove(index);
        // Removing the current thread already moves the next one under the
        // cursor, so only removals before it shift the cursor back.
        if index < self.thread_idx {
            self.thread_idx -= 1;
        }
        debug!(id = thread.id, remaining = self.threads.len(), "thread terminated");
    }

    /// Halt from inside the program. Registers are kept for inspection.
    pub(crate) fn halt_with(&mut self, reason: HaltReason) {
        self.threads.clear();
        self.thread_idx = 0;
        self.halted = true;
        self.halt_reason = Some(reason);
        counter!("qscript_vm_halts_total", "reason" => reason.as_str()).increment(1);
    }

    fn fault(&mut self, err: VmError, at: Option<InstructionRef>) {
        match at {
            Some(at) => error!(%at, "{err}"),
            None => error!("{err}"),
        }
        self.io.error(&err, at);
        self.last_error = Some(err);
        self.halt_with(HaltReason::Fault);
    }

    fn reset(&mut self) {
        self.registers.zero();
        self.string_arg_store.clear();
        self.threads.clear();
        self.thread_idx = 0;
        self.next_thread_id = 0;
        self.window_msg_open = false;
        self.set_episode_called = false;
        self.random = Random::new(self.config.rng_seed);
    }
}
