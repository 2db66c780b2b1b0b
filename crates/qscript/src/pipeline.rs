//! Analysis and execution pipeline for one program.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use qscript_cfg::{AnalysisConfig, ControlFlowGraph, FloorDesignation, ValueAnalysis, ValueSet};
use qscript_ir::{BytecodeIr, Episode, InstructionRef, Label};
use qscript_vm::{
    Breakpoints, ExecutionResult, RegisterFile, VirtualMachine, VmConfig, VmError, VmIo,
};
use tracing::{debug, info};

use crate::listing::parse_listing;
use crate::{Error, Result};

/// Frames `run` executes when not told otherwise.
pub const DEFAULT_FRAMES: usize = 60;

/// Program plus everything derived from it.
pub struct Pipeline {
    ir: Arc<BytecodeIr>,
    /// Episode the VM is loaded with.
    pub episode: Episode,
    /// Solver budget for value queries.
    pub analysis: AnalysisConfig,
    /// Configuration for VMs created by [`Self::vm`].
    pub vm_config: VmConfig,
    cfg: OnceLock<ControlFlowGraph>,
}

impl Pipeline {
    pub fn new(ir: BytecodeIr) -> Self {
        Self {
            ir: Arc::new(ir),
            episode: Episode::default(),
            analysis: AnalysisConfig::default(),
            vm_config: VmConfig::default(),
            cfg: OnceLock::new(),
        }
    }

    /// Parse a program in listing form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Listing`] when the text does not parse.
    pub fn from_listing(text: &str) -> Result<Self> {
        Ok(Self::new(parse_listing(text)?))
    }

    /// Read and parse a listing file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let start = Instant::now();
        let text = std::fs::read_to_string(path)?;
        let pipeline = Self::from_listing(&text)?;
        let elapsed = start.elapsed().as_secs_f64();
        info!(
            path = %path.display(),
            segments = pipeline.ir.segments().len(),
            instructions = pipeline.ir.instruction_count(),
            "loaded program"
        );
        crate::metrics::record_load(&pipeline.ir, elapsed);
        Ok(pipeline)
    }

    #[must_use]
    pub const fn with_episode(mut self, episode: Episode) -> Self {
        self.episode = episode;
        self
    }

    #[must_use]
    pub const fn with_analysis_config(mut self, config: AnalysisConfig) -> Self {
        self.analysis = config;
        self
    }

    #[must_use]
    pub const fn with_vm_config(mut self, config: VmConfig) -> Self {
        self.vm_config = config;
        self
    }

    pub fn ir(&self) -> &BytecodeIr {
        &self.ir
    }

    /// The control flow graph, built on first use.
    pub fn cfg(&self) -> &ControlFlowGraph {
        self.cfg.get_or_init(|| {
            let cfg = ControlFlowGraph::create(&self.ir);
            debug!(blocks = cfg.len(), edges = cfg.edge_count(), "built cfg");
            cfg
        })
    }

    fn analysis(&self) -> ValueAnalysis<'_> {
        ValueAnalysis::new(&self.ir, self.cfg()).with_config(self.analysis)
    }

    fn check_instruction(&self, at: InstructionRef) -> Result<()> {
        match self.ir.instruction(at) {
            Some(_) => Ok(()),
            None => Err(Error::NoSuchInstruction(at)),
        }
    }

    /// Values `register` may hold right before `at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchInstruction`] when `at` is not an instruction.
    pub fn register_value(&self, at: InstructionRef, register: u8) -> Result<ValueSet> {
        self.check_instruction(at)?;
        Ok(self.analysis().register_value(at, register))
    }

    /// Values of argument stack slot `position` (0 = top) right before `at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchInstruction`] when `at` is not an instruction.
    pub fn stack_value(&self, at: InstructionRef, position: usize) -> Result<ValueSet> {
        self.check_instruction(at)?;
        Ok(self.analysis().stack_value(at, position))
    }

    pub fn floor_designations(&self) -> Vec<FloorDesignation> {
        qscript_cfg::floor_designations(&self.ir, self.cfg(), &self.analysis)
    }

    /// A VM with this program loaded and no threads started.
    pub fn vm(&self, io: Box<dyn VmIo>) -> VirtualMachine {
        let mut vm = VirtualMachine::with_config(io, self.vm_config);
        vm.load_bytecode(Arc::clone(&self.ir), self.episode);
        vm
    }

    /// Start a thread at `options.label` and drive frames until the program
    /// finishes, halts or the frame budget runs out.
    ///
    /// Every `execute()` call counts as a frame, including ones that stop at
    /// a breakpoint.
    ///
    /// # Errors
    ///
    /// Fails when the entry label cannot be started. Faults during execution
    /// are reported through the returned [`RunReport`].
    pub fn run(&self, options: &RunOptions, io: Box<dyn VmIo>) -> Result<RunReport> {
        let mut vm = self.vm(io);
        if !options.breakpoints.is_empty() {
            let breakpoints: Breakpoints = options.breakpoints.iter().copied().collect();
            vm.set_interceptor(Some(Box::new(breakpoints)));
        }
        vm.start_thread(options.label)?;

        let start = Instant::now();
        let frame_budget = options.frames.max(1);
        let mut frames = 0;
        let mut pauses = 0;
        let result = loop {
            let result = vm.execute()?;
            frames += 1;
            match result {
                ExecutionResult::WaitingVsync => vm.vsync(),
                ExecutionResult::Paused => {
                    pauses += 1;
                    debug!(frame = frames, "paused at breakpoint");
                }
                ExecutionResult::Suspended | ExecutionResult::Halted(_) => break result,
            }
            if frames >= frame_budget {
                break result;
            }
        };

        let report = RunReport {
            result,
            frames,
            pauses,
            registers: vm.registers().clone(),
            last_error: vm.last_error().cloned(),
        };
        crate::metrics::record_run(&report, start.elapsed().as_secs_f64());
        debug!(%result, frames, pauses, "run finished");
        Ok(report)
    }
}

/// What [`Pipeline::run`] starts and how long it keeps going.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub label: Label,
    pub frames: usize,
    pub breakpoints: Vec<InstructionRef>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            label: 0,
            frames: DEFAULT_FRAMES,
            breakpoints: Vec::new(),
        }
    }
}

/// Outcome of [`Pipeline::run`].
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Result of the last `execute()` call.
    pub result: ExecutionResult,
    pub frames: usize,
    pub pauses: usize,
    pub registers: RegisterFile,
    pub last_error: Option<VmError>,
}
