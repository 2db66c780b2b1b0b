//! Quest script toolchain.
//!
//! Loads a program, builds its control flow graph, answers register and
//! argument stack value queries and runs it on the cooperative VM.
//!
//! # Example
//!
//! ```ignore
//! use qscript::{InstructionRef, Pipeline};
//!
//! let pipeline = Pipeline::load("quest.qst".as_ref())?;
//! let values = pipeline.register_value(InstructionRef::new(0, 1), 6)?;
//! println!("r6 = {values}");
//! ```

// Re-export from sub-crates
pub use qscript_cfg::{
    AnalysisConfig, BasicBlock, BlockId, BranchType, ControlFlowGraph, DesignationSource,
    FloorDesignation, ValueAnalysis, ValueSet, ValueSetError, floor_designations,
    register_value, stack_value,
};
pub use qscript_ir::{
    Arg, BytecodeIr, DataSegment, Episode, Instruction, InstructionRef, InstructionSegment,
    IrBuilder, IrError, Label, OpClass, Opcode, Segment, SegmentKind, SourceLoc, StringSegment,
};
pub use qscript_vm::{
    Breakpoints, ExecutionInterceptor, ExecutionResult, HaltReason, RecordingIo, RegisterFile,
    TracingIo, VirtualMachine, VmConfig, VmError, VmEvent, VmIo,
};

pub mod listing;
pub mod metrics;

mod error;
mod pipeline;

pub use error::*;
pub use pipeline::*;
