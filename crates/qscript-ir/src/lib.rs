//! Bytecode intermediate representation for quest scripts.
//!
//! A program is an ordered list of segments (instructions, raw data or a
//! string) addressed by integer labels. The IR is produced by an assembler
//! or binary decoder and consumed unchanged by the CFG builder, the value
//! solver and the virtual machine.

mod builder;
mod bytecode;
mod episode;
mod error;
mod instruction;
mod opcode;
mod reference;
mod segment;

pub use builder::*;
pub use bytecode::*;
pub use episode::*;
pub use error::*;
pub use instruction::*;
pub use opcode::*;
pub use reference::*;
pub use segment::*;

/// Integer label naming a segment.
pub type Label = i32;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 256;
