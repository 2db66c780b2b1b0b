//! Control flow graph construction and backward value analysis.
//!
//! The graph partitions every instruction segment into basic blocks and
//! links them, including virtual return edges for calls. The solver walks
//! the graph backwards to compute which values a register or argument stack
//! slot can hold at a program point.

mod analysis;
mod designations;
mod graph;
mod value_set;

pub use analysis::*;
pub use designations::*;
pub use graph::*;
pub use value_set::*;
