//! Value command.

use std::fmt;
use std::path::Path;

use qscript::{AnalysisConfig, InstructionRef};
use tracing::{error, info};

use super::load_pipeline;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// What to query.
#[derive(Clone, Copy, Debug)]
pub enum Target {
    Register(u8),
    Stack(usize),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(register) => write!(f, "r{register}"),
            Self::Stack(position) => write!(f, "stack[{position}]"),
        }
    }
}

/// Handle the `value` command.
pub fn cmd_value(
    input: &Path,
    segment: usize,
    index: usize,
    target: Target,
    max_iterations: usize,
) -> i32 {
    let Some(pipeline) = load_pipeline(input) else {
        return EXIT_FAILURE;
    };
    let pipeline = pipeline
        .with_analysis_config(AnalysisConfig::default().with_max_iterations(max_iterations));

    let at = InstructionRef::new(segment, index);
    let values = match target {
        Target::Register(register) => pipeline.register_value(at, register),
        Target::Stack(position) => pipeline.stack_value(at, position),
    };
    match values {
        Ok(values) => {
            info!(%at, %target, size = values.size(), "value query");
            println!("{target} at {at}: {values}");
            EXIT_SUCCESS
        }
        Err(e) => {
            error!(error = %e, "value query failed");
            EXIT_FAILURE
        }
    }
}
