//! Run command.

use std::path::Path;

use qscript::{
    Episode, ExecutionResult, HaltReason, InstructionRef, Label, RunOptions, TracingIo, VmConfig,
};
use tracing::{error, info, warn};

use super::load_pipeline;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Handle the `run` command.
pub fn cmd_run(
    input: &Path,
    label: Label,
    breakpoints: &[InstructionRef],
    frames: usize,
    max_instructions: Option<usize>,
    seed: Option<u32>,
    episode: Episode,
) -> i32 {
    let Some(pipeline) = load_pipeline(input) else {
        return EXIT_FAILURE;
    };

    for &at in breakpoints {
        if pipeline.ir().instruction(at).is_none() {
            warn!(%at, "breakpoint does not point at an instruction");
        }
    }

    let mut config = VmConfig::default();
    if let Some(max) = max_instructions {
        config = config.with_max_instructions(max);
    }
    if let Some(seed) = seed {
        config = config.with_rng_seed(seed);
    }
    let pipeline = pipeline.with_vm_config(config).with_episode(episode);

    let options = RunOptions {
        label,
        frames,
        breakpoints: breakpoints.to_vec(),
    };
    let report = match pipeline.run(&options, Box::new(TracingIo)) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, label, "failed to start program");
            return EXIT_FAILURE;
        }
    };

    info!(
        result = %report.result,
        frames = report.frames,
        pauses = report.pauses,
        "run finished"
    );
    println!("result: {}", report.result);
    println!("frames: {}", report.frames);
    if let Some(e) = &report.last_error {
        println!("error: {e}");
    }
    for (register, value) in report.registers.non_zero() {
        println!("r{register} = {value}");
    }

    match report.result {
        ExecutionResult::Halted(HaltReason::Fault | HaltReason::InstructionLimit) => EXIT_FAILURE,
        _ => EXIT_SUCCESS,
    }
}
