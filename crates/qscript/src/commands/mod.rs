//! Command implementations.
//!
//! Each submodule handles one CLI command.

mod cfg;
mod designations;
mod run;
mod value;

use std::path::Path;

use qscript::Pipeline;
use tracing::error;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Cfg { input } => cfg::cmd_cfg(input),
        Commands::Value { .. } => handle_value(cli),
        Commands::Designations {
            input,
            max_iterations,
        } => designations::cmd_designations(input, *max_iterations),
        Commands::Run { .. } => handle_run(cli),
    }
}

fn handle_value(cli: &Cli) -> i32 {
    let Commands::Value {
        input,
        segment,
        index,
        register,
        stack,
        max_iterations,
    } = &cli.command
    else {
        unreachable!("value command variant mismatch");
    };

    let target = match (register, stack) {
        (Some(register), _) => value::Target::Register(*register),
        (None, Some(position)) => value::Target::Stack(*position),
        (None, None) => unreachable!("clap requires --register or --stack"),
    };
    value::cmd_value(input, *segment, *index, target, *max_iterations)
}

fn handle_run(cli: &Cli) -> i32 {
    let Commands::Run {
        input,
        label,
        breakpoints,
        frames,
        max_instructions,
        seed,
        episode,
    } = &cli.command
    else {
        unreachable!("run command variant mismatch");
    };

    run::cmd_run(
        input,
        *label,
        breakpoints,
        *frames,
        *max_instructions,
        *seed,
        (*episode).into(),
    )
}

/// Load a listing, logging the failure.
fn load_pipeline(input: &Path) -> Option<Pipeline> {
    match Pipeline::load(input) {
        Ok(pipeline) => Some(pipeline),
        Err(e) => {
            error!(error = %e, path = %input.display(), "failed to load program");
            None
        }
    }
}
