//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use qscript::{AnalysisConfig, Episode, InstructionRef, Label};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "qscript")]
#[command(about = "Quest script toolchain - control flow, value analysis and execution")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the basic blocks and edges of a program
    Cfg {
        /// Input listing
        #[arg(value_name = "LISTING")]
        input: PathBuf,
    },
    /// Print the values a register or argument stack slot may hold
    Value {
        /// Input listing
        #[arg(value_name = "LISTING")]
        input: PathBuf,

        /// Segment of the instruction to query at
        #[arg(long)]
        segment: usize,

        /// Index of the instruction within its segment
        #[arg(long)]
        index: usize,

        /// Register to query
        #[arg(long, conflicts_with = "stack", required_unless_present = "stack")]
        register: Option<u8>,

        /// Argument stack slot to query (0 = top)
        #[arg(long)]
        stack: Option<usize>,

        /// Solver iteration budget
        #[arg(long, default_value_t = AnalysisConfig::default().max_iterations)]
        max_iterations: usize,
    },
    /// Print the floor designations of a program
    Designations {
        /// Input listing
        #[arg(value_name = "LISTING")]
        input: PathBuf,

        /// Solver iteration budget
        #[arg(long, default_value_t = AnalysisConfig::default().max_iterations)]
        max_iterations: usize,
    },
    /// Run a program on the VM
    Run {
        /// Input listing
        #[arg(value_name = "LISTING")]
        input: PathBuf,

        /// Label to start the first thread at
        #[arg(long, default_value = "0")]
        label: Label,

        /// Pause before executing this instruction (SEGMENT:INDEX, repeatable)
        #[arg(long = "break", value_name = "SEGMENT:INDEX", value_parser = parse_instruction_ref)]
        breakpoints: Vec<InstructionRef>,

        /// Maximum number of frames to run
        #[arg(long, default_value_t = qscript::DEFAULT_FRAMES)]
        frames: usize,

        /// Instruction limit for a single frame
        #[arg(long)]
        max_instructions: Option<usize>,

        /// Seed for get_random
        #[arg(long)]
        seed: Option<u32>,

        /// Episode the quest is loaded for
        #[arg(long, value_enum, default_value = "1")]
        episode: EpisodeArg,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum EpisodeArg {
    #[default]
    #[value(name = "1")]
    I,
    #[value(name = "2")]
    II,
    #[value(name = "4")]
    IV,
}

impl From<EpisodeArg> for Episode {
    fn from(arg: EpisodeArg) -> Self {
        match arg {
            EpisodeArg::I => Self::I,
            EpisodeArg::II => Self::II,
            EpisodeArg::IV => Self::IV,
        }
    }
}

/// Parse `SEGMENT:INDEX`.
///
/// # Errors
///
/// Returns a message when the separator is missing or a part is not a
/// number.
pub fn parse_instruction_ref(s: &str) -> Result<InstructionRef, String> {
    let (segment, index) = s
        .split_once(':')
        .ok_or_else(|| format!("expected SEGMENT:INDEX, got `{s}`"))?;
    let segment = segment
        .trim()
        .parse()
        .map_err(|e| format!("invalid segment `{segment}`: {e}"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|e| format!("invalid index `{index}`: {e}"))?;
    Ok(InstructionRef::new(segment, index))
}
