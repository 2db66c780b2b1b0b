//! Designations command.

use std::path::Path;

use qscript::AnalysisConfig;
use tracing::info;

use super::load_pipeline;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Handle the `designations` command.
pub fn cmd_designations(input: &Path, max_iterations: usize) -> i32 {
    let Some(pipeline) = load_pipeline(input) else {
        return EXIT_FAILURE;
    };
    let pipeline = pipeline
        .with_analysis_config(AnalysisConfig::default().with_max_iterations(max_iterations));

    let designations = pipeline.floor_designations();
    info!(floors = designations.len(), "floor designations");
    if designations.is_empty() {
        println!("no floor designations");
    }
    for designation in &designations {
        println!("{designation}");
    }
    EXIT_SUCCESS
}
