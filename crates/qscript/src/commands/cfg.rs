//! Cfg command.

use std::path::Path;

use tracing::info;

use super::load_pipeline;
use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};

/// Handle the `cfg` command.
pub fn cmd_cfg(input: &Path) -> i32 {
    let Some(pipeline) = load_pipeline(input) else {
        return EXIT_FAILURE;
    };

    let cfg = pipeline.cfg();
    info!(blocks = cfg.len(), edges = cfg.edge_count(), "control flow graph");
    print!("{cfg}");
    EXIT_SUCCESS
}
