//! qscript CLI - quest script toolchain

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let metrics_handle = if cli.metrics {
        qscript::metrics::CliRecorder::new().install()
    } else {
        None
    };
    qscript::metrics::init();

    let level = if cli.silent {
        "qscript=error"
    } else if cli.verbose {
        "qscript=debug"
    } else {
        "qscript=info"
    };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = level.parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = commands::run_command(&cli);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}
