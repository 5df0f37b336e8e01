//! Command-line interface for building mutual-reachability graphs.
//!
//! The `run` command loads a dense matrix from a Parquet column, builds its
//! graph across the requested number of devices, and prints a summary.

mod commands;

pub use commands::{
    Cli, CliError, Command, ExecutionSummary, ParquetArgs, RunCommand, RunSource, parse_byte_size,
    render_summary, run_cli,
};

#[cfg(test)]
mod test_fixtures;
#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod test_memory_guard;
