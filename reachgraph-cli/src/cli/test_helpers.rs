//! Small helpers shared across CLI tests.

use std::path::PathBuf;

use tempfile::TempDir;

use super::commands::run_command;
use super::{CliError, ParquetArgs, RunCommand, RunSource};

pub(super) fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

/// A `run` command over `path` with library defaults except `min_samples`.
pub(super) fn parquet_command(path: PathBuf, min_samples: usize) -> RunCommand {
    RunCommand {
        min_samples,
        neighbours: None,
        alpha: 1.0,
        devices: std::num::NonZeroUsize::MIN,
        max_bytes: None,
        source: RunSource::Parquet(ParquetArgs {
            path,
            column: "features".into(),
            name: None,
        }),
    }
}

pub(super) fn run_command_expecting_error(cmd: RunCommand, panic_msg: &str) -> CliError {
    match run_command(cmd) {
        Ok(_) => panic!("{panic_msg}"),
        Err(err) => err,
    }
}
