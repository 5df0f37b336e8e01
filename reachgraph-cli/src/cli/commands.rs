//! Command implementations and argument parsing for the reachgraph CLI.

use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use reachgraph_core::{
    HostDeviceRuntime, MutualReachabilityGraph, ReachGraph, ReachGraphBuilder, ReachGraphError,
    estimate_peak_bytes, format_bytes,
};
use reachgraph_providers_dense::{DenseMatrix, DenseMatrixError};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

const DEFAULT_MIN_SAMPLES: usize = 5;

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "reachgraph",
    about = "Build the mutual-reachability graph of a dense point set."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build a graph and print its summary.
    Run(RunCommand),
}

/// Options accepted by the `run` command.
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Neighbour rank (self included) that defines each core distance.
    #[arg(long = "min-samples", default_value_t = DEFAULT_MIN_SAMPLES)]
    pub min_samples: usize,

    /// Neighbours searched per point (defaults to `--min-samples`).
    #[arg(long = "neighbours")]
    pub neighbours: Option<usize>,

    /// Divisor applied to every mutual-reachability weight.
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f32,

    /// Number of host-backed devices to spread the search across.
    #[arg(long, default_value_t = NonZeroUsize::MIN)]
    pub devices: NonZeroUsize,

    /// Refuse inputs whose estimated peak memory exceeds this size
    /// (for example `512M` or `2GiB`).
    #[arg(long = "max-bytes", value_parser = parse_byte_size)]
    pub max_bytes: Option<u64>,

    /// Input source.
    #[command(subcommand)]
    pub source: RunSource,
}

/// Input sources accepted by `run`.
#[derive(Debug, Subcommand, Clone)]
pub enum RunSource {
    /// Read a Parquet file containing a `FixedSizeList<Float32, D>` column.
    Parquet(ParquetArgs),
}

/// Parquet ingestion arguments.
#[derive(Debug, Args, Clone)]
pub struct ParquetArgs {
    /// Path to the Parquet file containing feature vectors.
    pub path: PathBuf,

    /// Column containing `FixedSizeList<Float32, D>` rows.
    #[arg(long)]
    pub column: String,

    /// Override name for the data source (defaults to the file name).
    #[arg(long)]
    pub name: Option<String>,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Dense matrix ingestion failed.
    #[error(transparent)]
    Dense(#[from] DenseMatrixError),
    /// Graph construction failed.
    #[error(transparent)]
    Core(#[from] ReachGraphError),
    /// The input would need more memory than `--max-bytes` allows.
    #[error(
        "estimated peak memory {} exceeds the limit of {}",
        format_bytes(*estimated),
        format_bytes(*limit)
    )]
    MemoryLimitExceeded {
        /// Estimated peak usage in bytes.
        estimated: u64,
        /// Configured limit in bytes.
        limit: u64,
    },
}

/// Summarises a built graph.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Name of the loaded matrix.
    pub data_source: String,
    /// Width of each point.
    pub dimension: usize,
    /// Devices the search ran on.
    pub devices: usize,
    /// The graph itself.
    pub graph: MutualReachabilityGraph,
}

impl ExecutionSummary {
    /// Returns the smallest and largest core distance, if any point exists.
    #[must_use]
    pub fn core_range(&self) -> Option<(f32, f32)> {
        self.graph
            .core_distances()
            .iter()
            .copied()
            .fold(None, |range, core| match range {
                None => Some((core, core)),
                Some((low, high)) => Some((low.min(core), high.max(core))),
            })
    }
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading the input or building the graph fails.
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Run(run) => {
            Span::current().record("command", field::display("run"));
            run_command(run)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(min_samples = command.min_samples, devices = command.devices.get(), source = field::Empty),
)]
pub(super) fn run_command(command: RunCommand) -> Result<ExecutionSummary, CliError> {
    let mut builder = ReachGraphBuilder::new()
        .with_min_samples(command.min_samples)
        .with_alpha(command.alpha);
    if let Some(neighbours) = command.neighbours {
        builder = builder.with_neighbourhood_size(neighbours);
    }
    let reach = builder.build()?;

    let summary = match command.source {
        RunSource::Parquet(args) => {
            Span::current().record("source", field::display("parquet"));
            run_parquet(&reach, command.devices, command.max_bytes, args)?
        }
    };

    info!(
        data_source = summary.data_source.as_str(),
        points = summary.graph.n_points(),
        nnz = summary.graph.nnz(),
        "command completed"
    );
    Ok(summary)
}

#[instrument(
    name = "cli.run_parquet",
    err,
    skip(reach, args),
    fields(path = field::Empty, column = field::Empty, override_name = field::Empty),
)]
pub(super) fn run_parquet(
    reach: &ReachGraph,
    devices: NonZeroUsize,
    max_bytes: Option<u64>,
    args: ParquetArgs,
) -> Result<ExecutionSummary, CliError> {
    let ParquetArgs { path, column, name } = args;
    let span = Span::current();
    span.record("path", field::display(path.display()));
    span.record("column", field::display(&column));
    span.record(
        "override_name",
        field::display(name.as_deref().unwrap_or("<derived>")),
    );
    let chosen_name = derive_data_source_name(&path, name.as_deref());
    let matrix = DenseMatrix::try_from_parquet_path(chosen_name, &path, &column)?;
    let points = matrix.points().map_err(ReachGraphError::from)?;

    if let Some(limit) = max_bytes {
        check_memory_limit(
            points.rows(),
            points.dimension(),
            reach.n_neighbors().get(),
            devices.get(),
            limit,
        )?;
    }

    let runtime = HostDeviceRuntime::new(devices.get());
    let graph = reach.run_on(&runtime, points)?;
    Ok(ExecutionSummary {
        data_source: matrix.name().to_owned(),
        dimension: matrix.dimension(),
        devices: devices.get().min(points.rows()).max(1),
        graph,
    })
}

fn check_memory_limit(
    points: usize,
    dimension: usize,
    n_neighbors: usize,
    devices: usize,
    limit: u64,
) -> Result<(), CliError> {
    let estimated = estimate_peak_bytes(points, dimension, n_neighbors, devices);
    info!(
        estimated = %format_bytes(estimated),
        limit = %format_bytes(limit),
        "memory estimate"
    );
    if estimated > limit {
        return Err(CliError::MemoryLimitExceeded { estimated, limit });
    }
    Ok(())
}

pub(super) fn derive_data_source_name(path: &Path, override_name: Option<&str>) -> String {
    if let Some(name) = override_name {
        return name.to_owned();
    }

    path.file_stem()
        .and_then(|value| value.to_str())
        .map_or_else(|| "data_source".to_owned(), ToOwned::to_owned)
}

/// Parses a byte count with an optional binary suffix.
///
/// Accepts a plain integer or one followed by `K`, `M`, `G`, or `T`, each
/// optionally followed by `B` or `iB`. Suffixes are case-insensitive and
/// always mean powers of 1024.
///
/// # Errors
/// Returns a message for empty input, unknown suffixes, and values that
/// overflow `u64`.
///
/// # Examples
/// ```
/// use reachgraph_cli::cli::parse_byte_size;
///
/// assert_eq!(parse_byte_size("4096"), Ok(4096));
/// assert_eq!(parse_byte_size("512MiB"), Ok(512 * 1024 * 1024));
/// assert!(parse_byte_size("1.5G").is_err());
/// ```
pub fn parse_byte_size(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(format!("`{raw}` does not start with a byte count"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|error| format!("invalid byte count `{digits}`: {error}"))?;
    let shift = match suffix.to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 10,
        "m" | "mb" | "mib" => 20,
        "g" | "gb" | "gib" => 30,
        "t" | "tb" | "tib" => 40,
        _ => return Err(format!("unknown size suffix `{suffix}`")),
    };
    value
        .checked_mul(1_u64 << shift)
        .ok_or_else(|| format!("`{raw}` overflows a 64-bit byte count"))
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    let graph = &summary.graph;
    writeln!(writer, "data source: {}", summary.data_source)?;
    writeln!(writer, "points: {}", graph.n_points())?;
    writeln!(writer, "dimension: {}", summary.dimension)?;
    writeln!(writer, "edges: {}", graph.nnz())?;
    writeln!(writer, "self loops: {}", graph.graph().self_loop_count())?;
    match summary.core_range() {
        Some((low, high)) => writeln!(writer, "core distance range: {low}..{high}")?,
        None => writeln!(writer, "core distance range: n/a")?,
    }
    writeln!(writer, "devices: {}", summary.devices)?;
    Ok(())
}
