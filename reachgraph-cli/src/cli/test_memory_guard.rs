//! Tests for the `--max-bytes` memory guard and `parse_byte_size` parser.

use super::commands::run_command;
use super::{Cli, CliError, Command, RunCommand, parse_byte_size};

use clap::Parser;
use rstest::rstest;

use super::test_fixtures::create_diagonal_file;
use super::test_helpers::{parquet_command, run_command_expecting_error, temp_dir};

type TestResult = Result<(), Box<dyn std::error::Error>>;

// -- parse_byte_size: happy paths -------------------------------------------

#[rstest]
#[case::plain_bytes("1024", 1024)]
#[case::zero("0", 0)]
#[case::explicit_bytes("64B", 64)]
#[case::suffix_k_lower("100k", 100 * 1024)]
#[case::suffix_kib("100KiB", 100 * 1024)]
#[case::suffix_m_upper("512M", 512 * 1024 * 1024)]
#[case::suffix_mb("512MB", 512 * 1024 * 1024)]
#[case::suffix_g_lower("2g", 2 * 1024 * 1024 * 1024)]
#[case::suffix_gib("2GiB", 2 * 1024 * 1024 * 1024)]
#[case::suffix_t("1T", 1024_u64 * 1024 * 1024 * 1024)]
#[case::surrounding_space(" 8K ", 8 * 1024)]
fn parse_byte_size_accepts_valid_input(#[case] input: &str, #[case] expected: u64) {
    assert_eq!(
        parse_byte_size(input).expect("valid input must parse"),
        expected
    );
}

// -- parse_byte_size: unhappy paths -----------------------------------------

#[rstest]
#[case::empty("")]
#[case::only_suffix("M")]
#[case::unknown_suffix("100X")]
#[case::negative("-100")]
#[case::decimal("1.5G")]
#[case::overflow("18446744073709551615T")]
#[case::too_many_digits("99999999999999999999999")]
fn parse_byte_size_rejects_invalid_input(#[case] input: &str) {
    assert!(
        parse_byte_size(input).is_err(),
        "expected `{input}` to be rejected"
    );
}

// -- CLI memory guard: integration ------------------------------------------

#[rstest]
#[case::tiny(100)]
#[case::zero(0)]
fn run_command_rejects_when_max_bytes_exceeded(#[case] limit: u64) -> TestResult {
    let dir = temp_dir();
    let path = create_diagonal_file(&dir)?;
    let err = run_command_expecting_error(
        RunCommand {
            max_bytes: Some(limit),
            ..parquet_command(path, 2)
        },
        "limit must be exceeded",
    );
    assert!(
        matches!(err, CliError::MemoryLimitExceeded { limit: reported, .. } if reported == limit),
        "expected MemoryLimitExceeded, got {err:?}"
    );
    Ok(())
}

#[rstest]
fn run_command_succeeds_when_max_bytes_sufficient() -> TestResult {
    let dir = temp_dir();
    let path = create_diagonal_file(&dir)?;
    let summary = run_command(RunCommand {
        max_bytes: Some(1_073_741_824),
        ..parquet_command(path, 2)
    })?;
    assert_eq!(summary.graph.n_points(), 4);
    Ok(())
}

#[rstest]
fn clap_parses_max_bytes_flag() {
    let args = [
        "reachgraph",
        "run",
        "--max-bytes",
        "2G",
        "parquet",
        "data.parquet",
        "--column",
        "features",
    ];
    let cli = Cli::try_parse_from(args).expect("valid args must parse");
    let Command::Run(cmd) = cli.command;
    assert_eq!(cmd.max_bytes, Some(2 * 1024 * 1024 * 1024));
}

#[rstest]
fn clap_rejects_malformed_max_bytes() {
    let args = [
        "reachgraph",
        "run",
        "--max-bytes",
        "lots",
        "parquet",
        "data.parquet",
        "--column",
        "features",
    ];
    assert!(Cli::try_parse_from(args).is_err());
}
