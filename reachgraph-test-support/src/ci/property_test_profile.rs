//! Property-test run profile parsing for CI and local overrides.
//!
//! The core property suites (neighbour search, orchestration, and graph
//! invariants) read their case counts through [`ProptestRunProfile`], so CI
//! can raise the counts for nightly runs without touching the tests.

use std::env;

/// Suite-specific case count override; takes precedence over
/// [`PROGTEST_CASES_ENV_KEY`].
pub const REACHGRAPH_PBT_CASES_ENV_KEY: &str = "REACHGRAPH_PBT_CASES";
/// Workspace-wide proptest case count override.
pub const PROGTEST_CASES_ENV_KEY: &str = "PROGTEST_CASES";
/// Environment variable controlling proptest process forking.
pub const REACHGRAPH_PBT_FORK_ENV_KEY: &str = "REACHGRAPH_PBT_FORK";

/// Runtime profile for property-test execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Load a profile from environment variables with provided defaults.
    ///
    /// Case counts come from [`REACHGRAPH_PBT_CASES_ENV_KEY`] when it holds a
    /// valid value, then [`PROGTEST_CASES_ENV_KEY`], then `default_cases`.
    ///
    /// # Examples
    ///
    /// ```
    /// use reachgraph_test_support::ci::property_test_profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(64, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        let cases = read_env(REACHGRAPH_PBT_CASES_ENV_KEY, parse_cases)
            .or_else(|| read_env(PROGTEST_CASES_ENV_KEY, parse_cases))
            .unwrap_or(default_cases);
        let fork = read_env(REACHGRAPH_PBT_FORK_ENV_KEY, parse_bool).unwrap_or(default_fork);
        Self { cases, fork }
    }

    /// Number of cases to run per property.
    #[must_use]
    pub fn cases(&self) -> u32 {
        self.cases
    }

    /// Whether to run proptest cases in forked subprocesses.
    #[must_use]
    pub fn fork(&self) -> bool {
        self.fork
    }
}

/// Reads and parses `key`, logging and discarding malformed values.
fn read_env<T, F>(key: &'static str, parser: F) -> Option<T>
where
    F: Fn(&str) -> Result<T, String>,
{
    let raw = env::var(key).ok()?;
    match parser(&raw) {
        Ok(value) => Some(value),
        Err(reason) => {
            tracing::warn!(
                env = key,
                raw = %raw,
                reason = %reason,
                "ignoring invalid property-test override",
            );
            None
        }
    }
}

fn parse_cases(raw: &str) -> Result<u32, String> {
    let parsed = raw
        .trim()
        .parse::<u32>()
        .map_err(|error| format!("parse error: {error}"))?;
    if parsed == 0 {
        return Err("cases must be > 0".to_owned());
    }
    Ok(parsed)
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected one of: true/false/1/0/yes/no/on/off".to_owned()),
    }
}
