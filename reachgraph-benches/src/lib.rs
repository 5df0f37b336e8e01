//! Benchmark support crate for reachgraph.
//!
//! Provides seeded synthetic point clouds and parameter types used by the
//! Criterion benchmarks for the neighbour search and the full graph build.

pub mod error;
pub mod params;
pub mod source;
