//! Benchmark parameter types.
//!
//! Each type renders as the Criterion benchmark id, so reports group runs by
//! the values that changed.

use std::fmt;

/// Parameters for a neighbour search benchmark run.
#[derive(Clone, Debug)]
pub struct KnnBenchParams {
    /// Number of points in the dataset.
    pub point_count: usize,
    /// Neighbours requested per point, self included.
    pub k: usize,
}

impl fmt::Display for KnnBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},k={}", self.point_count, self.k)
    }
}

/// Parameters for a full graph build benchmark run.
#[derive(Clone, Debug)]
pub struct GraphBenchParams {
    /// Number of points in the dataset.
    pub point_count: usize,
    /// Host devices the search is spread across.
    pub devices: usize,
}

impl fmt::Display for GraphBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},devices={}", self.point_count, self.devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn knn_params_render_as_ids() {
        let params = KnnBenchParams {
            point_count: 1_024,
            k: 8,
        };
        assert_eq!(params.to_string(), "n=1024,k=8");
    }

    #[rstest]
    fn graph_params_render_as_ids() {
        let params = GraphBenchParams {
            point_count: 512,
            devices: 4,
        };
        assert_eq!(params.to_string(), "n=512,devices=4");
    }
}
