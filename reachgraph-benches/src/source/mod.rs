//! Seeded synthetic point clouds for benchmarking.
//!
//! Every generator is deterministic for a given seed so repeated benchmark
//! runs measure identical inputs.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use reachgraph_core::{PointSet, PointSetError};

/// Errors that may occur while generating benchmark points.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SyntheticError {
    /// The requested point count was zero.
    #[error("point count must be greater than zero")]
    ZeroPoints,
    /// The requested dimension count was zero.
    #[error("dimension count must be greater than zero")]
    ZeroDimensions,
    /// The requested cluster count was zero.
    #[error("cluster count must be greater than zero")]
    ZeroClusters,
    /// The configured cluster count exceeded the available points.
    #[error("cluster count ({cluster_count}) must not exceed point count ({point_count})")]
    ClusterCountExceedsPointCount {
        /// Number of clusters requested.
        cluster_count: usize,
        /// Number of points requested.
        point_count: usize,
    },
    /// The requested `point_count * dimensions` overflowed `usize`.
    #[error("point_count * dimensions overflows usize")]
    Overflow,
    /// A floating-point generator parameter was invalid.
    #[error("invalid floating-point parameter `{parameter}`")]
    InvalidFloatParameter {
        /// Name of the invalid parameter.
        parameter: &'static str,
    },
}

/// Uniform random vectors in the unit hypercube.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Number of points to generate.
    pub point_count: usize,
    /// Dimensionality of each vector.
    pub dimensions: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

/// Points scattered uniformly around randomly placed centroids.
#[derive(Clone, Debug)]
pub struct ClusteredConfig {
    /// Number of points to generate.
    pub point_count: usize,
    /// Dimensionality of each vector.
    pub dimensions: usize,
    /// Number of clusters; points are assigned round-robin.
    pub cluster_count: usize,
    /// Half-width of the cube centroids are drawn from.
    pub separation: f32,
    /// Half-width of the noise added around each centroid.
    pub spread: f32,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

/// A generated row-major point buffer.
#[derive(Clone, Debug)]
pub struct SyntheticPoints {
    name: &'static str,
    data: Vec<f32>,
    point_count: usize,
    dimensions: usize,
}

impl SyntheticPoints {
    /// Generates uniform vectors in `[0, 1)^d`.
    ///
    /// # Errors
    /// Returns [`SyntheticError`] when the configuration is invalid.
    pub fn generate(config: &SyntheticConfig) -> Result<Self, SyntheticError> {
        let total = checked_total(config.point_count, config.dimensions)?;
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let data: Vec<f32> = (0..total)
            .map(|_| rng.gen_range(0.0_f32..1.0_f32))
            .collect();
        Ok(Self {
            name: "synthetic-uniform",
            data,
            point_count: config.point_count,
            dimensions: config.dimensions,
        })
    }

    /// Generates clustered vectors.
    ///
    /// # Errors
    /// Returns [`SyntheticError`] when the configuration is invalid.
    #[expect(
        clippy::float_arithmetic,
        reason = "noise is added to centroid coordinates"
    )]
    pub fn generate_clustered(config: &ClusteredConfig) -> Result<Self, SyntheticError> {
        let total = checked_total(config.point_count, config.dimensions)?;
        validate_clusters(config)?;

        let mut rng = SmallRng::seed_from_u64(config.seed);
        let centroids: Vec<Vec<f32>> = (0..config.cluster_count)
            .map(|_| {
                (0..config.dimensions)
                    .map(|_| rng.gen_range(-config.separation..config.separation))
                    .collect()
            })
            .collect();

        let mut data = Vec::with_capacity(total);
        for centroid in centroids.iter().cycle().take(config.point_count) {
            data.extend(
                centroid
                    .iter()
                    .map(|coordinate| coordinate + rng.gen_range(-config.spread..config.spread)),
            );
        }
        Ok(Self {
            name: "synthetic-clustered",
            data,
            point_count: config.point_count,
            dimensions: config.dimensions,
        })
    }

    /// Human-readable generator name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Number of generated rows.
    #[must_use]
    pub const fn point_count(&self) -> usize {
        self.point_count
    }

    /// Width of each row.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Row-major coordinates.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Borrows the buffer as a validated [`PointSet`].
    ///
    /// # Errors
    /// Returns [`PointSetError`] if the buffer is malformed, which the
    /// generators never produce.
    pub fn points(&self) -> Result<PointSet<'_>, PointSetError> {
        PointSet::new(&self.data, self.point_count, self.dimensions)
    }
}

fn checked_total(point_count: usize, dimensions: usize) -> Result<usize, SyntheticError> {
    if point_count == 0 {
        return Err(SyntheticError::ZeroPoints);
    }
    if dimensions == 0 {
        return Err(SyntheticError::ZeroDimensions);
    }
    point_count
        .checked_mul(dimensions)
        .ok_or(SyntheticError::Overflow)
}

fn validate_clusters(config: &ClusteredConfig) -> Result<(), SyntheticError> {
    if config.cluster_count == 0 {
        return Err(SyntheticError::ZeroClusters);
    }
    if config.cluster_count > config.point_count {
        return Err(SyntheticError::ClusterCountExceedsPointCount {
            cluster_count: config.cluster_count,
            point_count: config.point_count,
        });
    }
    validate_positive(config.separation, "separation")?;
    validate_positive(config.spread, "spread")
}

fn validate_positive(value: f32, parameter: &'static str) -> Result<(), SyntheticError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SyntheticError::InvalidFloatParameter { parameter })
    }
}
