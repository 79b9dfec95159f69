//! Configuration types for the map-cleaning pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors produced by configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} range is inverted: [{min}, {max}]")]
    InvertedRange { field: &'static str, min: f32, max: f32 },

    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: usize,
        value: usize,
    },

    #[error("min_inlier_fraction must be in (0, 1], got {0}")]
    BadInlierFraction(f32),
}

fn check_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            field,
            value: value as f64,
        })
    }
}

fn check_range(field: &'static str, range: [f32; 2]) -> Result<(), ConfigError> {
    if range[0] > range[1] {
        Err(ConfigError::InvertedRange {
            field,
            min: range[0],
            max: range[1],
        })
    } else {
        Ok(())
    }
}

/// Configuration for RANSAC ground-plane estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RansacConfig {
    /// Maximum number of sampling iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Maximum point-to-plane distance for a point to count as an inlier (meters)
    #[serde(default = "default_inlier_distance")]
    pub inlier_distance_threshold: f32,

    /// Minimum fraction of points that must support the winning plane
    #[serde(default = "default_min_inlier_fraction")]
    pub min_inlier_fraction: f32,

    /// Re-sample attempts per iteration when the sampled triple is collinear,
    /// before the iteration is counted as consumed
    #[serde(default = "default_collinear_retry_cap")]
    pub collinear_retry_cap: usize,

    /// Seed for the sampling RNG; a fixed seed fixes the selected plane
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_iterations() -> usize {
    1000
}

fn default_inlier_distance() -> f32 {
    0.1
}

fn default_min_inlier_fraction() -> f32 {
    0.2
}

fn default_collinear_retry_cap() -> usize {
    10
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            inlier_distance_threshold: default_inlier_distance(),
            min_inlier_fraction: default_min_inlier_fraction(),
            collinear_retry_cap: default_collinear_retry_cap(),
            seed: None,
        }
    }
}

impl RansacConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_iterations",
                min: 1,
                value: 0,
            });
        }
        check_positive("inlier_distance_threshold", self.inlier_distance_threshold)?;
        if !(self.min_inlier_fraction > 0.0 && self.min_inlier_fraction <= 1.0) {
            return Err(ConfigError::BadInlierFraction(self.min_inlier_fraction));
        }
        Ok(())
    }
}

/// Configuration for height filtering above the ground plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightFilterConfig {
    /// Minimum height above the plane for a point to remain a dynamic candidate (meters)
    #[serde(default = "default_min_height")]
    pub min_height: f32,

    /// Maximum height above the plane for a point to remain a dynamic candidate (meters)
    #[serde(default = "default_max_height")]
    pub max_height: f32,
}

fn default_min_height() -> f32 {
    0.2
}

fn default_max_height() -> f32 {
    4.0
}

impl Default for HeightFilterConfig {
    fn default() -> Self {
        Self {
            min_height: default_min_height(),
            max_height: default_max_height(),
        }
    }
}

impl HeightFilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("height filter", [self.min_height, self.max_height])
    }
}

/// Configuration for DBSCAN clustering of dynamic candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Neighborhood radius (meters)
    #[serde(default = "default_eps")]
    pub eps: f32,

    /// Minimum neighbors (self included) for a point to be a core point
    #[serde(default = "default_min_pts")]
    pub min_pts: usize,
}

fn default_eps() -> f32 {
    0.5
}

fn default_min_pts() -> usize {
    10
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_pts: default_min_pts(),
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("eps", self.eps)?;
        if self.min_pts == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "min_pts",
                min: 1,
                value: 0,
            });
        }
        Ok(())
    }
}

/// Geometric acceptance criteria for vehicle-shaped clusters.
///
/// Ranges are inclusive on both ends; the density bound is strict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Accepted vertical extent [min, max] (meters)
    #[serde(default = "default_height_range")]
    pub height_range: [f32; 2],

    /// Accepted smaller horizontal extent [min, max] (meters)
    #[serde(default = "default_width_range")]
    pub width_range: [f32; 2],

    /// Accepted larger horizontal extent [min, max] (meters)
    #[serde(default = "default_length_range")]
    pub length_range: [f32; 2],

    /// Upper bound on cluster density (points per cubic meter, exclusive)
    #[serde(default = "default_max_density")]
    pub max_density: f32,
}

fn default_height_range() -> [f32; 2] {
    [0.5, 3.0]
}

fn default_width_range() -> [f32; 2] {
    [1.0, 3.0]
}

fn default_length_range() -> [f32; 2] {
    [2.0, 8.0]
}

fn default_max_density() -> f32 {
    0.1
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            height_range: default_height_range(),
            width_range: default_width_range(),
            length_range: default_length_range(),
            max_density: default_max_density(),
        }
    }
}

impl ClassificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("height_range", self.height_range)?;
        check_range("width_range", self.width_range)?;
        check_range("length_range", self.length_range)?;
        check_positive("max_density", self.max_density)
    }
}

/// Main pipeline configuration combining all stage configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub ransac: RansacConfig,

    #[serde(default)]
    pub height: HeightFilterConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub classification: ClassificationConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate every stage config, rejecting non-positive thresholds and
    /// inverted ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ransac.validate()?;
        self.height.validate()?;
        self.clustering.validate()?;
        self.classification.validate()
    }
}
