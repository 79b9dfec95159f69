//! Dynamic-object removal pipeline for static LIDAR point-cloud maps.
//!
//! This crate provides tools for:
//! - Loading ASCII PLY and Cartesian CSV point clouds into an indexed store
//! - RANSAC ground-plane estimation (seedable, parallel trials)
//! - Height filtering against the fitted plane
//! - DBSCAN clustering of above-ground candidates (parallelized)
//! - Geometric vehicle-shape classification of clusters
//! - Interactive label editing with undo/redo for operator corrections
//!
//! # Example
//!
//! ```no_run
//! use map_cleaner::config::PipelineConfig;
//! use map_cleaner::core::loaders::load_cloud;
//! use map_cleaner::pipeline::run_detection;
//!
//! let cloud = load_cloud(std::path::Path::new("map.ply")).unwrap();
//! let mut store = cloud.into_store();
//! let report = run_detection(&mut store, &PipelineConfig::default()).unwrap();
//! println!("{} dynamic points", report.dynamic_points);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod edit;
pub mod pipeline;
pub mod visualization;

pub use config::{
    ClassificationConfig, ClusteringConfig, HeightFilterConfig, PipelineConfig, RansacConfig,
};
pub use crate::core::store::{Label, PointStore};
pub use edit::{EditSession, ManualLabel, SelectionVolume};
pub use pipeline::{run_detection, DetectionReport, PlaneModel};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
