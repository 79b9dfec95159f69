//! Automatic detection stages: ground plane, height filter, clustering,
//! geometric classification, and the orchestrating pipeline.

pub mod classify;
pub mod clustering;
pub mod detector;
pub mod ground;
pub mod height;

// Re-export key types for convenience
pub use classify::{classify_clusters, is_vehicle_like};
pub use clustering::{cluster_candidates, Cluster};
pub use detector::{process_cloud_file, run_detection, DetectionError, DetectionReport};
pub use ground::{fit_ground_plane, GroundError, PlaneModel};
pub use height::{filter_by_height, HeightError};
