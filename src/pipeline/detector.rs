//! Detection pipeline orchestration.
//!
//! Runs the automatic stages in order (ground plane, height filter,
//! clustering, classification) against a point store, and wraps the whole
//! thing with file loading and export for the CLI. A failed run restores the
//! labels that were in place before it started.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use thiserror::Error;

use crate::config::{ConfigError, PipelineConfig};
use crate::core::loaders::load_cloud;
use crate::core::store::{Label, PointStore};
use crate::core::writers::{write_cleaned_ply, write_labeled_ply, write_labels_csv};
use crate::visualization::plot_labeled_cloud;

use super::classify::classify_clusters;
use super::clustering::cluster_candidates;
use super::ground::{fit_ground_plane, GroundError, PlaneModel};
use super::height::{filter_by_height, HeightError};

/// Errors that can occur while running the detection pipeline.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("ground estimation failed: {0}")]
    Ground(#[from] GroundError),

    #[error("height filtering failed: {0}")]
    Height(#[from] HeightError),
}

/// Summary of one detection run.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    /// The fitted ground plane.
    pub plane: PlaneModel,
    /// Points in the store when the run started.
    pub total_points: usize,
    /// Points labeled as ground.
    pub ground_points: usize,
    /// Points that entered clustering as dynamic candidates.
    pub candidate_points: usize,
    /// Clusters found among the candidates.
    pub clusters: usize,
    /// Clusters promoted to dynamic.
    pub dynamic_clusters: usize,
    /// Points labeled dynamic.
    pub dynamic_points: usize,
    /// Candidates that fell in no cluster.
    pub noise_points: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Run the full detection pipeline over the store.
///
/// All non-manual labels are recomputed from scratch, so the operation is
/// safe to repeat after threshold changes. Manually-assigned labels survive
/// every stage. If any stage fails, the labels present before the call are
/// restored and the error is returned.
pub fn run_detection(
    store: &mut PointStore,
    config: &PipelineConfig,
) -> Result<DetectionReport, DetectionError> {
    config.validate()?;

    let snapshot = store.labels().to_vec();
    match run_stages(store, config) {
        Ok(report) => Ok(report),
        Err(e) => {
            store.restore_labels(snapshot);
            Err(e)
        }
    }
}

fn run_stages(
    store: &mut PointStore,
    config: &PipelineConfig,
) -> Result<DetectionReport, DetectionError> {
    let started = Instant::now();
    let total_points = store.len();

    // Start from a clean slate; manual labels stay put
    for i in 0..store.len() {
        if !store.label(i).is_manual() {
            store.set_label(i, Label::Unclassified);
        }
    }

    let plane = fit_ground_plane(store, &config.ransac)?;
    let mut ground_points = 0;
    for &i in &plane.inliers {
        if !store.label(i).is_manual() {
            store.set_label(i, Label::Ground);
            ground_points += 1;
        }
    }

    let candidates = filter_by_height(store, Some(&plane), &config.height)?;

    let clusters = cluster_candidates(store, &candidates, &config.clustering);

    // Candidates that made it into no cluster are noise
    let mut in_cluster = vec![false; store.len()];
    for cluster in &clusters {
        for &i in &cluster.points {
            in_cluster[i] = true;
        }
    }
    let mut noise_points = 0;
    for &i in &candidates {
        if !in_cluster[i] {
            store.set_label(i, Label::StaticCandidate);
            noise_points += 1;
        }
    }

    let (dynamic_clusters, dynamic_points) =
        classify_clusters(store, &clusters, &config.classification);

    let report = DetectionReport {
        plane,
        total_points,
        ground_points,
        candidate_points: candidates.len(),
        clusters: clusters.len(),
        dynamic_clusters,
        dynamic_points,
        noise_points,
        elapsed: started.elapsed(),
    };

    log::info!(
        "detection: {} points, {} ground, {} candidates, {} clusters ({} dynamic), \
         {} dynamic points in {:.2?}",
        report.total_points,
        report.ground_points,
        report.candidate_points,
        report.clusters,
        report.dynamic_clusters,
        report.dynamic_points,
        report.elapsed
    );

    Ok(report)
}

/// Files produced by [`process_cloud_file`].
#[derive(Debug)]
pub struct DetectionOutputs {
    pub labeled_ply: PathBuf,
    pub cleaned_ply: PathBuf,
    pub labels_csv: PathBuf,
    pub plot: Option<PathBuf>,
    /// Points kept in the cleaned export.
    pub kept_points: usize,
    pub report: DetectionReport,
}

/// Load a cloud file, run detection, and write all exports to `output_dir`.
///
/// Output names derive from the input stem: `{stem}_labeled.ply`,
/// `{stem}_clean.ply`, `{stem}_labels.csv`, and optionally `{stem}_plot.png`.
pub fn process_cloud_file(
    input: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    plot: bool,
) -> anyhow::Result<DetectionOutputs> {
    let cloud = load_cloud(input)
        .with_context(|| format!("failed to load point cloud from '{}'", input.display()))?;
    log::info!("loaded {} points from '{}'", cloud.len(), input.display());

    let mut store = cloud.into_store();
    let report = run_detection(&mut store, config).context("detection pipeline failed")?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cloud");

    let labeled_ply = output_dir.join(format!("{stem}_labeled.ply"));
    let cleaned_ply = output_dir.join(format!("{stem}_clean.ply"));
    let labels_csv = output_dir.join(format!("{stem}_labels.csv"));

    write_labeled_ply(&labeled_ply, &store)
        .with_context(|| format!("failed to write '{}'", labeled_ply.display()))?;
    let kept_points = write_cleaned_ply(&cleaned_ply, &store)
        .with_context(|| format!("failed to write '{}'", cleaned_ply.display()))?;
    write_labels_csv(&labels_csv, &store)
        .with_context(|| format!("failed to write '{}'", labels_csv.display()))?;

    let plot = if plot {
        let path = output_dir.join(format!("{stem}_plot.png"));
        plot_labeled_cloud(&path, &store, 100_000)
            .with_context(|| format!("failed to render '{}'", path.display()))?;
        Some(path)
    } else {
        None
    };

    Ok(DetectionOutputs {
        labeled_ply,
        cleaned_ply,
        labels_csv,
        plot,
        kept_points,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassificationConfig, ClusteringConfig, HeightFilterConfig, RansacConfig};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Flat ground with mild sensor noise plus a dense 4 x 2 x 1.5 m block
    /// standing 1 m above it. The block is a regular grid so its DBSCAN
    /// connectivity is deterministic.
    fn parking_lot_scene() -> PointStore {
        let mut coords = Vec::new();
        let mut rng = StdRng::seed_from_u64(1234);

        for i in 0..100 {
            for j in 0..100 {
                let x = -25.0 + i as f32 * 0.5;
                let y = -25.0 + j as f32 * 0.5;
                let z = rng.random_range(-0.02..0.02);
                coords.push([x, y, z]);
            }
        }

        for i in 0..10 {
            for j in 0..10 {
                for k in 0..5 {
                    coords.push([
                        5.0 + i as f32 * (4.0 / 9.0),
                        5.0 + j as f32 * (2.0 / 9.0),
                        1.0 + k as f32 * (1.5 / 4.0),
                    ]);
                }
            }
        }

        PointStore::from_coords(coords, None)
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            ransac: RansacConfig {
                max_iterations: 64,
                inlier_distance_threshold: 0.1,
                min_inlier_fraction: 0.5,
                collinear_retry_cap: 10,
                seed: Some(9),
            },
            height: HeightFilterConfig {
                min_height: 0.2,
                max_height: 4.0,
            },
            clustering: ClusteringConfig {
                eps: 0.5,
                min_pts: 10,
            },
            classification: ClassificationConfig {
                height_range: [0.5, 3.0],
                width_range: [1.0, 3.0],
                length_range: [2.0, 8.0],
                max_density: 50.0,
            },
        }
    }

    #[test]
    fn test_detects_vehicle_block() {
        let mut store = parking_lot_scene();
        let report = run_detection(&mut store, &test_config()).unwrap();

        assert_eq!(report.total_points, 10_500);
        assert!(report.plane.normal[2] > 0.99);
        assert!(report.plane.offset.abs() <= 0.1);
        assert!(report.ground_points > 9_000);

        assert_eq!(report.candidate_points, 500);
        assert_eq!(report.clusters, 1);
        assert_eq!(report.dynamic_clusters, 1);
        assert_eq!(report.dynamic_points, 500);
        assert_eq!(report.noise_points, 0);

        let dynamic = store
            .labels()
            .iter()
            .filter(|l| **l == Label::Dynamic)
            .count();
        assert_eq!(dynamic, 500);
    }

    #[test]
    fn test_manual_labels_survive_rerun() {
        let mut store = parking_lot_scene();
        let config = test_config();

        run_detection(&mut store, &config).unwrap();

        // Pin one dynamic point as kept, then re-run
        let pinned = store
            .labels()
            .iter()
            .position(|l| *l == Label::Dynamic)
            .unwrap();
        store.set_label(pinned, Label::ManuallyKept);

        let report = run_detection(&mut store, &config).unwrap();

        assert_eq!(store.label(pinned), Label::ManuallyKept);
        assert_eq!(report.dynamic_points, 499);
    }

    #[test]
    fn test_failed_run_restores_labels() {
        let mut store = parking_lot_scene();
        let mut config = test_config();

        run_detection(&mut store, &config).unwrap();
        let before = store.labels().to_vec();

        // An impossible consensus requirement makes the ground stage fail
        config.ransac.min_inlier_fraction = 0.999;
        let result = run_detection(&mut store, &config);

        assert!(matches!(result, Err(DetectionError::Ground(_))));
        assert_eq!(store.labels(), &before[..]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut store = parking_lot_scene();
        let mut config = test_config();
        config.clustering.eps = 0.0;

        let result = run_detection(&mut store, &config);
        assert!(matches!(result, Err(DetectionError::Config(_))));
    }

    #[test]
    fn test_process_cloud_file_writes_outputs() {
        use crate::core::writers::write_labeled_ply;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let input = dir.path().join("lot.ply");
        let out = dir.path().join("out");

        let store = parking_lot_scene();
        write_labeled_ply(&input, &store).unwrap();

        let outputs = process_cloud_file(&input, &out, &test_config(), false).unwrap();

        assert!(outputs.labeled_ply.exists());
        assert!(outputs.cleaned_ply.exists());
        assert!(outputs.labels_csv.exists());
        assert!(outputs.plot.is_none());
        assert_eq!(outputs.kept_points, 10_000);
        assert_eq!(outputs.report.dynamic_points, 500);
    }
}
