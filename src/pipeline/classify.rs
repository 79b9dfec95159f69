//! Geometric classification of clusters as vehicle-like objects.
//!
//! A cluster is promoted to dynamic when its bounding box looks like a
//! parked vehicle: height, width, and length inside the configured ranges
//! and point density below the sparse-surface cutoff. Width and length are
//! the sorted horizontal extents, so the decision does not depend on the
//! vehicle's heading relative to the axes.

use crate::config::ClassificationConfig;
use crate::core::store::{Label, PointStore};

use super::clustering::Cluster;

#[inline]
fn in_range(value: f32, range: &[f32; 2]) -> bool {
    value >= range[0] && value <= range[1]
}

/// Does this cluster's bounding box match the vehicle profile?
///
/// All criteria must hold: height, width, and length within their inclusive
/// ranges, and density strictly below `max_density`. Width is the smaller of
/// the two horizontal extents, length the larger.
pub fn is_vehicle_like(cluster: &Cluster, config: &ClassificationConfig) -> bool {
    let extents = cluster.extents();
    let height = extents[2];
    let (width, length) = if extents[0] <= extents[1] {
        (extents[0], extents[1])
    } else {
        (extents[1], extents[0])
    };

    in_range(height, &config.height_range)
        && in_range(width, &config.width_range)
        && in_range(length, &config.length_range)
        && cluster.density() < config.max_density
}

/// Label vehicle-like clusters as `Dynamic`.
///
/// Members of rejected clusters are demoted to `StaticCandidate`.
/// Manually-labeled members are never overwritten. Returns the number of
/// clusters promoted and the number of points labeled dynamic.
pub fn classify_clusters(
    store: &mut PointStore,
    clusters: &[Cluster],
    config: &ClassificationConfig,
) -> (usize, usize) {
    let mut dynamic_clusters = 0;
    let mut dynamic_points = 0;

    for cluster in clusters {
        if cluster.is_empty() {
            continue;
        }
        let accepted = is_vehicle_like(cluster, config);
        if accepted {
            dynamic_clusters += 1;
        }
        for &i in &cluster.points {
            if store.label(i).is_manual() {
                continue;
            }
            if accepted {
                store.set_label(i, Label::Dynamic);
                dynamic_points += 1;
            } else {
                store.set_label(i, Label::StaticCandidate);
            }
        }
    }

    log::debug!(
        "classification: {} of {} clusters vehicle-like, {} points dynamic",
        dynamic_clusters,
        clusters.len(),
        dynamic_points
    );

    (dynamic_clusters, dynamic_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> ClassificationConfig {
        ClassificationConfig {
            height_range: [0.5, 3.0],
            width_range: [1.0, 3.0],
            length_range: [2.0, 8.0],
            max_density: 0.1,
        }
    }

    /// Build a cluster with the given box extents and point count without
    /// going through the clusterer.
    fn cluster_with_box(extents: [f32; 3], count: usize) -> Cluster {
        Cluster {
            points: (0..count).collect(),
            min: [0.0; 3],
            max: extents,
        }
    }

    #[test]
    fn test_vehicle_box_accepted() {
        // 4 x 2 x 1.5 m box, 1 point: density well below the cutoff
        let cluster = cluster_with_box([4.0, 2.0, 1.5], 1);
        assert!(is_vehicle_like(&cluster, &default_config()));
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let config = default_config();

        assert!(is_vehicle_like(&cluster_with_box([2.0, 1.0, 0.5], 1), &config));
        assert!(is_vehicle_like(&cluster_with_box([8.0, 3.0, 3.0], 1), &config));

        // Just outside either end of the height range
        assert!(!is_vehicle_like(&cluster_with_box([4.0, 2.0, 0.49], 1), &config));
        assert!(!is_vehicle_like(&cluster_with_box([4.0, 2.0, 3.01], 1), &config));
    }

    #[test]
    fn test_each_criterion_rejects() {
        let config = default_config();

        // Too narrow, too wide, too short, too long
        assert!(!is_vehicle_like(&cluster_with_box([4.0, 0.9, 1.5], 1), &config));
        assert!(!is_vehicle_like(&cluster_with_box([4.0, 3.1, 1.5], 1), &config));
        assert!(!is_vehicle_like(&cluster_with_box([1.9, 1.5, 1.5], 1), &config));
        assert!(!is_vehicle_like(&cluster_with_box([8.1, 2.0, 1.5], 1), &config));
    }

    #[test]
    fn test_density_cutoff_is_strict() {
        let config = default_config();

        // 10 x 10 x 1 m box holds 100 m^3; 10 points put density exactly at
        // the cutoff, which must reject
        let config = ClassificationConfig {
            height_range: [0.5, 3.0],
            width_range: [1.0, 20.0],
            length_range: [2.0, 20.0],
            ..config
        };
        let at_cutoff = cluster_with_box([10.0, 10.0, 1.0], 10);
        assert!((at_cutoff.density() - 0.1).abs() < 1e-6);
        assert!(!is_vehicle_like(&at_cutoff, &config));

        let below_cutoff = cluster_with_box([10.0, 10.0, 1.0], 9);
        assert!(is_vehicle_like(&below_cutoff, &config));
    }

    #[test]
    fn test_heading_independence() {
        // Same vehicle box with x and y extents swapped
        let config = default_config();
        assert!(is_vehicle_like(&cluster_with_box([4.0, 2.0, 1.5], 1), &config));
        assert!(is_vehicle_like(&cluster_with_box([2.0, 4.0, 1.5], 1), &config));
    }

    #[test]
    fn test_classify_labels_members() {
        let coords = vec![
            [0.0, 0.0, 0.0],
            [4.0, 2.0, 1.5],
            [2.0, 1.0, 0.7],
        ];
        let mut store = PointStore::from_coords(coords, None);
        for i in 0..3 {
            store.set_label(i, Label::DynamicCandidate);
        }
        store.set_label(2, Label::ManuallyKept);

        let cluster = Cluster::from_points(&store, vec![0, 1, 2]);
        let config = ClassificationConfig {
            max_density: 10.0,
            ..default_config()
        };

        let (clusters, points) = classify_clusters(&mut store, &[cluster], &config);

        assert_eq!(clusters, 1);
        assert_eq!(points, 2);
        assert_eq!(store.label(0), Label::Dynamic);
        assert_eq!(store.label(1), Label::Dynamic);
        assert_eq!(store.label(2), Label::ManuallyKept);
    }

    #[test]
    fn test_rejected_cluster_demoted_to_static() {
        let coords = vec![[0.0, 0.0, 0.0], [0.2, 0.1, 0.1]];
        let mut store = PointStore::from_coords(coords, None);
        for i in 0..2 {
            store.set_label(i, Label::DynamicCandidate);
        }

        let cluster = Cluster::from_points(&store, vec![0, 1]);
        let (clusters, points) = classify_clusters(&mut store, &[cluster], &default_config());

        assert_eq!(clusters, 0);
        assert_eq!(points, 0);
        assert_eq!(store.label(0), Label::StaticCandidate);
        assert_eq!(store.label(1), Label::StaticCandidate);
    }
}
