//! Height filtering against the fitted ground plane.
//!
//! Every non-ground point gets its signed height above the plane; points
//! inside the configured band become dynamic candidates for clustering,
//! everything else is parked as a static candidate. Pure function of the
//! plane and thresholds, parallelized over points.

use rayon::prelude::*;
use thiserror::Error;

use crate::config::HeightFilterConfig;
use crate::core::store::{Label, PointStore};

use super::ground::PlaneModel;

/// Errors that can occur during height filtering.
#[derive(Debug, Error)]
pub enum HeightError {
    #[error("height filter requires a fitted ground plane")]
    MissingPlane,
}

/// Per-point outcome computed before any label is written.
enum Decision {
    Skip,
    Candidate,
    Static,
}

/// Partition non-ground points by height above the plane.
///
/// Points with height in `[min_height, max_height]` are labeled
/// `DynamicCandidate` and returned as the candidate set for clustering; the
/// rest become `StaticCandidate`. Ground-labeled and manually-labeled points
/// are left untouched. Labels are written only after all decisions are
/// computed, so a panic mid-computation cannot leave a partial write.
pub fn filter_by_height(
    store: &mut PointStore,
    plane: Option<&PlaneModel>,
    config: &HeightFilterConfig,
) -> Result<Vec<usize>, HeightError> {
    let plane = plane.ok_or(HeightError::MissingPlane)?;

    let decisions: Vec<Decision> = {
        let coords = store.coords();
        let labels = store.labels();
        coords
            .par_iter()
            .zip(labels.par_iter())
            .map(|(p, label)| {
                if *label == Label::Ground || label.is_manual() {
                    return Decision::Skip;
                }
                let height = plane.signed_distance(p);
                if height >= config.min_height && height <= config.max_height {
                    Decision::Candidate
                } else {
                    Decision::Static
                }
            })
            .collect()
    };

    let mut candidates = Vec::new();
    for (i, decision) in decisions.iter().enumerate() {
        match decision {
            Decision::Candidate => {
                store.set_label(i, Label::DynamicCandidate);
                candidates.push(i);
            }
            Decision::Static => store.set_label(i, Label::StaticCandidate),
            Decision::Skip => {}
        }
    }

    log::debug!(
        "height filter: {} candidates in [{}, {}] m of {} points",
        candidates.len(),
        config.min_height,
        config.max_height,
        store.len()
    );

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z_plane() -> PlaneModel {
        PlaneModel {
            normal: [0.0, 0.0, 1.0],
            offset: 0.0,
            distance_threshold: 0.1,
            inliers: Vec::new(),
        }
    }

    fn band() -> HeightFilterConfig {
        HeightFilterConfig {
            min_height: 0.2,
            max_height: 4.0,
        }
    }

    #[test]
    fn test_missing_plane() {
        let mut store = PointStore::from_coords(vec![[0.0; 3]], None);
        let result = filter_by_height(&mut store, None, &band());
        assert!(matches!(result, Err(HeightError::MissingPlane)));
        // No label was touched
        assert_eq!(store.label(0), Label::Unclassified);
    }

    #[test]
    fn test_band_partition() {
        let mut store = PointStore::from_coords(
            vec![
                [0.0, 0.0, 0.05], // below band
                [0.0, 0.0, 1.0],  // inside
                [0.0, 0.0, 5.0],  // above band
                [0.0, 0.0, 0.0],  // ground-labeled, untouched
            ],
            None,
        );
        store.set_label(3, Label::Ground);

        let candidates = filter_by_height(&mut store, Some(&z_plane()), &band()).unwrap();

        assert_eq!(candidates, vec![1]);
        assert_eq!(store.label(0), Label::StaticCandidate);
        assert_eq!(store.label(1), Label::DynamicCandidate);
        assert_eq!(store.label(2), Label::StaticCandidate);
        assert_eq!(store.label(3), Label::Ground);
    }

    #[test]
    fn test_band_edges_inclusive() {
        let mut store = PointStore::from_coords(
            vec![[0.0, 0.0, 0.2], [0.0, 0.0, 4.0], [0.0, 0.0, 4.001]],
            None,
        );

        let candidates = filter_by_height(&mut store, Some(&z_plane()), &band()).unwrap();
        assert_eq!(candidates, vec![0, 1]);
        assert_eq!(store.label(2), Label::StaticCandidate);
    }

    #[test]
    fn test_manual_labels_untouched() {
        let mut store =
            PointStore::from_coords(vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]], None);
        store.set_label(0, Label::ManuallyRemoved);
        store.set_label(1, Label::ManuallyKept);

        let candidates = filter_by_height(&mut store, Some(&z_plane()), &band()).unwrap();
        assert!(candidates.is_empty());
        assert_eq!(store.label(0), Label::ManuallyRemoved);
        assert_eq!(store.label(1), Label::ManuallyKept);
    }

    #[test]
    fn test_every_point_labeled() {
        // After filtering, every non-manual point carries exactly one of
        // Ground / StaticCandidate / DynamicCandidate
        let coords: Vec<[f32; 3]> = (0..100)
            .map(|i| [i as f32 * 0.1, 0.0, (i % 7) as f32])
            .collect();
        let mut store = PointStore::from_coords(coords, None);
        store.set_label(0, Label::Ground);

        filter_by_height(&mut store, Some(&z_plane()), &band()).unwrap();

        assert!(store.labels().iter().all(|l| matches!(
            l,
            Label::Ground | Label::StaticCandidate | Label::DynamicCandidate
        )));
    }
}
