//! RANSAC ground-plane estimation.
//!
//! Repeatedly samples three non-collinear points, fits the plane through
//! them, and keeps the candidate supported by the most inliers. Trials run
//! in parallel on the rayon pool with per-trial RNGs derived from the seed,
//! so a fixed seed yields the same plane regardless of thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::RansacConfig;
use crate::core::store::PointStore;

/// Errors that can occur during plane estimation.
#[derive(Debug, Error)]
pub enum GroundError {
    #[error("cannot fit a plane to {found} points, need at least 3")]
    InsufficientPoints { found: usize },

    #[error(
        "no plane reached inlier fraction {required:.2} within {iterations} iterations \
         (best: {best_inliers} of {total} points)"
    )]
    NoConsensus {
        iterations: usize,
        best_inliers: usize,
        total: usize,
        required: f32,
    },
}

/// A fitted ground plane: `normal . p + offset = 0`.
///
/// The normal is unit length and oriented upward (non-negative z), so
/// [`PlaneModel::signed_distance`] is positive above the ground. The inlier
/// set is frozen at fit time and not updated when labels change later.
#[derive(Debug, Clone)]
pub struct PlaneModel {
    /// Unit normal, z >= 0.
    pub normal: [f32; 3],
    /// Signed offset of the plane equation.
    pub offset: f32,
    /// Inlier distance threshold the model was fitted with (meters).
    pub distance_threshold: f32,
    /// Store indices of all points within the threshold at fit time.
    pub inliers: Vec<usize>,
}

impl PlaneModel {
    /// Signed distance of a point from the plane, positive above ground.
    #[inline]
    pub fn signed_distance(&self, p: &[f32; 3]) -> f32 {
        self.normal[0] * p[0] + self.normal[1] * p[1] + self.normal[2] * p[2] + self.offset
    }

    /// Fraction of the store's points that are inliers.
    pub fn inlier_fraction(&self, total: usize) -> f32 {
        if total == 0 {
            0.0
        } else {
            self.inliers.len() as f32 / total as f32
        }
    }
}

/// Best candidate from one RANSAC trial.
struct Candidate {
    normal: [f32; 3],
    offset: f32,
    inlier_count: usize,
    trial: usize,
}

#[inline]
fn sub(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn norm(v: &[f32; 3]) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Derive a per-trial RNG seed so trials are independent and reproducible.
#[inline]
fn trial_seed(seed: u64, trial: usize) -> u64 {
    seed ^ (trial as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Sample a plane through three distinct, non-collinear points.
///
/// Collinear triples (cross product near zero, relative to the edge lengths)
/// are re-sampled up to `retry_cap` additional times; `None` means the trial
/// is consumed without producing a candidate.
fn sample_plane(coords: &[[f32; 3]], rng: &mut StdRng, retry_cap: usize) -> Option<([f32; 3], f32)> {
    let n = coords.len();

    for _ in 0..=retry_cap {
        let a = rng.random_range(0..n);
        let mut b = rng.random_range(0..n);
        while b == a {
            b = rng.random_range(0..n);
        }
        let mut c = rng.random_range(0..n);
        while c == a || c == b {
            c = rng.random_range(0..n);
        }

        let (pa, pb, pc) = (&coords[a], &coords[b], &coords[c]);
        let v1 = sub(pb, pa);
        let v2 = sub(pc, pa);
        let cr = cross(&v1, &v2);
        let cr_norm = norm(&cr);

        if cr_norm <= 1e-6 * norm(&v1) * norm(&v2) {
            continue;
        }

        let mut normal = [cr[0] / cr_norm, cr[1] / cr_norm, cr[2] / cr_norm];
        // Orient upward so signed heights above ground are positive
        if normal[2] < 0.0 {
            normal = [-normal[0], -normal[1], -normal[2]];
        }
        let offset = -(normal[0] * pa[0] + normal[1] * pa[1] + normal[2] * pa[2]);
        return Some((normal, offset));
    }

    None
}

#[inline]
fn count_inliers(coords: &[[f32; 3]], normal: &[f32; 3], offset: f32, threshold: f32) -> usize {
    coords
        .iter()
        .filter(|p| (normal[0] * p[0] + normal[1] * p[1] + normal[2] * p[2] + offset).abs() <= threshold)
        .count()
}

/// Fit the ground plane with RANSAC.
///
/// Returns the best-supported plane, or an error if the store holds fewer
/// than 3 points or no candidate reaches `min_inlier_fraction` within
/// `max_iterations`. Labeling of inliers is left to the caller.
pub fn fit_ground_plane(
    store: &PointStore,
    config: &RansacConfig,
) -> Result<PlaneModel, GroundError> {
    let coords = store.coords();
    let n = coords.len();

    if n < 3 {
        return Err(GroundError::InsufficientPoints { found: n });
    }

    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let threshold = config.inlier_distance_threshold;

    let best = (0..config.max_iterations)
        .into_par_iter()
        .filter_map(|trial| {
            let mut rng = StdRng::seed_from_u64(trial_seed(seed, trial));
            let (normal, offset) = sample_plane(coords, &mut rng, config.collinear_retry_cap)?;
            let inlier_count = count_inliers(coords, &normal, offset, threshold);
            Some(Candidate {
                normal,
                offset,
                inlier_count,
                trial,
            })
        })
        // Deterministic reduction: more inliers wins, ties go to the earlier trial
        .reduce_with(|a, b| {
            if b.inlier_count > a.inlier_count
                || (b.inlier_count == a.inlier_count && b.trial < a.trial)
            {
                b
            } else {
                a
            }
        });

    let best = best.ok_or(GroundError::NoConsensus {
        iterations: config.max_iterations,
        best_inliers: 0,
        total: n,
        required: config.min_inlier_fraction,
    })?;

    if (best.inlier_count as f32) < config.min_inlier_fraction * n as f32 {
        return Err(GroundError::NoConsensus {
            iterations: config.max_iterations,
            best_inliers: best.inlier_count,
            total: n,
            required: config.min_inlier_fraction,
        });
    }

    let inliers: Vec<usize> = coords
        .par_iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let dist = best.normal[0] * p[0] + best.normal[1] * p[1] + best.normal[2] * p[2]
                + best.offset;
            (dist.abs() <= threshold).then_some(i)
        })
        .collect();

    log::debug!(
        "ground plane: normal ({:.3}, {:.3}, {:.3}), offset {:.3}, {} of {} inliers",
        best.normal[0],
        best.normal[1],
        best.normal[2],
        best.offset,
        inliers.len(),
        n
    );

    Ok(PlaneModel {
        normal: best.normal,
        offset: best.offset,
        distance_threshold: threshold,
        inliers,
    })
}
