//! Density-based clustering of dynamic candidates.
//!
//! Standard DBSCAN semantics over the candidate subset, backed by the
//! store's shared KD-tree: neighbor queries and core-point checks run in
//! parallel on the rayon pool, and cluster merging uses an atomic union-find
//! so no lock is needed while clusters grow. The final partition is
//! independent of processing order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::config::ClusteringConfig;
use crate::core::store::PointStore;

/// Union-find over candidate positions with lock-free merging.
///
/// Merges use compare-and-swap with the smaller root pointing at the larger,
/// which keeps the forest shallow enough without rank bookkeeping. Reads are
/// relaxed; the structure only needs to converge, not to observe a
/// consistent snapshot.
pub struct AtomicUnionFind {
    parent: Vec<AtomicUsize>,
}

impl AtomicUnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).map(AtomicUsize::new).collect(),
        }
    }

    /// Root of the set containing `x`, compressing paths opportunistically.
    pub fn find(&self, mut x: usize) -> usize {
        loop {
            let p = self.parent[x].load(Ordering::Relaxed);
            if p == x {
                return x;
            }
            let gp = self.parent[p].load(Ordering::Relaxed);
            if gp != p {
                // Point x at its grandparent; losing the race is harmless
                let _ = self.parent[x].compare_exchange_weak(
                    p,
                    gp,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
            }
            x = p;
        }
    }

    /// Merge the sets containing `x` and `y`. Returns false if already merged.
    pub fn union(&self, x: usize, y: usize) -> bool {
        loop {
            let root_x = self.find(x);
            let root_y = self.find(y);

            if root_x == root_y {
                return false;
            }

            let (small, large) = if root_x < root_y {
                (root_x, root_y)
            } else {
                (root_y, root_x)
            };

            match self.parent[small].compare_exchange_weak(
                small,
                large,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }
}

/// A spatial cluster of candidate points with its axis-aligned bounding box.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Store indices of the member points.
    pub points: Vec<usize>,
    /// Minimum corner of the bounding box.
    pub min: [f32; 3],
    /// Maximum corner of the bounding box.
    pub max: [f32; 3],
}

/// Volume floor that keeps density finite for flat or degenerate boxes.
const MIN_VOLUME: f32 = 1e-6;

impl Cluster {
    /// Build a cluster and its bounding box from member indices.
    pub fn from_points(store: &PointStore, points: Vec<usize>) -> Self {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for &i in &points {
            let p = store.point(i);
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        Self { points, min, max }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding-box edge lengths per axis.
    #[inline]
    pub fn extents(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Bounding-box volume, floored to keep density finite.
    pub fn volume(&self) -> f32 {
        let e = self.extents();
        (e[0] * e[1] * e[2]).max(MIN_VOLUME)
    }

    /// Points per cubic meter of bounding box.
    pub fn density(&self) -> f32 {
        self.points.len() as f32 / self.volume()
    }
}

/// Cluster the candidate subset with DBSCAN.
///
/// Two candidates are neighbors when their distance is at most `eps`; a
/// candidate with at least `min_pts` neighbors (itself included) is a core
/// point; clusters are the maximal sets connected through core points, with
/// border points joining their nearest core neighbor. Candidates in no
/// cluster are noise and are simply absent from the result — an empty
/// candidate set is a valid input producing zero clusters.
///
/// Neighbor lookups go through the store's KD-tree and are filtered to the
/// candidate subset, so ground and static points never leak into a cluster.
pub fn cluster_candidates(
    store: &PointStore,
    candidates: &[usize],
    config: &ClusteringConfig,
) -> Vec<Cluster> {
    let m = candidates.len();
    if m == 0 {
        return Vec::new();
    }

    // Map store index -> candidate position; usize::MAX marks non-candidates
    let mut cand_pos = vec![usize::MAX; store.len()];
    for (pos, &idx) in candidates.iter().enumerate() {
        cand_pos[idx] = pos;
    }

    // Phase 1: per-candidate neighbor lists (candidate positions, nearest first)
    let neighbors: Vec<Vec<usize>> = candidates
        .par_iter()
        .map(|&idx| {
            store
                .within_radius(&store.point(idx), config.eps)
                .into_iter()
                .filter_map(|j| (cand_pos[j] != usize::MAX).then_some(cand_pos[j]))
                .collect()
        })
        .collect();

    // Phase 2: core-point identification
    let is_core: Vec<bool> = neighbors
        .par_iter()
        .map(|n| n.len() >= config.min_pts)
        .collect();

    // Phase 3: merge core points that are neighbors
    let uf = AtomicUnionFind::new(m);
    (0..m).into_par_iter().for_each(|i| {
        if is_core[i] {
            for &j in &neighbors[i] {
                if is_core[j] {
                    uf.union(i, j);
                }
            }
        }
    });

    // Phase 4: collect members; border points join their nearest core neighbor
    let mut root_to_cluster: HashMap<usize, usize> = HashMap::new();
    let mut members: Vec<Vec<usize>> = Vec::new();

    for i in 0..m {
        let root = if is_core[i] {
            Some(uf.find(i))
        } else {
            neighbors[i]
                .iter()
                .find(|&&j| is_core[j])
                .map(|&j| uf.find(j))
        };

        if let Some(root) = root {
            let next_id = members.len();
            let cluster_id = *root_to_cluster.entry(root).or_insert(next_id);
            if cluster_id == members.len() {
                members.push(Vec::new());
            }
            members[cluster_id].push(candidates[i]);
        }
    }

    members
        .into_iter()
        .map(|points| Cluster::from_points(store, points))
        .collect()
}
