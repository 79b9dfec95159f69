//! Point storage with per-point labels and a shared spatial index.
//!
//! A [`PointStore`] owns the immutable coordinates of a loaded map, a mutable
//! label per point, and a `kiddo` KD-tree built once at construction. The tree
//! is read-only for the lifetime of the store and is safe to query from
//! multiple rayon workers concurrently.

use kiddo::{ImmutableKdTree, SquaredEuclidean};

/// Per-point classification state.
///
/// Automatic detection passes write only `Ground`, `StaticCandidate`,
/// `DynamicCandidate` and `Dynamic`. The two manual labels are written
/// exclusively through the edit session and are never overwritten by a
/// subsequent automatic run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Label {
    Unclassified = 0,
    Ground = 1,
    StaticCandidate = 2,
    DynamicCandidate = 3,
    Dynamic = 4,
    ManuallyKept = 5,
    ManuallyRemoved = 6,
}

impl Label {
    /// Stable numeric code used in exported scalar fields.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Label::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Label::Unclassified),
            1 => Some(Label::Ground),
            2 => Some(Label::StaticCandidate),
            3 => Some(Label::DynamicCandidate),
            4 => Some(Label::Dynamic),
            5 => Some(Label::ManuallyKept),
            6 => Some(Label::ManuallyRemoved),
            _ => None,
        }
    }

    /// Display name used in CSV exports and summaries.
    pub fn name(self) -> &'static str {
        match self {
            Label::Unclassified => "unclassified",
            Label::Ground => "ground",
            Label::StaticCandidate => "static_candidate",
            Label::DynamicCandidate => "dynamic_candidate",
            Label::Dynamic => "dynamic",
            Label::ManuallyKept => "manually_kept",
            Label::ManuallyRemoved => "manually_removed",
        }
    }

    /// True for operator-assigned labels, which automatic passes must not touch.
    #[inline]
    pub fn is_manual(self) -> bool {
        matches!(self, Label::ManuallyKept | Label::ManuallyRemoved)
    }

    /// True for points that are dropped from a cleaned export.
    #[inline]
    pub fn is_removed(self) -> bool {
        matches!(self, Label::Dynamic | Label::ManuallyRemoved)
    }
}

/// Indexed point cloud with one label per point.
///
/// The point order is the stable identity used everywhere: plane inlier sets,
/// cluster membership and edit operations all refer to positions in this store.
#[derive(Debug)]
pub struct PointStore {
    coords: Vec<[f32; 3]>,
    intensity: Option<Vec<f32>>,
    labels: Vec<Label>,
    tree: Option<ImmutableKdTree<f32, 3>>,
}

impl PointStore {
    /// Build a store from coordinates and optional per-point intensity.
    ///
    /// The KD-tree is constructed here and never rebuilt; adding or removing
    /// points mid-session is not supported.
    pub fn from_coords(coords: Vec<[f32; 3]>, intensity: Option<Vec<f32>>) -> Self {
        debug_assert!(
            intensity.as_ref().map_or(true, |v| v.len() == coords.len()),
            "intensity array must parallel the coordinate array"
        );
        let tree = if coords.is_empty() {
            None
        } else {
            Some(ImmutableKdTree::new_from_slice(&coords))
        };
        let labels = vec![Label::Unclassified; coords.len()];
        Self {
            coords,
            intensity,
            labels,
            tree,
        }
    }

    /// Returns the number of points in the store.
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Returns true if the store holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// All coordinates, in identity order.
    #[inline]
    pub fn coords(&self) -> &[[f32; 3]] {
        &self.coords
    }

    /// Coordinate of a single point.
    #[inline]
    pub fn point(&self, index: usize) -> [f32; 3] {
        self.coords[index]
    }

    /// Optional per-point intensity, parallel to the coordinates.
    #[inline]
    pub fn intensity(&self) -> Option<&[f32]> {
        self.intensity.as_deref()
    }

    /// All labels, in identity order.
    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Label of a single point.
    #[inline]
    pub fn label(&self, index: usize) -> Label {
        self.labels[index]
    }

    /// Overwrite the label of a single point.
    #[inline]
    pub fn set_label(&mut self, index: usize, label: Label) {
        self.labels[index] = label;
    }

    /// Replace the whole label array, e.g. when rolling back a failed run.
    ///
    /// # Panics
    ///
    /// Panics if `labels` does not parallel the coordinate array.
    pub fn restore_labels(&mut self, labels: Vec<Label>) {
        assert_eq!(labels.len(), self.coords.len());
        self.labels = labels;
    }

    /// Indices of all points within `radius` of `center`, nearest first.
    pub fn within_radius(&self, center: &[f32; 3], radius: f32) -> Vec<usize> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        tree.within::<SquaredEuclidean>(center, radius * radius)
            .iter()
            .map(|nn| nn.item as usize)
            .collect()
    }
}
