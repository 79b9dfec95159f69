//! Manual review of detection results.
//!
//! An [`EditSession`] lets an operator select regions of the cloud, pin
//! points as kept or removed, and walk the edit history with undo/redo.
//! Manual labels take precedence over everything the automatic pipeline
//! decides later; re-running detection never overwrites them. The session
//! borrows the store mutably for each edit, so no automatic stage can run
//! concurrently with a manual pass.

use thiserror::Error;

use crate::core::store::{Label, PointStore};

/// Errors that can occur during manual editing.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

/// The two labels an operator can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualLabel {
    /// Keep these points in the cleaned export regardless of detection.
    Kept,
    /// Remove these points from the cleaned export.
    Removed,
}

impl ManualLabel {
    #[inline]
    pub fn as_label(self) -> Label {
        match self {
            ManualLabel::Kept => Label::ManuallyKept,
            ManualLabel::Removed => Label::ManuallyRemoved,
        }
    }
}

/// A spatial region for interactive selection.
#[derive(Debug, Clone)]
pub enum SelectionVolume {
    /// Axis-aligned box between two corners.
    Box { min: [f32; 3], max: [f32; 3] },
    /// Ball around a center point.
    Sphere { center: [f32; 3], radius: f32 },
}

impl SelectionVolume {
    fn contains(&self, p: &[f32; 3]) -> bool {
        match self {
            SelectionVolume::Box { min, max } => {
                (0..3).all(|axis| p[axis] >= min[axis] && p[axis] <= max[axis])
            }
            SelectionVolume::Sphere { center, radius } => {
                let dx = p[0] - center[0];
                let dy = p[1] - center[1];
                let dz = p[2] - center[2];
                dx * dx + dy * dy + dz * dz <= radius * radius
            }
        }
    }
}

/// One applied relabel, with enough state to reverse it exactly.
#[derive(Debug, Clone)]
struct EditOperation {
    indices: Vec<usize>,
    previous: Vec<Label>,
    applied: Label,
}

/// An interactive editing session over one point store.
///
/// Selections are read-only and leave the history untouched; only
/// [`EditSession::relabel`] pushes onto the undo stack. A new relabel after
/// an undo discards the redo history, as editors usually do.
#[derive(Debug, Default)]
pub struct EditSession {
    undo_stack: Vec<EditOperation>,
    redo_stack: Vec<EditOperation>,
    baseline: Option<Vec<Label>>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the current labels as the state [`EditSession::reset`]
    /// returns to.
    pub fn capture_baseline(&mut self, store: &PointStore) {
        self.baseline = Some(store.labels().to_vec());
    }

    /// Indices of all points inside the volume, ascending.
    ///
    /// Box selections query the KD-tree with the box's circumscribed sphere
    /// and filter exactly; sphere selections map directly onto a radius
    /// query.
    pub fn select_region(&self, store: &PointStore, volume: &SelectionVolume) -> Vec<usize> {
        let (center, radius) = match volume {
            SelectionVolume::Box { min, max } => {
                let center = [
                    (min[0] + max[0]) * 0.5,
                    (min[1] + max[1]) * 0.5,
                    (min[2] + max[2]) * 0.5,
                ];
                let dx = (max[0] - min[0]) * 0.5;
                let dy = (max[1] - min[1]) * 0.5;
                let dz = (max[2] - min[2]) * 0.5;
                (center, (dx * dx + dy * dy + dz * dz).sqrt())
            }
            SelectionVolume::Sphere { center, radius } => (*center, *radius),
        };

        let mut indices: Vec<usize> = store
            .within_radius(&center, radius)
            .into_iter()
            .filter(|&i| volume.contains(&store.point(i)))
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Assign a manual label to the given points.
    ///
    /// Records the previous labels on the undo stack and clears the redo
    /// stack. Returns the number of points relabeled.
    pub fn relabel(
        &mut self,
        store: &mut PointStore,
        indices: &[usize],
        label: ManualLabel,
    ) -> usize {
        if indices.is_empty() {
            return 0;
        }

        let applied = label.as_label();
        let previous: Vec<Label> = indices.iter().map(|&i| store.label(i)).collect();
        for &i in indices {
            store.set_label(i, applied);
        }

        self.undo_stack.push(EditOperation {
            indices: indices.to_vec(),
            previous,
            applied,
        });
        self.redo_stack.clear();

        log::debug!("relabeled {} points as {}", indices.len(), applied.name());
        indices.len()
    }

    /// Reverse the most recent relabel.
    pub fn undo(&mut self, store: &mut PointStore) -> Result<usize, EditError> {
        let op = self.undo_stack.pop().ok_or(EditError::NothingToUndo)?;
        for (&i, &label) in op.indices.iter().zip(op.previous.iter()) {
            store.set_label(i, label);
        }
        let count = op.indices.len();
        self.redo_stack.push(op);
        Ok(count)
    }

    /// Re-apply the most recently undone relabel.
    pub fn redo(&mut self, store: &mut PointStore) -> Result<usize, EditError> {
        let op = self.redo_stack.pop().ok_or(EditError::NothingToRedo)?;
        for &i in &op.indices {
            store.set_label(i, op.applied);
        }
        let count = op.indices.len();
        self.undo_stack.push(op);
        Ok(count)
    }

    /// Discard all edits made in this session.
    ///
    /// Restores the captured baseline when one exists; otherwise all manual
    /// labels revert to unclassified. The history is cleared either way.
    pub fn reset(&mut self, store: &mut PointStore) {
        match self.baseline.take() {
            Some(labels) => store.restore_labels(labels),
            None => {
                for i in 0..store.len() {
                    if store.label(i).is_manual() {
                        store.set_label(i, Label::Unclassified);
                    }
                }
            }
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    #[inline]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[inline]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }
}
