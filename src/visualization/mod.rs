//! Top-down scatter rendering of labeled clouds.
//!
//! Renders the x-y projection of the cloud to a PNG, one dot per point,
//! colored by label. Large clouds are subsampled with a fixed stride so the
//! output stays bounded and reproducible.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::store::{Label, PointStore};

/// Errors that can occur during rendering.
#[derive(Debug, Error)]
pub enum VisualizationError {
    #[error("cannot render an empty point cloud")]
    EmptyCloud,

    #[error("rendering failed: {0}")]
    Render(String),
}

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;

/// Display color for each label.
pub fn label_color(label: Label) -> RGBColor {
    match label {
        Label::Unclassified => RGBColor(150, 150, 150),
        Label::Ground => RGBColor(110, 80, 50),
        Label::StaticCandidate => RGBColor(60, 100, 200),
        Label::DynamicCandidate => RGBColor(240, 150, 30),
        Label::Dynamic => RGBColor(220, 40, 40),
        Label::ManuallyKept => RGBColor(40, 160, 60),
        Label::ManuallyRemoved => RGBColor(150, 50, 180),
    }
}

/// Padded x-y bounds of the cloud.
fn compute_bounds(store: &PointStore) -> (f32, f32, f32, f32) {
    let mut x_min = f32::MAX;
    let mut x_max = f32::MIN;
    let mut y_min = f32::MAX;
    let mut y_max = f32::MIN;

    for p in store.coords() {
        x_min = x_min.min(p[0]);
        x_max = x_max.max(p[0]);
        y_min = y_min.min(p[1]);
        y_max = y_max.max(p[1]);
    }

    let pad_x = ((x_max - x_min) * 0.05).max(1.0);
    let pad_y = ((y_max - y_min) * 0.05).max(1.0);
    (x_min - pad_x, x_max + pad_x, y_min - pad_y, y_max + pad_y)
}

/// Render the labeled cloud to a PNG, subsampled to at most `max_points`.
pub fn plot_labeled_cloud(
    path: &Path,
    store: &PointStore,
    max_points: usize,
) -> Result<(), VisualizationError> {
    if store.is_empty() {
        return Err(VisualizationError::EmptyCloud);
    }

    let stride = store.len().div_ceil(max_points.max(1)).max(1);
    let (x_min, x_max, y_min, y_max) = compute_bounds(store);

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| VisualizationError::Render(e.to_string()))?;

    // No text elements: the build carries no font rasterizer
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| VisualizationError::Render(e.to_string()))?;

    chart
        .draw_series(
            store
                .coords()
                .iter()
                .enumerate()
                .step_by(stride)
                .map(|(i, p)| {
                    Circle::new((p[0], p[1]), 1, label_color(store.label(i)).filled())
                }),
        )
        .map_err(|e| VisualizationError::Render(e.to_string()))?;

    root.present()
        .map_err(|e| VisualizationError::Render(e.to_string()))?;

    log::info!(
        "rendered {} of {} points to '{}'",
        store.len().div_ceil(stride),
        store.len(),
        path.display()
    );

    Ok(())
}
