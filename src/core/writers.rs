//! Writers for labeled and cleaned point-cloud exports.
//!
//! Three output flavors:
//! - Labeled PLY: full cloud with the label code as an extra vertex property
//! - Cleaned PLY: only points that survive removal (not Dynamic/ManuallyRemoved)
//! - Labels CSV: coordinates plus label code and name, for external tooling

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::store::PointStore;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

fn io_err(path: &Path, source: std::io::Error) -> WriteError {
    WriteError::WriteFile {
        path: path.display().to_string(),
        source,
    }
}

fn write_ply_header(
    writer: &mut impl Write,
    num_points: usize,
    with_intensity: bool,
    with_label: bool,
) -> std::io::Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", num_points)?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    if with_intensity {
        writeln!(writer, "property float intensity")?;
    }
    if with_label {
        writeln!(writer, "property uchar label")?;
    }
    writeln!(writer, "end_header")
}

/// Write the full cloud to ASCII PLY with the label code as a vertex property.
pub fn write_labeled_ply(path: &Path, store: &PointStore) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    let intensity = store.intensity();
    write_ply_header(&mut writer, store.len(), intensity.is_some(), true)
        .map_err(|e| io_err(path, e))?;

    for (i, p) in store.coords().iter().enumerate() {
        let result = match intensity {
            Some(values) => writeln!(
                writer,
                "{:.6} {:.6} {:.6} {:.6} {}",
                p[0],
                p[1],
                p[2],
                values[i],
                store.label(i).code()
            ),
            None => writeln!(
                writer,
                "{:.6} {:.6} {:.6} {}",
                p[0],
                p[1],
                p[2],
                store.label(i).code()
            ),
        };
        result.map_err(|e| io_err(path, e))?;
    }

    writer.flush().map_err(|e| io_err(path, e))
}

/// Write only the points that survive removal to ASCII PLY.
///
/// Points labeled Dynamic or ManuallyRemoved are dropped; everything else,
/// including unclassified points, is kept. Returns the number of points
/// written.
pub fn write_cleaned_ply(path: &Path, store: &PointStore) -> Result<usize> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;

    let intensity = store.intensity();
    let kept = store
        .labels()
        .iter()
        .filter(|label| !label.is_removed())
        .count();

    write_ply_header(&mut writer, kept, intensity.is_some(), false)
        .map_err(|e| io_err(path, e))?;

    for (i, p) in store.coords().iter().enumerate() {
        if store.label(i).is_removed() {
            continue;
        }
        let result = match intensity {
            Some(values) => writeln!(
                writer,
                "{:.6} {:.6} {:.6} {:.6}",
                p[0], p[1], p[2], values[i]
            ),
            None => writeln!(writer, "{:.6} {:.6} {:.6}", p[0], p[1], p[2]),
        };
        result.map_err(|e| io_err(path, e))?;
    }

    writer.flush().map_err(|e| io_err(path, e))?;
    Ok(kept)
}

/// Write coordinates and labels to CSV with `x,y,z,label,label_name` columns.
pub fn write_labels_csv(path: &Path, store: &PointStore) -> Result<()> {
    ensure_parent_dirs(path)?;
    let writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    let csv_err = |e: csv::Error| WriteError::CsvError {
        path: path.display().to_string(),
        source: e,
    };

    csv_writer
        .write_record(["x", "y", "z", "label", "label_name"])
        .map_err(csv_err)?;

    for (i, p) in store.coords().iter().enumerate() {
        let label = store.label(i);
        csv_writer
            .write_record([
                format!("{:.6}", p[0]),
                format!("{:.6}", p[1]),
                format!("{:.6}", p[2]),
                label.code().to_string(),
                label.name().to_string(),
            ])
            .map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::load_ply;
    use crate::core::store::Label;
    use tempfile::TempDir;

    fn labeled_store() -> PointStore {
        let mut store = PointStore::from_coords(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [3.0, 0.0, 0.0],
            ],
            Some(vec![0.1, 0.2, 0.3, 0.4]),
        );
        store.set_label(0, Label::Ground);
        store.set_label(1, Label::Dynamic);
        store.set_label(2, Label::ManuallyRemoved);
        store.set_label(3, Label::ManuallyKept);
        store
    }

    #[test]
    fn test_labeled_ply_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labeled.ply");
        let store = labeled_store();

        write_labeled_ply(&path, &store).unwrap();

        let cloud = load_ply(&path).unwrap();
        assert_eq!(cloud.len(), 4);
        assert_eq!(cloud.coords[3], [3.0, 0.0, 0.0]);
        assert_eq!(cloud.intensity, Some(vec![0.1, 0.2, 0.3, 0.4]));
    }

    #[test]
    fn test_cleaned_ply_drops_removed_points() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clean.ply");
        let store = labeled_store();

        let kept = write_cleaned_ply(&path, &store).unwrap();
        assert_eq!(kept, 2);

        let cloud = load_ply(&path).unwrap();
        assert_eq!(cloud.len(), 2);
        // Ground point and manually-kept point survive
        assert_eq!(cloud.coords[0], [0.0, 0.0, 0.0]);
        assert_eq!(cloud.coords[1], [3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_labels_csv_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labels.csv");
        let store = labeled_store();

        write_labels_csv(&path, &store).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "x,y,z,label,label_name");
        assert!(lines[1].ends_with(",1,ground"));
        assert!(lines[3].ends_with(",6,manually_removed"));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out").join("labels.csv");
        let store = labeled_store();

        write_labels_csv(&path, &store).unwrap();
        assert!(path.exists());
    }
}
