//! Loaders for ASCII PLY and Cartesian CSV point-cloud files.
//!
//! Both formats carry x, y, z coordinates and an optional per-point scalar
//! intensity. Coordinates and intensity survive a load/export cycle losslessly
//! up to text formatting precision.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use super::store::PointStore;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Invalid PLY file: {0}")]
    InvalidPly(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Raw arrays read from a point-cloud file, before indexing.
#[derive(Debug, Clone)]
pub struct LoadedCloud {
    /// Point coordinates in file order.
    pub coords: Vec<[f32; 3]>,
    /// Optional per-point intensity, parallel to `coords`.
    pub intensity: Option<Vec<f32>>,
}

impl LoadedCloud {
    /// Returns the number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Returns true if no points were loaded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Build the indexed store this cloud will be processed in.
    pub fn into_store(self) -> PointStore {
        PointStore::from_coords(self.coords, self.intensity)
    }
}

/// Load a point cloud, dispatching on the file extension.
///
/// `.ply` files are parsed as ASCII PLY, `.csv` files as Cartesian CSV with
/// x, y, z columns. Any other extension is rejected.
pub fn load_cloud(path: &Path) -> Result<LoadedCloud> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("ply") => load_ply(path),
        Some("csv") => load_cartesian_csv(path),
        _ => Err(LoaderError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Load a Cartesian point cloud from a CSV file.
///
/// The CSV must have a header row. Columns named `x`, `y`, `z`
/// (case-insensitive) are used when present, otherwise the first three
/// columns. A column named `intensity` is read as the scalar field.
pub fn load_cartesian_csv<P: AsRef<Path>>(path: P) -> Result<LoadedCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let x_idx = col_map.get("x").copied().unwrap_or(0);
    let y_idx = col_map.get("y").copied().unwrap_or(1);
    let z_idx = col_map.get("z").copied().unwrap_or(2);
    let intensity_idx = col_map.get("intensity").copied();

    let mut coords = Vec::with_capacity(10_000);
    let mut intensity = intensity_idx.map(|_| Vec::with_capacity(10_000));

    for result in reader.records() {
        let record = result?;

        let parse = |idx: usize| -> Option<f32> { record.get(idx).and_then(|s| s.parse().ok()) };

        let (Some(x), Some(y), Some(z)) = (parse(x_idx), parse(y_idx), parse(z_idx)) else {
            continue;
        };
        coords.push([x, y, z]);

        if let (Some(idx), Some(values)) = (intensity_idx, intensity.as_mut()) {
            values.push(parse(idx).unwrap_or(0.0));
        }
    }

    if coords.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(LoadedCloud { coords, intensity })
}

/// Load a point cloud from an ASCII PLY file.
///
/// Requires `x`, `y`, `z` vertex properties; an `intensity` property is read
/// as the scalar field when present. Color properties are ignored.
pub fn load_ply<P: AsRef<Path>>(path: P) -> Result<LoadedCloud> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let first_line = lines
        .next()
        .ok_or_else(|| LoaderError::InvalidPly("Empty file".to_string()))??;

    if !first_line.trim().starts_with("ply") {
        return Err(LoaderError::InvalidPly(format!(
            "{} is not a PLY file",
            path.display()
        )));
    }

    // Parse header
    let mut num_vertices: Option<usize> = None;
    let mut prop_names: Vec<String> = Vec::new();
    let mut header_done = false;

    for line in &mut lines {
        let line = line?;
        let stripped = line.trim();

        if stripped.starts_with("element vertex") {
            let parts: Vec<&str> = stripped.split_whitespace().collect();
            if let Some(count_str) = parts.last() {
                num_vertices = count_str.parse().ok();
            }
        } else if stripped.starts_with("property") {
            let parts: Vec<&str> = stripped.split_whitespace().collect();
            if let Some(name) = parts.last() {
                prop_names.push(name.to_string());
            }
        } else if stripped == "end_header" {
            header_done = true;
            break;
        }
    }

    let num_vertices = num_vertices
        .ok_or_else(|| LoaderError::InvalidPly("No vertex count in header".to_string()))?;

    if !header_done {
        return Err(LoaderError::InvalidPly("Missing end_header".to_string()));
    }

    let prop_idx: HashMap<&str, usize> = prop_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let x_idx = prop_idx
        .get("x")
        .copied()
        .ok_or_else(|| LoaderError::MissingColumns("x".to_string()))?;
    let y_idx = prop_idx
        .get("y")
        .copied()
        .ok_or_else(|| LoaderError::MissingColumns("y".to_string()))?;
    let z_idx = prop_idx
        .get("z")
        .copied()
        .ok_or_else(|| LoaderError::MissingColumns("z".to_string()))?;
    let intensity_idx = prop_idx.get("intensity").copied();

    let mut coords = Vec::with_capacity(num_vertices);
    let mut intensity = intensity_idx.map(|_| Vec::with_capacity(num_vertices));

    let mut vertex_count = 0;
    for line in lines {
        if vertex_count >= num_vertices {
            break;
        }

        let line = line?;
        let values: Vec<&str> = line.split_whitespace().collect();

        if values.len() < prop_names.len() {
            continue;
        }

        let parse = |idx: usize| -> Result<f32> {
            values[idx]
                .parse()
                .map_err(|_| LoaderError::ParseError(format!("Invalid value: {}", values[idx])))
        };

        coords.push([parse(x_idx)?, parse(y_idx)?, parse(z_idx)?]);
        if let (Some(idx), Some(out)) = (intensity_idx, intensity.as_mut()) {
            out.push(parse(idx)?);
        }

        vertex_count += 1;
    }

    if vertex_count < num_vertices {
        return Err(LoaderError::InvalidPly(format!(
            "Expected {} vertices, found {}",
            num_vertices, vertex_count
        )));
    }

    Ok(LoadedCloud { coords, intensity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_cartesian_csv() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y,z").unwrap();
        writeln!(file, "1.0,2.0,3.0").unwrap();
        writeln!(file, "4.0,5.0,6.0").unwrap();
        file.flush().unwrap();

        let cloud = load_cartesian_csv(file.path())?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.coords[0], [1.0, 2.0, 3.0]);
        assert!(cloud.intensity.is_none());

        Ok(())
    }

    #[test]
    fn test_load_cartesian_csv_with_intensity() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y,z,intensity").unwrap();
        writeln!(file, "1.0,2.0,3.0,0.5").unwrap();
        writeln!(file, "4.0,5.0,6.0,0.7").unwrap();
        file.flush().unwrap();

        let cloud = load_cartesian_csv(file.path())?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.intensity, Some(vec![0.5, 0.7]));

        Ok(())
    }

    #[test]
    fn test_load_empty_csv_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y,z").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_cartesian_csv(file.path()),
            Err(LoaderError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_load_ply() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex 2").unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "property float z").unwrap();
        writeln!(file, "property float intensity").unwrap();
        writeln!(file, "end_header").unwrap();
        writeln!(file, "1.0 2.0 3.0 0.25").unwrap();
        writeln!(file, "4.0 5.0 6.0 0.75").unwrap();
        file.flush().unwrap();

        let cloud = load_ply(file.path())?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.coords[1], [4.0, 5.0, 6.0]);
        assert_eq!(cloud.intensity, Some(vec![0.25, 0.75]));

        Ok(())
    }

    #[test]
    fn test_load_ply_missing_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex 1").unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "end_header").unwrap();
        writeln!(file, "1.0 2.0").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_ply(file.path()),
            Err(LoaderError::MissingColumns(_))
        ));
    }

    #[test]
    fn test_load_ply_truncated() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex 3").unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "property float z").unwrap();
        writeln!(file, "end_header").unwrap();
        writeln!(file, "1.0 2.0 3.0").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_ply(file.path()),
            Err(LoaderError::InvalidPly(_))
        ));
    }

    #[test]
    fn test_load_cloud_rejects_unknown_extension() {
        let result = load_cloud(Path::new("map.xyz"));
        assert!(matches!(result, Err(LoaderError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_into_store() {
        let cloud = LoadedCloud {
            coords: vec![[0.0; 3], [1.0; 3]],
            intensity: Some(vec![0.1, 0.2]),
        };
        let store = cloud.into_store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.intensity(), Some(&[0.1f32, 0.2][..]));
    }
}
