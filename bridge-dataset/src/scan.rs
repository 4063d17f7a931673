//! Scan point types and plain-text XYZ reading/writing.
//!
//! Simulator output lines carry whitespace-separated columns
//! `x y z intensity echo_width return_number number_of_returns fullwave_index hit_object_id ...`;
//! only the coordinates are required, intensity and hit object id are kept when present.

use crate::bounds::Bounds;
use crate::error::{BridgeError, Result};
use constants::class::ComponentKind;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const INTENSITY_COLUMN: usize = 3;
const HIT_OBJECT_COLUMN: usize = 8;

/// Unlabeled point returned by the LiDAR collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawScanPoint {
    pub position: [f64; 3],
    pub intensity: Option<f32>,
    /// Simulator object id of the surface hit, informational only.
    pub hit_object: Option<u32>,
}

impl RawScanPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: [x, y, z],
            intensity: None,
            hit_object: None,
        }
    }
}

/// Point attributed to exactly one component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledScanPoint {
    pub point: RawScanPoint,
    pub kind: ComponentKind,
    pub component_id: usize,
}

/// Spatial extent of a point set, computed in parallel chunks.
pub fn points_bounds(points: &[RawScanPoint]) -> Bounds {
    points
        .par_chunks(25_000)
        .map(|chunk| {
            let mut local_bounds = Bounds::new();
            for point in chunk {
                let [x, y, z] = point.position;
                local_bounds.update(x, y, z);
            }
            local_bounds
        })
        .reduce_with(|a, b| a.merge(&b))
        .unwrap_or_default()
}

/// Load scan points from XYZ text, or LAS/LAZ by extension.
pub fn load_points(path: &Path) -> Result<Vec<RawScanPoint>> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "las" | "laz" => crate::laz::read_points(path),
        _ => read_xyz(path),
    }
}

/// Read a whitespace-separated XYZ file, skipping blank and comment lines.
pub fn read_xyz(path: &Path) -> Result<Vec<RawScanPoint>> {
    let reader = BufReader::new(File::open(path)?);
    let mut points = Vec::new();

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(BridgeError::ScanFormat(format!(
                "{}:{}: expected at least 3 columns, found {}",
                path.display(),
                line_idx + 1,
                parts.len()
            )));
        }

        let mut position = [0.0; 3];
        for (axis, value) in parts[..3].iter().enumerate() {
            position[axis] = value.parse::<f64>().map_err(|_| {
                BridgeError::ScanFormat(format!(
                    "{}:{}: invalid coordinate '{value}'",
                    path.display(),
                    line_idx + 1
                ))
            })?;
        }

        points.push(RawScanPoint {
            position,
            intensity: parts
                .get(INTENSITY_COLUMN)
                .and_then(|v| v.parse::<f32>().ok()),
            hit_object: parts
                .get(HIT_OBJECT_COLUMN)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| *v >= 0.0)
                .map(|v| v as u32),
        });
    }

    Ok(points)
}

/// Write raw points as `x y z [intensity]`.
pub fn write_xyz(path: &Path, points: &[RawScanPoint]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for point in points {
        let [x, y, z] = point.position;
        match point.intensity {
            Some(intensity) => writeln!(writer, "{x} {y} {z} {intensity}")?,
            None => writeln!(writer, "{x} {y} {z}")?,
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write labeled points as `x y z intensity class_id component_id`.
pub fn write_labeled_xyz(path: &Path, points: &[LabeledScanPoint]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "# x y z intensity class_id component_id")?;
    for labeled in points {
        let [x, y, z] = labeled.point.position;
        writeln!(
            writer,
            "{x} {y} {z} {} {} {}",
            labeled.point.intensity.unwrap_or(0.0),
            labeled.kind.class_id(),
            labeled.component_id
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// XYZ files directly inside `dir`, sorted by name.
pub fn leg_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "xyz"))
        .collect();
    files.sort();
    Ok(files)
}

/// Concatenate the points of several leg files in the given order.
pub fn merge_legs(files: &[PathBuf]) -> Result<Vec<RawScanPoint>> {
    let mut merged = Vec::new();
    for file in files {
        let points = read_xyz(file)?;
        log::debug!("Read {} points from {}", points.len(), file.display());
        merged.extend(points);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_simulator_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leg000_points.xyz");
        fs::write(
            &path,
            "# header\n\n1.5 2.0 3.25 0.8 1.2 1 1 0 4 0 12.5\n4 5 6\n",
        )
        .unwrap();

        let points = read_xyz(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].position, [1.5, 2.0, 3.25]);
        assert_eq!(points[0].intensity, Some(0.8));
        assert_eq!(points[0].hit_object, Some(4));
        assert_eq!(points[1].intensity, None);
        assert_eq!(points[1].hit_object, None);
    }

    #[test]
    fn rejects_bad_coordinates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.xyz");
        fs::write(&path, "1 two 3\n").unwrap();
        assert!(matches!(read_xyz(&path), Err(BridgeError::ScanFormat(_))));

        fs::write(&path, "1 2\n").unwrap();
        assert!(matches!(read_xyz(&path), Err(BridgeError::ScanFormat(_))));
    }

    #[test]
    fn merges_legs_in_name_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("leg001.xyz"), "2 0 0\n").unwrap();
        fs::write(dir.path().join("leg000.xyz"), "1 0 0\n1 1 0\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = leg_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        let merged = merge_legs(&files).unwrap();
        let xs: Vec<f64> = merged.iter().map(|p| p.position[0]).collect();
        assert_eq!(xs, vec![1.0, 1.0, 2.0]);

        let bounds = points_bounds(&merged);
        assert_eq!(bounds.min(), [1.0, 0.0, 0.0]);
        assert_eq!(bounds.max(), [2.0, 1.0, 0.0]);
        assert!(!points_bounds(&[]).is_valid());
    }

    #[test]
    fn labeled_output_carries_class_codes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labeled.xyz");
        let labeled = [LabeledScanPoint {
            point: RawScanPoint::new(1.0, 2.0, 3.0),
            kind: ComponentKind::Pier,
            component_id: 2,
        }];
        write_labeled_xyz(&path, &labeled).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let data_line = contents.lines().nth(1).unwrap();
        assert_eq!(data_line, "1 2 3 0 2 2");
        // Labeled files stay readable as plain XYZ.
        assert_eq!(read_xyz(&path).unwrap().len(), 1);
    }
}
