/// LAS/LAZ access for scan input and labeled output
use crate::error::{BridgeError, Result};
use crate::scan::{LabeledScanPoint, RawScanPoint};
use las::point::{Classification, Format};
use las::{Builder, Point, Reader, Writer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Create LAS file reader for point cloud access.
/// Handles both .las and .laz compressed formats.
pub fn create_reader(file_path: &Path) -> Result<Reader> {
    let file = File::open(file_path)?;
    let buf_reader = BufReader::new(file);
    Ok(Reader::new(buf_reader)?)
}

/// Read every point of a LAS/LAZ file as an unlabeled scan point.
pub fn read_points(file_path: &Path) -> Result<Vec<RawScanPoint>> {
    let mut reader = create_reader(file_path)?;
    let mut points = Vec::with_capacity(reader.header().number_of_points() as usize);
    for point_result in reader.points() {
        let point = point_result?;
        points.push(RawScanPoint {
            position: [point.x, point.y, point.z],
            intensity: Some(f32::from(point.intensity)),
            hit_object: None,
        });
    }
    Ok(points)
}

/// Write labeled points with the component class as LAS classification and
/// the component id as point source id.
pub fn write_labeled(file_path: &Path, points: &[LabeledScanPoint]) -> Result<()> {
    let mut builder = Builder::from((1, 4));
    builder.point_format = Format::new(0)?;
    let header = builder.into_header()?;
    let mut writer = Writer::from_path(file_path, header)?;

    for labeled in points {
        let [x, y, z] = labeled.point.position;
        let point = Point {
            x,
            y,
            z,
            intensity: labeled
                .point
                .intensity
                .map_or(0, |i| i.clamp(0.0, f32::from(u16::MAX)) as u16),
            classification: Classification::new(labeled.kind.class_id())?,
            point_source_id: u16::try_from(labeled.component_id).map_err(|_| {
                BridgeError::ScanFormat(format!(
                    "component id {} does not fit a LAS point source id",
                    labeled.component_id
                ))
            })?,
            ..Default::default()
        };
        writer.write_point(point)?;
    }

    writer.close()?;
    Ok(())
}
