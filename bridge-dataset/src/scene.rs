/// Scene and survey description files handed to the LiDAR simulator
use crate::config::ScannerConfig;
use crate::error::Result;
use crate::survey::{LegKind, ScanViewpoint};
use constants::coordinate_system::SCENE_UP_AXIS;
use std::fs;
use std::path::{Path, PathBuf};

/// Escape characters that are not allowed inside XML attribute values.
fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Scene id used by both the scene and the survey file.
pub fn scene_id(bridge_id: &str) -> String {
    format!("TLS_{bridge_id}")
}

/// OBJ meshes inside a bridge model directory, sorted by name.
pub fn mesh_files(model_dir: &Path) -> Result<Vec<PathBuf>> {
    if !model_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(model_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("obj")))
        .collect();
    files.sort();
    Ok(files)
}

/// Scene document with one OBJ-loader part per mesh.
pub fn scene_xml(bridge_id: &str, meshes: &[PathBuf]) -> String {
    let id = xml_escape(&scene_id(bridge_id));
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<document>\n");
    xml.push_str(&format!("    <scene id=\"{id}\" name=\"{id}\">\n"));

    for (idx, mesh) in meshes.iter().enumerate() {
        xml.push_str(&format!("        <part id=\"{idx}\">\n"));
        xml.push_str("            <filter type=\"objloader\">\n");
        xml.push_str(&format!(
            "                <param type=\"string\" key=\"filepath\" value=\"{}\" />\n",
            xml_escape(&mesh.display().to_string())
        ));
        xml.push_str(&format!(
            "                <param type=\"string\" key=\"up\" value=\"{SCENE_UP_AXIS}\" />\n"
        ));
        xml.push_str("            </filter>\n");
        xml.push_str("        </part>\n");
    }

    xml.push_str("    </scene>\n");
    xml.push_str("</document>\n");
    xml
}

/// Horizontal head sweep `(start, stop)` in degrees, counter-clockwise from +X.
/// Side and end legs sweep a half circle centred on their heading; vertical
/// legs sweep a full turn.
pub fn head_rotation(viewpoint: &ScanViewpoint) -> (f64, f64) {
    match viewpoint.kind {
        LegKind::Side | LegKind::End => {
            let heading = viewpoint.heading_deg();
            (heading - 90.0, heading + 90.0)
        }
        LegKind::Underside | LegKind::TopDown => (0.0, 360.0),
    }
}

/// Vertical field of view `(min, max)` in degrees.
///
/// Side and end legs scan `half_fov` around their look elevation. Underside
/// and top-down legs scan the whole hemisphere they face so that the soffit
/// and deck top are reached out to both deck ends.
pub fn vertical_window(viewpoint: &ScanViewpoint, half_fov: f64) -> (f64, f64) {
    match viewpoint.kind {
        LegKind::Side | LegKind::End => {
            let elevation = viewpoint.elevation_deg();
            (
                (elevation - half_fov).max(-90.0),
                (elevation + half_fov).min(90.0),
            )
        }
        LegKind::Underside => (0.0, 90.0),
        LegKind::TopDown => (-90.0, 0.0),
    }
}

/// Whether `point` lies inside the head sweep and vertical window of a leg.
pub fn in_scan_window(viewpoint: &ScanViewpoint, point: [f64; 3], half_fov: f64) -> bool {
    let [px, py, pz] = viewpoint.position;
    let (dx, dy, dz) = (point[0] - px, point[1] - py, point[2] - pz);
    let horizontal = dx.hypot(dy);

    let elevation = dz.atan2(horizontal).to_degrees();
    let (v_min, v_max) = vertical_window(viewpoint, half_fov);
    if elevation < v_min || elevation > v_max {
        return false;
    }

    let (start, stop) = head_rotation(viewpoint);
    if horizontal == 0.0 || stop - start >= 360.0 {
        return true;
    }
    let azimuth = dy.atan2(dx).to_degrees();
    (azimuth - start).rem_euclid(360.0) <= stop - start
}

/// Survey document with one leg per viewpoint, in leg order.
pub fn survey_xml(
    bridge_id: &str,
    scene_path: &Path,
    viewpoints: &[ScanViewpoint],
    scanner: &ScannerConfig,
) -> String {
    let id = xml_escape(&scene_id(bridge_id));
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<document>\n");
    xml.push_str(&format!(
        "    <scannerSettings id=\"tls_settings\" active=\"true\" pulseFreq_hz=\"{}\" scanFreq_hz=\"{}\" headRotatePerSec_deg=\"{}\" />\n",
        scanner.pulse_freq_hz, scanner.scan_freq_hz, scanner.head_rotate_per_sec_deg
    ));
    xml.push_str(&format!(
        "    <survey name=\"{id}\" scene=\"{}#{id}\" platform=\"{}\" scanner=\"{}\">\n",
        xml_escape(&scene_path.display().to_string()),
        xml_escape(&scanner.platform),
        xml_escape(&scanner.scanner)
    ));

    for viewpoint in viewpoints {
        let [x, y, z] = viewpoint.position;
        let (start, stop) = head_rotation(viewpoint);
        let (v_min, v_max) = vertical_window(viewpoint, scanner.vertical_half_fov_deg);
        xml.push_str(&format!("        <!-- leg {} ({:?}) -->\n", viewpoint.leg, viewpoint.kind));
        xml.push_str("        <leg>\n");
        xml.push_str(&format!(
            "            <platformSettings x=\"{x:.3}\" y=\"{y:.3}\" z=\"{z:.3}\" onGround=\"false\" />\n"
        ));
        xml.push_str(&format!(
            "            <scannerSettings template=\"tls_settings\" headRotateStart_deg=\"{start:.2}\" headRotateStop_deg=\"{stop:.2}\" verticalAngleMin_deg=\"{v_min:.2}\" verticalAngleMax_deg=\"{v_max:.2}\" />\n"
        ));
        xml.push_str("        </leg>\n");
    }

    xml.push_str("    </survey>\n");
    xml.push_str("</document>\n");
    xml
}
