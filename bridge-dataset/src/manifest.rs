/// Dataset-level JSON records: bridge summary, scanner positions, batch outcome.
use crate::error::Result;
use crate::geometry::BridgeComponents;
use crate::params::{PierLayout, PierSection, Topology};
use crate::survey::{LegKind, ScanViewpoint};
use constants::class::ComponentKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const BRIDGE_SUMMARY_FILE: &str = "bridge_summary.json";
pub const SCANNER_POSITIONS_FILE: &str = "scanner_positions.json";
pub const BATCH_SUMMARY_FILE: &str = "batch_summary.json";

/// Identifier of bridge `index` in a batch, also its model directory name.
pub fn bridge_id(index: usize) -> String {
    format!("bridge_{:04}", index + 1)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One entry of `bridge_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRecord {
    pub bridge_id: String,
    pub seed: u64,
    pub topology: Topology,
    pub span_count: u32,
    pub total_length_m: f64,
    pub width_m: f64,
    pub span_lengths_m: Vec<f64>,
    pub pier_layout: PierLayout,
    pub pier_section: PierSection,
    pub pier_height_m: f64,
    pub pier_section_size_m: f64,
    pub deck_depth_m: f64,
    /// Component count per kind, keyed by kind name.
    pub components: BTreeMap<String, usize>,
}

impl BridgeRecord {
    pub fn new(bridge_id: &str, seed: u64, components: &BridgeComponents<'_>) -> Self {
        let config = components.config;
        Self {
            bridge_id: bridge_id.to_string(),
            seed,
            topology: config.topology(),
            span_count: config.span_count(),
            total_length_m: config.total_length(),
            width_m: config.width(),
            span_lengths_m: config.span_lengths().to_vec(),
            pier_layout: config.pier_layout(),
            pier_section: config.pier_section(),
            pier_height_m: config.pier_height(),
            pier_section_size_m: config.pier_section_size(),
            deck_depth_m: config.deck_depth(),
            components: ComponentKind::ALL
                .iter()
                .map(|kind| (kind.name().to_string(), components.count(*kind)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegPosition {
    pub kind: LegKind,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BridgeDimensions {
    pub width_m: f64,
    pub length_m: f64,
}

/// One entry of `scanner_positions.json`; positions rounded to centimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerRecord {
    pub bridge_id: String,
    pub dimensions: BridgeDimensions,
    /// Keyed `leg_0` .. `leg_7`.
    pub scanner_positions: BTreeMap<String, LegPosition>,
}

impl ScannerRecord {
    pub fn new(bridge_id: &str, dimensions: BridgeDimensions, legs: &[ScanViewpoint]) -> Self {
        Self {
            bridge_id: bridge_id.to_string(),
            dimensions,
            scanner_positions: legs
                .iter()
                .map(|leg| {
                    let [x, y, z] = leg.position;
                    (
                        format!("leg_{}", leg.leg),
                        LegPosition {
                            kind: leg.kind,
                            x: round2(x),
                            y: round2(y),
                            z: round2(z),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeFailure {
    pub bridge_id: String,
    pub error: String,
}

/// Outcome of a batch run; failed bridges never abort their siblings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub simulated: usize,
    pub segmented: usize,
    pub failures: Vec<BridgeFailure>,
}

/// Writes dataset-level records under the dataset root.
pub struct ManifestGenerator {
    output_dir: PathBuf,
}

impl ManifestGenerator {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json)?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }

    pub fn bridge_summary_path(&self) -> PathBuf {
        self.output_dir.join(BRIDGE_SUMMARY_FILE)
    }

    pub fn scanner_positions_path(&self) -> PathBuf {
        self.output_dir
            .join("PointCloudScans")
            .join(SCANNER_POSITIONS_FILE)
    }

    pub fn batch_summary_path(&self) -> PathBuf {
        self.output_dir.join(BATCH_SUMMARY_FILE)
    }

    pub fn write_bridge_summary(&self, records: &[BridgeRecord]) -> Result<()> {
        self.write_json(&self.bridge_summary_path(), records)
    }

    pub fn write_scanner_positions(&self, records: &[ScannerRecord]) -> Result<()> {
        self.write_json(&self.scanner_positions_path(), records)
    }

    pub fn write_batch_summary(&self, summary: &BatchSummary) -> Result<()> {
        self.write_json(&self.batch_summary_path(), summary)?;
        self.print_summary(summary);
        Ok(())
    }

    /// Logs batch counts and each failure.
    fn print_summary(&self, summary: &BatchSummary) {
        log::info!("Batch Summary:");
        log::info!("  Requested bridges: {}", summary.requested);
        log::info!("  Succeeded: {}", summary.succeeded);
        log::info!("  Simulated: {}", summary.simulated);
        log::info!("  Segmented: {}", summary.segmented);
        if summary.failed > 0 {
            log::warn!("  Failed: {}", summary.failed);
            for failure in &summary.failures {
                log::warn!("    {}: {}", failure.bridge_id, failure.error);
            }
        }
    }
}

/// Read a JSON array written by [`ManifestGenerator`].
pub fn read_records<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
