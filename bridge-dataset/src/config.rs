//! Pipeline configuration loaded from an optional TOML file.
//!
//! Every section has defaults so an empty file (or no file) is valid:
//!
//! ```toml
//! dataset_dir = "Dataset"
//!
//! [generation]
//! seed = 7
//! max_attempts = 64
//!
//! [survey]
//! lateral_clearance = 15.0
//! longitudinal_clearance = 20.0
//!
//! [lidar]
//! program = "helios"
//! args = ["{survey}", "--output", "{output}", "-vt"]
//! timeout_secs = 1800
//! ```

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root of the generated dataset tree.
    pub dataset_dir: PathBuf,
    pub generation: GenerationConfig,
    pub geometry: GeometryConfig,
    pub survey: SurveyConfig,
    pub scanner: ScannerConfig,
    pub segmentation: SegmentationConfig,
    /// CAD collaborator producing OBJ meshes from `components.json`.
    pub cad: Option<ExternalStageConfig>,
    /// LiDAR collaborator producing one XYZ file per scanner leg.
    pub lidar: Option<ExternalStageConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("Dataset"),
            generation: GenerationConfig::default(),
            geometry: GeometryConfig::default(),
            survey: SurveyConfig::default(),
            scanner: ScannerConfig::default(),
            segmentation: SegmentationConfig::default(),
            cad: None,
            lidar: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values that would make the planner or segmenter meaningless.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("survey.lateral_clearance", self.survey.lateral_clearance),
            ("survey.longitudinal_clearance", self.survey.longitudinal_clearance),
            ("survey.vertical_clearance", self.survey.vertical_clearance),
            ("survey.instrument_height", self.survey.instrument_height),
            ("survey.obstacle_clearance", self.survey.obstacle_clearance),
            ("segmentation.inclusion_tolerance", self.segmentation.inclusion_tolerance),
            ("geometry.overlap_tolerance", self.geometry.overlap_tolerance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(BridgeError::Config(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.segmentation.unassigned_warn_ratio) {
            return Err(BridgeError::Config(format!(
                "segmentation.unassigned_warn_ratio must lie in [0, 1], got {}",
                self.segmentation.unassigned_warn_ratio
            )));
        }
        if !(self.segmentation.grid_cell_size > 0.0) {
            return Err(BridgeError::Config(
                "segmentation.grid_cell_size must be positive".to_string(),
            ));
        }
        if self.generation.max_attempts == 0 {
            return Err(BridgeError::Config(
                "generation.max_attempts must be at least 1".to_string(),
            ));
        }
        for stage in [&self.cad, &self.lidar].into_iter().flatten() {
            if stage.program.trim().is_empty() {
                return Err(BridgeError::Config(
                    "external stage program must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Batch seed; bridge `i` is sampled from a generator seeded with `seed + i`.
    pub seed: u64,
    /// Bounded resampling budget per bridge.
    pub max_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_attempts: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Largest overlap volume (m³) tolerated between non-joint components.
    pub overlap_tolerance: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            overlap_tolerance: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    /// Distance from the deck edge to the side scanners (legs 0–1).
    pub lateral_clearance: f64,
    /// Distance from the deck end to the end scanners (legs 2–3).
    pub longitudinal_clearance: f64,
    /// Height of the top-down scanners above the deck top (legs 6–7).
    pub vertical_clearance: f64,
    /// Height of the underside scanners above the ground (legs 4–5).
    pub instrument_height: f64,
    /// Gap kept along the axis between an underside scanner and a pier.
    pub obstacle_clearance: f64,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            lateral_clearance: 15.0,
            longitudinal_clearance: 20.0,
            vertical_clearance: 10.0,
            instrument_height: 1.5,
            obstacle_clearance: 1.0,
        }
    }
}

/// Simulator asset references and scanner settings written to survey files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub platform: String,
    pub scanner: String,
    pub pulse_freq_hz: u32,
    pub scan_freq_hz: u32,
    pub head_rotate_per_sec_deg: f64,
    /// Half of the vertical field of view around each leg's look elevation.
    pub vertical_half_fov_deg: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            platform: "data/platforms.xml#tripod".to_string(),
            scanner: "data/scanners_tls.xml#riegl_vz400".to_string(),
            pulse_freq_hz: 100_000,
            scan_freq_hz: 120,
            head_rotate_per_sec_deg: 10.0,
            vertical_half_fov_deg: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Distance a point may lie outside an extent and still belong to it.
    pub inclusion_tolerance: f64,
    /// Unassigned fraction above which a bridge is flagged with a warning.
    pub unassigned_warn_ratio: f64,
    /// Cell edge of the XY grid index over component extents.
    pub grid_cell_size: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            inclusion_tolerance: 0.05,
            unassigned_warn_ratio: 0.05,
            grid_cell_size: 5.0,
        }
    }
}

/// External program invocation. Arguments may contain `{placeholder}` tokens
/// that are substituted per bridge (see [`crate::external::ExternalStage`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalStageConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    1800
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config.dataset_dir, PathBuf::from("Dataset"));
        assert_eq!(config.generation.max_attempts, 64);
        assert!(config.cad.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [survey]
            lateral_clearance = 8.0

            [lidar]
            program = "helios"
            args = ["{survey}", "--output", "{output}"]
            "#,
        )
        .unwrap();
        assert_eq!(config.survey.lateral_clearance, 8.0);
        assert_eq!(config.survey.longitudinal_clearance, 20.0);
        let lidar = config.lidar.unwrap();
        assert_eq!(lidar.timeout_secs, 1800);
        assert_eq!(lidar.args.len(), 3);
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let mut config = PipelineConfig::default();
        config.segmentation.inclusion_tolerance = -0.1;
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, "dataset_dir = \"out\"\n[generation]\nseed = 9\n").unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.dataset_dir, PathBuf::from("out"));
        assert_eq!(config.generation.seed, 9);
    }
}
