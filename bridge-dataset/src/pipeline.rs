//! Batch orchestration: generation, geometry, survey planning, simulator
//! hand-off and segmentation for many bridges.
//!
//! Each bridge is an independent task. Its result (artifacts or error) is
//! returned as a value to the collector in [`DatasetPipeline::run`]; a failed
//! bridge is recorded and skipped without touching its siblings' outputs.

use crate::config::PipelineConfig;
use crate::error::{BridgeError, Result};
use crate::external::ExternalStage;
use crate::geometry::{self, ComponentManifest};
use crate::laz;
use crate::manifest::{
    BatchSummary, BridgeDimensions, BridgeFailure, BridgeRecord, ManifestGenerator,
    ScannerRecord, bridge_id, read_records,
};
use crate::params::{Constraints, bridge_rng, generate};
use crate::scan::{self, RawScanPoint};
use crate::scene;
use crate::segmentation::{self, Segmentation, SegmentationReport};
use crate::survey;
use constants::class::ComponentKind;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const COMPONENTS_FILE: &str = "components.json";
pub const SEGMENTATION_REPORT_FILE: &str = "segmentation_report.json";

/// Directory layout of a generated dataset.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn models_root(&self) -> PathBuf {
        self.root.join("BridgeModels")
    }

    pub fn model_dir(&self, bridge_id: &str) -> PathBuf {
        self.models_root().join(bridge_id)
    }

    pub fn components_path(&self, bridge_id: &str) -> PathBuf {
        self.model_dir(bridge_id).join(COMPONENTS_FILE)
    }

    pub fn scans_root(&self) -> PathBuf {
        self.root.join("PointCloudScans")
    }

    pub fn scenes_dir(&self) -> PathBuf {
        self.scans_root().join("scenes")
    }

    pub fn surveys_dir(&self) -> PathBuf {
        self.scans_root().join("surveys")
    }

    pub fn scene_path(&self, bridge_id: &str) -> PathBuf {
        self.scenes_dir()
            .join(format!("{}_scene.xml", scene::scene_id(bridge_id)))
    }

    pub fn survey_path(&self, bridge_id: &str) -> PathBuf {
        self.surveys_dir()
            .join(format!("{}_survey.xml", scene::scene_id(bridge_id)))
    }

    pub fn scan_legs_root(&self) -> PathBuf {
        self.scans_root().join("scan_legs")
    }

    pub fn scan_legs_dir(&self, bridge_id: &str) -> PathBuf {
        self.scan_legs_root().join(scene::scene_id(bridge_id))
    }

    pub fn merged_root(&self) -> PathBuf {
        self.scans_root().join("merged")
    }

    pub fn merged_path(&self, bridge_id: &str) -> PathBuf {
        self.merged_root()
            .join(scene::scene_id(bridge_id))
            .join(format!("{bridge_id}_complete.xyz"))
    }

    pub fn segmented_root(&self) -> PathBuf {
        self.scans_root().join("segmented")
    }

    pub fn segmented_dir(&self, bridge_id: &str) -> PathBuf {
        self.segmented_root().join(scene::scene_id(bridge_id))
    }
}

/// Batch options supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub num_bridges: usize,
    pub constraints: Constraints,
    pub run_simulation: bool,
    pub semantic_segmentation: bool,
}

/// Artifacts of one successfully processed bridge.
#[derive(Debug, Clone)]
pub struct BridgeArtifacts {
    pub record: BridgeRecord,
    pub scanner: ScannerRecord,
    pub simulated: bool,
    pub segmentation: Option<SegmentationReport>,
}

/// Result of one bridge task as handed back to the collector.
#[derive(Debug)]
pub struct BridgeOutcome {
    pub index: usize,
    pub bridge_id: String,
    pub result: Result<BridgeArtifacts>,
}

/// Simulator run directory holding the newest leg files of a bridge.
///
/// Runs are timestamped subdirectories; the most recently modified one wins,
/// ties broken by name. Legs written straight into `dir` are used when no
/// subdirectory exists.
pub fn latest_run_dir(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut runs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let modified = entry.metadata()?.modified()?;
            runs.push((modified, path));
        }
    }

    if let Some((_, latest)) = runs.into_iter().max() {
        return Ok(Some(latest));
    }
    if scan::leg_files(dir)?.is_empty() {
        Ok(None)
    } else {
        Ok(Some(dir.to_path_buf()))
    }
}

/// Write labeled XYZ and LAS files, one XYZ per component kind and the report.
pub fn write_segmentation(
    output_dir: &Path,
    stem: &str,
    segmentation: &Segmentation,
    warn_ratio: f64,
) -> Result<SegmentationReport> {
    fs::create_dir_all(output_dir)?;

    scan::write_labeled_xyz(
        &output_dir.join(format!("{stem}_labeled.xyz")),
        &segmentation.labeled,
    )?;
    laz::write_labeled(
        &output_dir.join(format!("{stem}_labeled.las")),
        &segmentation.labeled,
    )?;
    for (kind, points) in segmentation.by_kind() {
        scan::write_labeled_xyz(&output_dir.join(format!("{}.xyz", kind.name())), &points)?;
    }

    let report = segmentation.report(warn_ratio);
    fs::write(
        output_dir.join(SEGMENTATION_REPORT_FILE),
        serde_json::to_string_pretty(&report)?,
    )?;
    Ok(report)
}

/// Re-segment existing scan files against a persisted `components.json`.
pub fn segment_scans(
    components_path: &Path,
    scan_paths: &[PathBuf],
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<SegmentationReport> {
    let manifest: ComponentManifest =
        serde_json::from_str(&fs::read_to_string(components_path)?)?;
    log::info!(
        "Loaded {} component extents from {}",
        manifest.extents.len(),
        components_path.display()
    );

    let mut points: Vec<RawScanPoint> = Vec::new();
    for path in scan_paths {
        let loaded = scan::load_points(path)?;
        log::info!("Loaded {} points from {}", loaded.len(), path.display());
        points.extend(loaded);
    }

    let segmentation =
        segmentation::segment(&points, &manifest.extents, &config.segmentation);
    let stem = components_path
        .parent()
        .and_then(|p| p.file_name())
        .map_or_else(|| "scan".to_string(), |n| n.to_string_lossy().to_string());
    let report = write_segmentation(
        output_dir,
        &stem,
        &segmentation,
        config.segmentation.unassigned_warn_ratio,
    )?;
    log::info!(
        "Labeled {} of {} points into {}",
        report.labeled_points,
        report.total_points,
        output_dir.display()
    );
    Ok(report)
}

/// Batch driver over one dataset directory.
pub struct DatasetPipeline {
    config: PipelineConfig,
    layout: DatasetLayout,
}

impl DatasetPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let layout = DatasetLayout::new(&config.dataset_dir);
        Self { config, layout }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Process `num_bridges` bridges in parallel and persist the batch records.
    pub fn run(&self, options: &RunOptions) -> Result<BatchSummary> {
        options.constraints.check_overrides()?;

        fs::create_dir_all(self.layout.models_root())?;
        fs::create_dir_all(self.layout.scenes_dir())?;
        fs::create_dir_all(self.layout.surveys_dir())?;

        log::info!(
            "Generating {} bridges into {} (seed {})",
            options.num_bridges,
            self.layout.root().display(),
            self.config.generation.seed
        );

        let pb = ProgressBar::new(options.num_bridges as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.green/blue}] {pos}/{len} bridges ({percent}%) {msg}")
                .map_err(|e| BridgeError::Config(e.to_string()))?
                .progress_chars("▉▊▋▌▍▎▏ "),
        );
        pb.set_message("Processing bridges");

        let outcomes: Vec<BridgeOutcome> = (0..options.num_bridges)
            .into_par_iter()
            .map(|index| {
                let outcome = self.process_bridge(index, options);
                pb.inc(1);
                outcome
            })
            .collect();

        pb.finish_with_message("Bridges processed");
        self.collect(options, outcomes)
    }

    fn collect(&self, options: &RunOptions, outcomes: Vec<BridgeOutcome>) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            requested: options.num_bridges,
            ..Default::default()
        };
        let mut records = Vec::new();
        let mut scanners = Vec::new();

        for outcome in outcomes {
            match outcome.result {
                Ok(artifacts) => {
                    summary.succeeded += 1;
                    if artifacts.simulated {
                        summary.simulated += 1;
                    }
                    if artifacts.segmentation.is_some() {
                        summary.segmented += 1;
                    }
                    records.push(artifacts.record);
                    scanners.push(artifacts.scanner);
                }
                Err(error) => {
                    log::error!("{} failed: {error}", outcome.bridge_id);
                    summary.failed += 1;
                    summary.failures.push(BridgeFailure {
                        bridge_id: outcome.bridge_id,
                        error: error.to_string(),
                    });
                }
            }
        }

        let manifests = ManifestGenerator::new(self.layout.root());
        manifests.write_bridge_summary(&records)?;
        manifests.write_scanner_positions(&scanners)?;
        manifests.write_batch_summary(&summary)?;
        Ok(summary)
    }

    fn process_bridge(&self, index: usize, options: &RunOptions) -> BridgeOutcome {
        let id = bridge_id(index);
        let result = self.build_bridge(index, &id, options);
        BridgeOutcome {
            index,
            bridge_id: id,
            result,
        }
    }

    fn build_bridge(&self, index: usize, id: &str, options: &RunOptions) -> Result<BridgeArtifacts> {
        let seed = self.config.generation.seed.wrapping_add(index as u64);
        let mut rng = bridge_rng(self.config.generation.seed, index);
        let config = generate(
            &mut rng,
            &options.constraints,
            self.config.generation.max_attempts,
        )?;

        let components = geometry::derive(&config);
        geometry::validate(&components, self.config.geometry.overlap_tolerance)?;
        let piers: Vec<_> = components
            .of_kind(ComponentKind::Pier)
            .map(|pier| pier.bounds)
            .collect();
        let legs = survey::plan(&config.nominal_bounds(), &piers, &self.config.survey);
        log::debug!(
            "{id}: {} components, {} spans, {:.2} m long",
            components.extents.len(),
            config.span_count(),
            config.total_length()
        );

        let model_dir = self.layout.model_dir(id);
        fs::create_dir_all(&model_dir)?;
        let components_path = self.layout.components_path(id);
        fs::write(
            &components_path,
            serde_json::to_string_pretty(&ComponentManifest::from(&components))?,
        )?;

        if let Some(cad) = &self.config.cad {
            let components_arg = components_path.to_string_lossy().to_string();
            let output_arg = model_dir.to_string_lossy().to_string();
            ExternalStage::new("cad", cad).run(
                &[
                    ("bridge_id", id),
                    ("components", components_arg.as_str()),
                    ("output", output_arg.as_str()),
                ],
                &model_dir.join("cad.log"),
            )?;
        }

        let scene_path = self.layout.scene_path(id);
        let survey_path = self.layout.survey_path(id);
        let meshes = scene::mesh_files(&model_dir)?;
        if meshes.is_empty() {
            log::debug!("{id}: no meshes in {}", model_dir.display());
        }
        fs::write(&scene_path, scene::scene_xml(id, &meshes))?;
        fs::write(
            &survey_path,
            scene::survey_xml(id, &scene_path, &legs, &self.config.scanner),
        )?;

        let record = BridgeRecord::new(id, seed, &components);
        let scanner = ScannerRecord::new(
            id,
            BridgeDimensions {
                width_m: config.width(),
                length_m: config.total_length(),
            },
            &legs,
        );

        if !options.run_simulation {
            return Ok(BridgeArtifacts {
                record,
                scanner,
                simulated: false,
                segmentation: None,
            });
        }

        let points = self.simulate(id, &scene_path, &survey_path)?;

        let segmentation = if options.semantic_segmentation {
            let labeled =
                segmentation::segment(&points, &components.extents, &self.config.segmentation);
            let report = write_segmentation(
                &self.layout.segmented_dir(id),
                id,
                &labeled,
                self.config.segmentation.unassigned_warn_ratio,
            )?;
            log::info!(
                "{id}: labeled {} points, {} unassigned",
                report.labeled_points,
                report.unassigned_points
            );
            Some(report)
        } else {
            None
        };

        Ok(BridgeArtifacts {
            record,
            scanner,
            simulated: true,
            segmentation,
        })
    }

    /// Run the LiDAR stage when configured, then merge the latest run's legs.
    fn simulate(&self, id: &str, scene_path: &Path, survey_path: &Path) -> Result<Vec<RawScanPoint>> {
        let legs_root = self.layout.scan_legs_root();
        fs::create_dir_all(&legs_root)?;

        match &self.config.lidar {
            Some(lidar) => {
                let survey_arg = survey_path.to_string_lossy().to_string();
                let scene_arg = scene_path.to_string_lossy().to_string();
                let output_arg = legs_root.to_string_lossy().to_string();
                ExternalStage::new("lidar", lidar).run(
                    &[
                        ("bridge_id", id),
                        ("survey", survey_arg.as_str()),
                        ("scene", scene_arg.as_str()),
                        ("output", output_arg.as_str()),
                    ],
                    &legs_root.join(format!("{}.log", scene::scene_id(id))),
                )?;
            }
            None => log::warn!("{id}: no lidar stage configured, using existing scan legs"),
        }

        let legs_dir = self.layout.scan_legs_dir(id);
        let run_dir = latest_run_dir(&legs_dir)?.ok_or_else(|| BridgeError::ExternalStageFailure {
            stage: "lidar".to_string(),
            reason: format!("no scan legs found in {}", legs_dir.display()),
        })?;
        let files = scan::leg_files(&run_dir)?;
        log::info!("{id}: merging {} legs from {}", files.len(), run_dir.display());

        let points = scan::merge_legs(&files)?;
        let merged_path = self.layout.merged_path(id);
        if let Some(parent) = merged_path.parent() {
            fs::create_dir_all(parent)?;
        }
        scan::write_xyz(&merged_path, &points)?;
        let extent = scan::points_bounds(&points);
        log::info!(
            "{id}: merged {} points into {} (x {:.2}..{:.2}, y {:.2}..{:.2}, z {:.2}..{:.2})",
            points.len(),
            merged_path.display(),
            extent.min_x,
            extent.max_x,
            extent.min_y,
            extent.max_y,
            extent.min_z,
            extent.max_z
        );
        Ok(points)
    }
}

/// What a dataset directory currently contains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetInventory {
    pub bridge_models: usize,
    pub component_manifests: usize,
    pub scenes: usize,
    pub surveys: usize,
    pub scanned_bridges: usize,
    pub merged_scans: usize,
    pub segmented_bridges: usize,
    pub documented_bridges: Option<usize>,
    pub scanner_positions: bool,
}

fn count_entries(dir: &Path, predicate: impl Fn(&Path) -> bool) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        if predicate(&entry?.path()) {
            count += 1;
        }
    }
    Ok(count)
}

fn is_bridge_scan_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with("TLS_"))
}

/// Count the artifacts present under a dataset root and log the totals.
pub fn verify(dataset_dir: &Path) -> Result<DatasetInventory> {
    let layout = DatasetLayout::new(dataset_dir);
    let manifests = ManifestGenerator::new(dataset_dir);

    let is_xml = |p: &Path| p.extension().is_some_and(|e| e == "xml");
    let summary_path = manifests.bridge_summary_path();
    let documented_bridges = if summary_path.is_file() {
        Some(read_records::<BridgeRecord>(&summary_path)?.len())
    } else {
        None
    };

    let inventory = DatasetInventory {
        bridge_models: count_entries(&layout.models_root(), |p| p.is_dir())?,
        component_manifests: count_entries(&layout.models_root(), |p| {
            p.join(COMPONENTS_FILE).is_file()
        })?,
        scenes: count_entries(&layout.scenes_dir(), is_xml)?,
        surveys: count_entries(&layout.surveys_dir(), is_xml)?,
        scanned_bridges: count_entries(&layout.scan_legs_root(), is_bridge_scan_dir)?,
        merged_scans: count_entries(&layout.merged_root(), |p| {
            is_bridge_scan_dir(p)
                && scan::leg_files(p).is_ok_and(|files| !files.is_empty())
        })?,
        segmented_bridges: count_entries(&layout.segmented_root(), is_bridge_scan_dir)?,
        documented_bridges,
        scanner_positions: manifests.scanner_positions_path().is_file(),
    };

    log::info!("Dataset: {}", dataset_dir.display());
    log::info!("  Bridge models: {}", inventory.bridge_models);
    log::info!("  Component manifests: {}", inventory.component_manifests);
    log::info!("  Scenes / surveys: {} / {}", inventory.scenes, inventory.surveys);
    log::info!("  Raw scans: {} bridges", inventory.scanned_bridges);
    log::info!("  Merged scans: {}", inventory.merged_scans);
    log::info!("  Segmented scans: {}", inventory.segmented_bridges);
    match inventory.documented_bridges {
        Some(count) => log::info!("  Bridge metadata: {count} bridges documented"),
        None => log::warn!("  Bridge summary not found"),
    }
    if !inventory.scanner_positions {
        log::warn!("  Scanner positions not found");
    }
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn layout_follows_dataset_conventions() {
        let layout = DatasetLayout::new(Path::new("Dataset"));
        assert_eq!(
            layout.merged_path("bridge_0001"),
            PathBuf::from("Dataset/PointCloudScans/merged/TLS_bridge_0001/bridge_0001_complete.xyz")
        );
        assert_eq!(
            layout.survey_path("bridge_0001"),
            PathBuf::from("Dataset/PointCloudScans/surveys/TLS_bridge_0001_survey.xml")
        );
        assert_eq!(
            layout.components_path("bridge_0001"),
            PathBuf::from("Dataset/BridgeModels/bridge_0001/components.json")
        );
    }

    #[test]
    fn latest_run_dir_prefers_newest_subdirectory() {
        let dir = tempdir().unwrap();
        assert_eq!(latest_run_dir(&dir.path().join("missing")).unwrap(), None);
        assert_eq!(latest_run_dir(dir.path()).unwrap(), None);

        fs::write(dir.path().join("leg000_points.xyz"), "0 0 0\n").unwrap();
        assert_eq!(latest_run_dir(dir.path()).unwrap(), Some(dir.path().to_path_buf()));

        let older = dir.path().join("2025-01-01_00-00-00");
        fs::create_dir(&older).unwrap();
        thread::sleep(Duration::from_millis(20));
        let newer = dir.path().join("2025-01-02_00-00-00");
        fs::create_dir(&newer).unwrap();
        assert_eq!(latest_run_dir(dir.path()).unwrap(), Some(newer));
    }

    #[test]
    fn verify_counts_an_empty_dataset() {
        let dir = tempdir().unwrap();
        let inventory = verify(dir.path()).unwrap();
        assert_eq!(inventory, DatasetInventory::default());
    }
}
