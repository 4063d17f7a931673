use approx::assert_relative_eq;
use bridge_dataset::bounds::Bounds;
use bridge_dataset::config::{ExternalStageConfig, PipelineConfig, ScannerConfig, SurveyConfig};
use bridge_dataset::geometry::{BridgeComponents, ComponentManifest, derive, validate};
use bridge_dataset::manifest::{BatchSummary, BridgeRecord, ScannerRecord, read_records};
use bridge_dataset::params::{
    BridgeConfig, BridgeParams, Constraints, PierLayout, PierSection, Topology, TopologyKind,
    bridge_rng, generate,
};
use bridge_dataset::pipeline::{DatasetPipeline, RunOptions, segment_scans, verify};
use bridge_dataset::scan::{RawScanPoint, read_xyz};
use bridge_dataset::scene::in_scan_window;
use bridge_dataset::segmentation::segment;
use bridge_dataset::survey::{ScanViewpoint, plan};
use bridge_dataset::BridgeError;
use constants::class::ComponentKind;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn reference_box_girder() -> BridgeConfig {
    BridgeConfig::new(BridgeParams {
        topology: Topology::BoxGirder { cell_count: 2 },
        total_length: 100.0,
        width: 24.0,
        span_lengths: vec![33.0, 34.0, 33.0],
        pier_layout: PierLayout::SingleColumn,
        pier_section: PierSection::Circular,
        pier_height: 8.0,
        pier_section_size: 1.6,
    })
    .unwrap()
}

fn config_for(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        dataset_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

#[test]
fn reference_bridge_components_and_stations() {
    let config = reference_box_girder();
    let components = derive(&config);
    validate(&components, 0.01).unwrap();

    assert_eq!(components.count(ComponentKind::Deck), 1);
    assert_eq!(components.count(ComponentKind::Pier), 2);
    assert_eq!(components.count(ComponentKind::Railing), 2);
    assert_eq!(components.count(ComponentKind::ApproachSlab), 2);
    assert_eq!(components.count(ComponentKind::BackWall), 2);
    assert_eq!(components.count(ComponentKind::WingWall), 4);

    let stations: Vec<f64> = components
        .of_kind(ComponentKind::Pier)
        .map(|pier| pier.bounds.center()[0])
        .collect();
    assert_relative_eq!(stations[0], 33.0, epsilon = 1e-9);
    assert_relative_eq!(stations[1], 67.0, epsilon = 1e-9);
}

#[test]
fn reference_survey_offsets() {
    let config = reference_box_girder();
    let bounds = config.nominal_bounds();
    let legs = plan(&bounds, &[], &SurveyConfig::default());
    let center = bounds.center();

    assert_relative_eq!((legs[0].position[1] - center[1]).abs(), 12.0 + 15.0);
    assert_relative_eq!((legs[1].position[1] - center[1]).abs(), 12.0 + 15.0);
    assert_relative_eq!((legs[2].position[0] - center[0]).abs(), 50.0 + 20.0);
    assert_relative_eq!((legs[3].position[0] - center[0]).abs(), 50.0 + 20.0);
}

/// Bridges from the default sampler plus four-span bridges, whose piers sit
/// on the quarter points.
fn sampled_bridges() -> Vec<BridgeConfig> {
    let four_spans = Constraints {
        span_count: Some(4),
        ..Default::default()
    };
    (0..60)
        .map(|i| generate(&mut bridge_rng(11, i), &Constraints::default(), 64).unwrap())
        .chain((0..60).map(|i| generate(&mut bridge_rng(23, i), &four_spans, 64).unwrap()))
        .collect()
}

fn legs_for(components: &BridgeComponents<'_>) -> [ScanViewpoint; 8] {
    let piers: Vec<Bounds> = components
        .of_kind(ComponentKind::Pier)
        .map(|pier| pier.bounds)
        .collect();
    plan(&components.config.nominal_bounds(), &piers, &SurveyConfig::default())
}

/// Sample points on the six faces of `bounds` with their outward normals.
/// Faces resting on the ground are skipped.
fn face_samples(bounds: &Bounds) -> Vec<([f64; 3], [f64; 3])> {
    const STEPS: usize = 5;
    let min = bounds.min();
    let max = bounds.max();
    let mut samples = Vec::new();

    for axis in 0..3 {
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        for (plane, sign) in [(min[axis], -1.0), (max[axis], 1.0)] {
            if axis == 2 && sign < 0.0 && plane <= 1e-9 {
                continue;
            }
            let mut normal = [0.0; 3];
            normal[axis] = sign;
            for i in 0..STEPS {
                for j in 0..STEPS {
                    let mut p = [0.0; 3];
                    p[axis] = plane;
                    p[u] = min[u] + (i as f64 + 0.5) / STEPS as f64 * (max[u] - min[u]);
                    p[v] = min[v] + (j as f64 + 0.5) / STEPS as f64 * (max[v] - min[v]);
                    samples.push((p, normal));
                }
            }
        }
    }
    samples
}

#[test]
fn legs_cover_every_exposed_face() {
    let half_fov = ScannerConfig::default().vertical_half_fov_deg;

    for config in sampled_bridges() {
        let components = derive(&config);
        let legs = legs_for(&components);

        for extent in &components.extents {
            for (point, normal) in face_samples(&extent.bounds) {
                let covered = legs.iter().any(|leg| {
                    let facing: f64 = (0..3)
                        .map(|k| (leg.position[k] - point[k]) * normal[k])
                        .sum();
                    facing > 0.0 && in_scan_window(leg, point, half_fov)
                });
                assert!(
                    covered,
                    "{} point {point:?} (normal {normal:?}) is outside every leg window \
                     for a {:.1} m, {}-span bridge",
                    extent.name,
                    config.total_length(),
                    config.span_count()
                );
            }
        }
    }
}

#[test]
fn no_leg_stands_inside_a_component() {
    for config in sampled_bridges() {
        let components = derive(&config);
        for leg in legs_for(&components) {
            let hit: Vec<&str> = components
                .extents
                .iter()
                .filter(|e| e.bounds.contains(leg.position, 0.0))
                .map(|e| e.name.as_str())
                .collect();
            assert!(
                hit.is_empty(),
                "leg {} at {:?} lies inside {hit:?}",
                leg.leg,
                leg.position
            );
        }
    }
}

#[test]
fn deck_centroid_and_pier_joint_labels() {
    let config = reference_box_girder();
    let components = derive(&config);
    let deck = components.of_kind(ComponentKind::Deck).next().unwrap();
    let pier = components.of_kind(ComponentKind::Pier).next().unwrap();

    let centroid = deck.bounds.center();
    let joint = [33.0, 0.0, config.pier_height() + 0.02];
    let points = [
        RawScanPoint::new(centroid[0], centroid[1], centroid[2]),
        RawScanPoint::new(joint[0], joint[1], joint[2]),
    ];

    for _ in 0..5 {
        let seg = segment(&points, &components.extents, &Default::default());
        assert_eq!(seg.unassigned, 0);
        assert_eq!(seg.labeled[0].kind, ComponentKind::Deck);
        assert_eq!(seg.labeled[1].kind, ComponentKind::Pier);
        assert_eq!(seg.labeled[1].component_id, pier.id);
    }
}

#[test]
fn batch_without_external_stages_persists_records() {
    let dir = tempdir().unwrap();
    let pipeline = DatasetPipeline::new(config_for(dir.path()));
    let summary = pipeline
        .run(&RunOptions {
            num_bridges: 3,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);

    let layout = pipeline.layout();
    let records: Vec<BridgeRecord> =
        read_records(&dir.path().join("bridge_summary.json")).unwrap();
    assert_eq!(records.len(), 3);
    let scanners: Vec<ScannerRecord> =
        read_records(&dir.path().join("PointCloudScans/scanner_positions.json")).unwrap();
    assert_eq!(scanners.len(), 3);
    assert!(scanners.iter().all(|s| s.scanner_positions.len() == 8));

    for record in &records {
        let manifest: ComponentManifest = serde_json::from_str(
            &fs::read_to_string(layout.components_path(&record.bridge_id)).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest.config.span_count(), record.span_count);
        assert!(layout.scene_path(&record.bridge_id).is_file());
        let survey = fs::read_to_string(layout.survey_path(&record.bridge_id)).unwrap();
        assert_eq!(survey.matches("<leg>").count(), 8);
    }

    let inventory = verify(dir.path()).unwrap();
    assert_eq!(inventory.bridge_models, 3);
    assert_eq!(inventory.component_manifests, 3);
    assert_eq!(inventory.surveys, 3);
    assert_eq!(inventory.documented_bridges, Some(3));
    assert!(inventory.scanner_positions);
    assert_eq!(inventory.segmented_bridges, 0);
}

#[test]
fn same_seed_reproduces_the_batch() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let options = RunOptions {
        num_bridges: 4,
        constraints: Constraints {
            topology: Some(TopologyKind::BeamSlab),
            ..Default::default()
        },
        ..Default::default()
    };
    DatasetPipeline::new(config_for(a.path())).run(&options).unwrap();
    DatasetPipeline::new(config_for(b.path())).run(&options).unwrap();

    let first: Vec<BridgeRecord> = read_records(&a.path().join("bridge_summary.json")).unwrap();
    let second: Vec<BridgeRecord> = read_records(&b.path().join("bridge_summary.json")).unwrap();
    assert_eq!(first, second);
    assert!(first
        .iter()
        .all(|r| matches!(r.topology, Topology::BeamSlab { .. })));
}

#[test]
fn impossible_override_fails_fast() {
    let dir = tempdir().unwrap();
    let err = DatasetPipeline::new(config_for(dir.path()))
        .run(&RunOptions {
            num_bridges: 2,
            constraints: Constraints {
                span_count: Some(12),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, BridgeError::ConstraintViolation(_)));
}

#[test]
fn missing_scans_fail_one_bridge_only() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path());

    // Bridge 1 is regenerated here to place points inside its deck and far away.
    let bridge = generate(&mut bridge_rng(config.generation.seed, 0), &Constraints::default(), 64)
        .unwrap();
    let components = derive(&bridge);
    let deck_center = components.extents[0].bounds.center();
    let run_dir = dir
        .path()
        .join("PointCloudScans/scan_legs/TLS_bridge_0001/2025-06-01_12-00-00");
    fs::create_dir_all(&run_dir).unwrap();
    fs::write(
        run_dir.join("leg000_points.xyz"),
        format!(
            "{} {} {} 0.5\n",
            deck_center[0], deck_center[1], deck_center[2]
        ),
    )
    .unwrap();
    fs::write(run_dir.join("leg001_points.xyz"), "-900 0 0 0.1\n").unwrap();

    let summary: BatchSummary = DatasetPipeline::new(config)
        .run(&RunOptions {
            num_bridges: 2,
            semantic_segmentation: true,
            run_simulation: true,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.segmented, 1);
    assert_eq!(summary.failures[0].bridge_id, "bridge_0002");
    assert!(summary.failures[0].error.contains("lidar"));

    let merged = read_xyz(
        &dir
            .path()
            .join("PointCloudScans/merged/TLS_bridge_0001/bridge_0001_complete.xyz"),
    )
    .unwrap();
    assert_eq!(merged.len(), 2);

    let segmented = dir.path().join("PointCloudScans/segmented/TLS_bridge_0001");
    assert!(segmented.join("bridge_0001_labeled.las").is_file());
    assert_eq!(read_xyz(&segmented.join("deck.xyz")).unwrap().len(), 1);
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(segmented.join("segmentation_report.json")).unwrap())
            .unwrap();
    assert_eq!(report["unassigned_points"], 1);
    assert_eq!(report["flagged"], true);

    // Sibling outputs are intact.
    let records: Vec<BridgeRecord> =
        read_records(&dir.path().join("bridge_summary.json")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].bridge_id, "bridge_0001");
}

#[test]
fn segment_command_relabels_existing_scans() {
    let dir = tempdir().unwrap();
    DatasetPipeline::new(config_for(dir.path()))
        .run(&RunOptions {
            num_bridges: 1,
            ..Default::default()
        })
        .unwrap();

    let components_path = dir.path().join("BridgeModels/bridge_0001/components.json");
    let manifest: ComponentManifest =
        serde_json::from_str(&fs::read_to_string(&components_path).unwrap()).unwrap();
    let railing = manifest
        .extents
        .iter()
        .find(|e| e.kind == ComponentKind::Railing)
        .unwrap();
    let c = railing.bounds.center();

    let scan = dir.path().join("external_scan.xyz");
    fs::write(&scan, format!("{} {} {}\n", c[0], c[1], c[2])).unwrap();
    let output = dir.path().join("relabeled");
    let report = segment_scans(&components_path, &[scan], &output, &config_for(dir.path())).unwrap();

    assert_eq!(report.labeled_points, 1);
    assert_eq!(report.per_component.get("railing"), Some(&1));
    assert!(output.join("bridge_0001_labeled.xyz").is_file());
    assert!(output.join("railing.xyz").is_file());
}

#[cfg(unix)]
#[test]
fn cad_stage_meshes_appear_in_scene() {
    let dir = tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.cad = Some(ExternalStageConfig {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "test -f {components} && echo 'o deck' > {output}/deck.obj".to_string(),
        ],
        timeout_secs: 30,
    });

    let pipeline = DatasetPipeline::new(config);
    let summary = pipeline
        .run(&RunOptions {
            num_bridges: 1,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(summary.succeeded, 1);

    let scene = fs::read_to_string(pipeline.layout().scene_path("bridge_0001")).unwrap();
    assert!(scene.contains("deck.obj"));
    assert!(scene.contains("<scene id=\"TLS_bridge_0001\""));
}
