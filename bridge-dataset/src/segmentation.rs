//! Post-scan semantic segmentation.
//!
//! Every raw point is attributed to the component extent containing it
//! (within the inclusion tolerance). When several extents contain a point the
//! winner is chosen by, in order:
//!
//! 1. smallest extent volume, compared in quanta of [`VOLUME_QUANTUM`];
//! 2. kind priority: railing, pier, wing wall, back wall, approach slab, deck;
//! 3. lowest component id.
//!
//! The choice depends only on the candidate set, never on the order extents
//! are visited, so the grid index below returns the same labels as a linear scan.

use crate::bounds::Bounds;
use crate::config::SegmentationConfig;
use crate::constants::VOLUME_QUANTUM;
use crate::geometry::ComponentExtent;
use crate::scan::{LabeledScanPoint, RawScanPoint};
use constants::class::{CLASS_MAP, ComponentKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound on grid cells per axis.
const MAX_GRID_CELLS_PER_AXIS: usize = 4096;

/// Lower value wins when extent volumes tie.
pub fn kind_priority(kind: ComponentKind) -> u8 {
    match kind {
        ComponentKind::Railing => 0,
        ComponentKind::Pier => 1,
        ComponentKind::WingWall => 2,
        ComponentKind::BackWall => 3,
        ComponentKind::ApproachSlab => 4,
        ComponentKind::Deck => 5,
    }
}

fn precedence(extent: &ComponentExtent) -> (i64, u8, usize) {
    (
        (extent.bounds.volume() / VOLUME_QUANTUM).round() as i64,
        kind_priority(extent.kind),
        extent.id,
    )
}

/// Uniform XY grid listing the extents that may contain points of each cell.
struct ExtentGrid {
    bounds: Bounds,
    cell_size: f64,
    nx: usize,
    ny: usize,
    cells: Vec<Vec<usize>>,
}

impl ExtentGrid {
    fn new(extents: &[ComponentExtent], tolerance: f64, cell_size: f64) -> Self {
        let bounds = extents
            .iter()
            .fold(Bounds::new(), |acc, e| acc.merge(&e.bounds.expanded(tolerance)));
        let (dx, dy, _) = bounds.dimensions();
        let axis_cells = |extent: f64| {
            if extent.is_finite() && extent > 0.0 {
                ((extent / cell_size).ceil() as usize).clamp(1, MAX_GRID_CELLS_PER_AXIS)
            } else {
                1
            }
        };
        let nx = axis_cells(dx);
        let ny = axis_cells(dy);
        // Cells may be stretched when the axis count is clamped.
        let cell_size = if extents.is_empty() {
            cell_size
        } else {
            cell_size.max(dx / nx as f64).max(dy / ny as f64)
        };

        let mut grid = Self {
            bounds,
            cell_size,
            nx,
            ny,
            cells: vec![Vec::new(); nx * ny],
        };

        for (idx, extent) in extents.iter().enumerate() {
            let inflated = extent.bounds.expanded(tolerance);
            let (gx0, gy0) = grid.cell_coords(inflated.min_x, inflated.min_y);
            let (gx1, gy1) = grid.cell_coords(inflated.max_x, inflated.max_y);
            for gy in gy0..=gy1 {
                for gx in gx0..=gx1 {
                    grid.cells[gy * nx + gx].push(idx);
                }
            }
        }
        grid
    }

    fn cell_coords(&self, x: f64, y: f64) -> (usize, usize) {
        let gx = ((x - self.bounds.min_x) / self.cell_size).floor().max(0.0) as usize;
        let gy = ((y - self.bounds.min_y) / self.cell_size).floor().max(0.0) as usize;
        (gx.min(self.nx - 1), gy.min(self.ny - 1))
    }

    /// Candidate extent indices for a point, empty outside the grid.
    fn candidates(&self, p: [f64; 3]) -> &[usize] {
        let inside = p[0] >= self.bounds.min_x
            && p[0] <= self.bounds.max_x
            && p[1] >= self.bounds.min_y
            && p[1] <= self.bounds.max_y;
        if !inside {
            return &[];
        }
        let (gx, gy) = self.cell_coords(p[0], p[1]);
        &self.cells[gy * self.nx + gx]
    }
}

/// Point classifier over the extents of one bridge.
pub struct Segmenter<'a> {
    extents: &'a [ComponentExtent],
    tolerance: f64,
    grid: ExtentGrid,
}

impl<'a> Segmenter<'a> {
    pub fn new(extents: &'a [ComponentExtent], config: &SegmentationConfig) -> Self {
        Self {
            extents,
            tolerance: config.inclusion_tolerance,
            grid: ExtentGrid::new(extents, config.inclusion_tolerance, config.grid_cell_size),
        }
    }

    /// Component owning `p`, or `None` when no extent contains it.
    pub fn classify(&self, p: [f64; 3]) -> Option<&'a ComponentExtent> {
        let extents = self.extents;
        self.grid
            .candidates(p)
            .iter()
            .map(|&idx| &extents[idx])
            .filter(|e| e.bounds.contains(p, self.tolerance))
            .min_by_key(|e| precedence(e))
    }

    /// Same result as [`Segmenter::classify`] without the grid.
    pub fn classify_linear(&self, p: [f64; 3]) -> Option<&'a ComponentExtent> {
        self.extents
            .iter()
            .filter(|e| e.bounds.contains(p, self.tolerance))
            .min_by_key(|e| precedence(e))
    }
}

/// Labeled points of one bridge plus the dropped-point count.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub labeled: Vec<LabeledScanPoint>,
    pub unassigned: usize,
}

impl Segmentation {
    pub fn total_points(&self) -> usize {
        self.labeled.len() + self.unassigned
    }

    pub fn unassigned_ratio(&self) -> f64 {
        match self.total_points() {
            0 => 0.0,
            total => self.unassigned as f64 / total as f64,
        }
    }

    pub fn counts(&self) -> BTreeMap<ComponentKind, usize> {
        let mut counts = BTreeMap::new();
        for point in &self.labeled {
            *counts.entry(point.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Labeled points grouped by component kind, input order preserved.
    pub fn by_kind(&self) -> BTreeMap<ComponentKind, Vec<LabeledScanPoint>> {
        let mut groups: BTreeMap<ComponentKind, Vec<LabeledScanPoint>> = BTreeMap::new();
        for point in &self.labeled {
            groups.entry(point.kind).or_default().push(*point);
        }
        groups
    }

    pub fn report(&self, warn_ratio: f64) -> SegmentationReport {
        SegmentationReport {
            total_points: self.total_points(),
            labeled_points: self.labeled.len(),
            unassigned_points: self.unassigned,
            unassigned_ratio: self.unassigned_ratio(),
            per_component: self
                .counts()
                .into_iter()
                .map(|(kind, count)| (kind.name().to_string(), count))
                .collect(),
            flagged: self.unassigned_ratio() > warn_ratio,
            class_legend: CLASS_MAP
                .iter()
                .map(|class| (class.id, class.name.to_string()))
                .collect(),
        }
    }
}

/// Per-bridge segmentation quality summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationReport {
    pub total_points: usize,
    pub labeled_points: usize,
    pub unassigned_points: usize,
    pub unassigned_ratio: f64,
    pub per_component: BTreeMap<String, usize>,
    /// Unassigned ratio above the warning threshold; usually means the
    /// meshes and extents disagree.
    pub flagged: bool,
    /// Label codes used in the labeled XYZ and LAS files.
    pub class_legend: BTreeMap<u8, String>,
}

/// Label every point; points outside all extents are dropped and counted.
pub fn segment(
    points: &[RawScanPoint],
    extents: &[ComponentExtent],
    config: &SegmentationConfig,
) -> Segmentation {
    let segmenter = Segmenter::new(extents, config);

    let assignments: Vec<Option<LabeledScanPoint>> = points
        .par_iter()
        .map(|point| {
            segmenter.classify(point.position).map(|extent| LabeledScanPoint {
                point: *point,
                kind: extent.kind,
                component_id: extent.id,
            })
        })
        .collect();

    let unassigned = assignments.iter().filter(|a| a.is_none()).count();
    let labeled: Vec<LabeledScanPoint> = assignments.into_iter().flatten().collect();
    let segmentation = Segmentation {
        labeled,
        unassigned,
    };

    if segmentation.unassigned_ratio() > config.unassigned_warn_ratio {
        log::warn!(
            "{} of {} points ({:.1}%) fall outside every component extent",
            segmentation.unassigned,
            segmentation.total_points(),
            segmentation.unassigned_ratio() * 100.0
        );
    }
    segmentation
}
