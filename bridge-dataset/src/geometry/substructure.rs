/// Piers, railings and abutment components common to every topology
use super::{ComponentShape, PierCap};
use crate::bounds::Bounds;
use crate::constants::*;
use crate::params::{BridgeConfig, PierLayout};
use constants::class::ComponentKind;

/// Which end of the deck an abutment component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BridgeEnd {
    Start,
    End,
}

impl BridgeEnd {
    pub(super) fn label(self) -> &'static str {
        match self {
            BridgeEnd::Start => "start",
            BridgeEnd::End => "end",
        }
    }

    /// Longitudinal range of a component of `depth` that extends outward from this end.
    fn outward(self, config: &BridgeConfig, depth: f64) -> (f64, f64) {
        match self {
            BridgeEnd::Start => (-depth, 0.0),
            BridgeEnd::End => (config.total_length(), config.total_length() + depth),
        }
    }
}

/// Unplaced component: kind, name, volume and CAD metadata.
pub(super) struct Part {
    pub kind: ComponentKind,
    pub name: String,
    pub bounds: Bounds,
    pub shape: ComponentShape,
}

/// Column lateral offsets for a pier bent.
fn column_offsets(config: &BridgeConfig) -> Vec<f64> {
    match config.pier_layout() {
        PierLayout::SingleColumn | PierLayout::HammerHead => vec![0.0],
        PierLayout::MultiColumn => {
            let count = if config.width() >= THREE_COLUMN_MIN_WIDTH { 3 } else { 2 };
            let outer = 0.35 * config.width();
            let step = 2.0 * outer / (count - 1) as f64;
            (0..count).map(|i| -outer + i as f64 * step).collect()
        }
    }
}

/// One pier per interior support; the extent covers columns and cap and
/// reaches into the deck soffit.
pub(super) fn piers(config: &BridgeConfig) -> Vec<Part> {
    let size = config.pier_section_size();
    let half = 0.5 * size;
    let offsets = column_offsets(config);

    let cap = match config.pier_layout() {
        PierLayout::SingleColumn => None,
        PierLayout::MultiColumn => Some(PierCap {
            length: size + 0.5,
            width: 2.0 * offsets.iter().fold(0.0_f64, |m, y| m.max(y.abs())) + size,
            depth: PIER_CAP_DEPTH,
        }),
        PierLayout::HammerHead => Some(PierCap {
            length: size + 0.5,
            width: HAMMER_HEAD_WIDTH_RATIO * config.width(),
            depth: PIER_CAP_DEPTH,
        }),
    };
    let column_height = config.pier_height() - cap.as_ref().map_or(0.0, |c| c.depth);

    let half_x = cap.as_ref().map_or(half, |c| half.max(0.5 * c.length));
    let half_y = offsets
        .iter()
        .map(|y| y.abs() + half)
        .chain(cap.as_ref().map(|c| 0.5 * c.width))
        .fold(0.0_f64, f64::max);

    config
        .pier_stations()
        .into_iter()
        .enumerate()
        .map(|(idx, station)| Part {
            kind: ComponentKind::Pier,
            name: format!("pier_{}", idx + 1),
            bounds: Bounds::from_corners(
                [station - half_x, -half_y, 0.0],
                [
                    station + half_x,
                    half_y,
                    config.pier_height() + PIER_DECK_EMBED,
                ],
            ),
            shape: ComponentShape::Pier {
                layout: config.pier_layout(),
                section: config.pier_section(),
                section_size: size,
                station,
                column_offsets: offsets.clone(),
                column_height,
                cap: cap.clone(),
            },
        })
        .collect()
}

/// Two railings on the deck edges, running the full deck length.
pub(super) fn railings(config: &BridgeConfig) -> Vec<Part> {
    let edge = 0.5 * config.width();
    let z0 = config.deck_top();
    let z1 = z0 + RAILING_HEIGHT;

    [("railing_left", edge - RAILING_WIDTH, edge), ("railing_right", -edge, -edge + RAILING_WIDTH)]
        .into_iter()
        .map(|(name, y0, y1)| Part {
            kind: ComponentKind::Railing,
            name: name.to_string(),
            bounds: Bounds::from_corners([0.0, y0, z0], [config.total_length(), y1, z1]),
            shape: ComponentShape::Solid,
        })
        .collect()
}

/// Approach slab, back wall and both wing walls at one abutment.
pub(super) fn abutment(config: &BridgeConfig, end: BridgeEnd) -> Vec<Part> {
    let edge = 0.5 * config.width();
    let deck_top = config.deck_top();
    let slab_bottom = deck_top - APPROACH_SLAB_THICKNESS;
    let (slab_x0, slab_x1) = end.outward(config, APPROACH_SLAB_LENGTH);
    let (wall_x0, wall_x1) = end.outward(config, BACK_WALL_THICKNESS);
    let side = end.label();

    vec![
        Part {
            kind: ComponentKind::ApproachSlab,
            name: format!("approach_slab_{side}"),
            bounds: Bounds::from_corners([slab_x0, -edge, slab_bottom], [slab_x1, edge, deck_top]),
            shape: ComponentShape::Solid,
        },
        Part {
            kind: ComponentKind::BackWall,
            name: format!("back_wall_{side}"),
            bounds: Bounds::from_corners([wall_x0, -edge, 0.0], [wall_x1, edge, slab_bottom]),
            shape: ComponentShape::Solid,
        },
        Part {
            kind: ComponentKind::WingWall,
            name: format!("wing_wall_{side}_left"),
            bounds: Bounds::from_corners(
                [slab_x0, edge, 0.0],
                [slab_x1, edge + WING_WALL_THICKNESS, deck_top],
            ),
            shape: ComponentShape::Solid,
        },
        Part {
            kind: ComponentKind::WingWall,
            name: format!("wing_wall_{side}_right"),
            bounds: Bounds::from_corners(
                [slab_x0, -edge - WING_WALL_THICKNESS, 0.0],
                [slab_x1, -edge, deck_top],
            ),
            shape: ComponentShape::Solid,
        },
    ]
}
