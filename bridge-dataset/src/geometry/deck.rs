/// Deck layout rules, one per topology
use super::ComponentShape;
use crate::bounds::Bounds;
use crate::constants::{BOX_BOTTOM_WIDTH_RATIO, BOX_WALL_THICKNESS, SLAB_THICKNESS};
use crate::params::BridgeConfig;

/// Deck volume shared by both topologies: full length and width between soffit and deck top.
fn deck_bounds(config: &BridgeConfig) -> Bounds {
    Bounds::from_corners(
        [0.0, -0.5 * config.width(), config.pier_height()],
        [config.total_length(), 0.5 * config.width(), config.deck_top()],
    )
}

/// Longitudinal ranges of the deck segments, one per span.
fn span_segments(config: &BridgeConfig) -> Vec<[f64; 2]> {
    let mut start = 0.0;
    config
        .span_lengths()
        .iter()
        .map(|span| {
            let segment = [start, start + span];
            start += span;
            segment
        })
        .collect()
}

/// Hollow multi-cell box with cantilevered top flange.
pub(super) fn box_girder(config: &BridgeConfig, cell_count: u32) -> (Bounds, ComponentShape) {
    let shape = ComponentShape::BoxGirder {
        cell_count,
        depth: config.deck_depth(),
        top_width: config.width(),
        bottom_width: config.width() * BOX_BOTTOM_WIDTH_RATIO,
        wall_thickness: BOX_WALL_THICKNESS,
        segments: span_segments(config),
    };
    (deck_bounds(config), shape)
}

/// Flat slab on evenly spaced parallel beams.
pub(super) fn beam_slab(config: &BridgeConfig, beam_count: u32) -> (Bounds, ComponentShape) {
    let beam_spacing = config.width() / beam_count as f64;
    let shape = ComponentShape::BeamSlab {
        beam_count,
        beam_spacing,
        beam_width: 0.4 * beam_spacing,
        beam_depth: config.deck_depth() - SLAB_THICKNESS,
        slab_thickness: SLAB_THICKNESS,
        segments: span_segments(config),
    };
    (deck_bounds(config), shape)
}
