//! Scanner survey planning.
//!
//! Eight terrestrial scanner legs are placed deterministically around the
//! bridge's nominal volume:
//!
//! | legs | placement                                              | looks        |
//! |------|--------------------------------------------------------|--------------|
//! | 0–1  | mid-length, beyond each deck edge, deck-top height     | at centre    |
//! | 2–3  | mid-width, beyond each deck end, deck-top height       | along axis   |
//! | 4–5  | quarter / three-quarter length, under the deck         | up           |
//! | 6–7  | quarter / three-quarter length, above the deck         | down         |
//!
//! Underside stations that would fall inside a pier extent are moved along
//! the axis to the nearer pier face plus the configured clearance.

use crate::bounds::Bounds;
use crate::config::SurveyConfig;
use constants::coordinate_system::UP;
use serde::{Deserialize, Serialize};

pub const LEG_COUNT: usize = 8;

/// Semantic role of a leg, fixed by its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Side,
    End,
    Underside,
    TopDown,
}

impl LegKind {
    pub fn for_leg(leg: usize) -> Self {
        match leg {
            0 | 1 => LegKind::Side,
            2 | 3 => LegKind::End,
            4 | 5 => LegKind::Underside,
            _ => LegKind::TopDown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanViewpoint {
    pub leg: usize,
    pub kind: LegKind,
    pub position: [f64; 3],
    pub target: [f64; 3],
    /// Unit vector from position towards target.
    pub direction: [f64; 3],
}

impl ScanViewpoint {
    fn looking_at(leg: usize, position: [f64; 3], target: [f64; 3]) -> Self {
        let delta = [
            target[0] - position[0],
            target[1] - position[1],
            target[2] - position[2],
        ];
        let norm = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt();
        let direction = if norm > 0.0 {
            [delta[0] / norm, delta[1] / norm, delta[2] / norm]
        } else {
            UP
        };
        Self {
            leg,
            kind: LegKind::for_leg(leg),
            position,
            target,
            direction,
        }
    }

    /// Heading of the look direction in the XY plane, degrees counter-clockwise from +X.
    pub fn heading_deg(&self) -> f64 {
        self.direction[1].atan2(self.direction[0]).to_degrees()
    }

    /// Elevation of the look direction above the horizontal, degrees.
    pub fn elevation_deg(&self) -> f64 {
        self.direction[2].clamp(-1.0, 1.0).asin().to_degrees()
    }
}

/// Longitudinal station clear of every obstacle's x-range widened by `clearance`.
fn clear_station(station: f64, obstacles: &[Bounds], clearance: f64) -> f64 {
    let mut station = station;
    for obstacle in obstacles {
        let (x0, x1) = (obstacle.min_x - clearance, obstacle.max_x + clearance);
        if station > x0 && station < x1 {
            station = if station >= 0.5 * (x0 + x1) { x1 } else { x0 };
        }
    }
    station
}

/// Place the eight scanner legs for a bridge occupying `bounds`, keeping the
/// underside legs out of the `obstacles` standing under the deck.
pub fn plan(
    bounds: &Bounds,
    obstacles: &[Bounds],
    config: &SurveyConfig,
) -> [ScanViewpoint; LEG_COUNT] {
    let center = bounds.center();
    let (length, width, _) = bounds.dimensions();
    let lateral = 0.5 * width + config.lateral_clearance;
    let longitudinal = 0.5 * length + config.longitudinal_clearance;
    let deck_height = bounds.max_z;
    let level = [center[0], center[1], deck_height];
    let stations = [
        bounds.min_x + 0.25 * length,
        bounds.min_x + 0.75 * length,
    ];
    let underside = stations.map(|x| clear_station(x, obstacles, config.obstacle_clearance));
    let below = bounds.min_z + config.instrument_height;
    let above = bounds.max_z + config.vertical_clearance;

    [
        ScanViewpoint::looking_at(0, [center[0], center[1] + lateral, deck_height], center),
        ScanViewpoint::looking_at(1, [center[0], center[1] - lateral, deck_height], center),
        ScanViewpoint::looking_at(2, [center[0] - longitudinal, center[1], deck_height], level),
        ScanViewpoint::looking_at(3, [center[0] + longitudinal, center[1], deck_height], level),
        ScanViewpoint::looking_at(
            4,
            [underside[0], center[1], below],
            [underside[0], center[1], bounds.max_z],
        ),
        ScanViewpoint::looking_at(
            5,
            [underside[1], center[1], below],
            [underside[1], center[1], bounds.max_z],
        ),
        ScanViewpoint::looking_at(
            6,
            [stations[0], center[1], above],
            [stations[0], center[1], bounds.min_z],
        ),
        ScanViewpoint::looking_at(
            7,
            [stations[1], center[1], above],
            [stations[1], center[1], bounds.min_z],
        ),
    ]
}
