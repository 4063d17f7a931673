//! Bridge parameter sampling.
//!
//! [`sample`] draws one candidate configuration and either accepts it or
//! returns the reason it was rejected; [`generate`] drives it in a bounded
//! retry loop. Both are pure functions of the random source and the
//! constraints, so a fixed seed always reproduces the same bridge.

use crate::bounds::Bounds;
use crate::constants::*;
use crate::error::{BridgeError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deck topology without its sub-parameters, used for overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    BoxGirder,
    BeamSlab,
}

/// Deck topology with its topology-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Topology {
    /// Hollow multi-cell box girder.
    BoxGirder { cell_count: u32 },
    /// Flat slab carried by parallel beams.
    BeamSlab { beam_count: u32 },
}

impl Topology {
    pub fn kind(&self) -> TopologyKind {
        match self {
            Topology::BoxGirder { .. } => TopologyKind::BoxGirder,
            Topology::BeamSlab { .. } => TopologyKind::BeamSlab,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PierLayout {
    SingleColumn,
    MultiColumn,
    HammerHead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PierSection {
    Circular,
    Rectangular,
}

/// Beam count implied by a deck width.
pub fn beam_count_for_width(width: f64) -> u32 {
    (width / BEAM_SPACING).floor() as u32
}

/// Raw bridge parameters before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeParams {
    pub topology: Topology,
    pub total_length: f64,
    pub width: f64,
    pub span_lengths: Vec<f64>,
    pub pier_layout: PierLayout,
    pub pier_section: PierSection,
    pub pier_height: f64,
    pub pier_section_size: f64,
}

/// Reason a candidate configuration was refused.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection(pub String);

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single sampling attempt.
#[derive(Debug, Clone)]
pub enum Sample {
    Valid(BridgeConfig),
    Reject(Rejection),
}

/// Validated, immutable bridge configuration.
///
/// Construct through [`BridgeConfig::new`] or [`generate`]; deserialization
/// runs the same validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BridgeParams")]
pub struct BridgeConfig {
    topology: Topology,
    span_count: u32,
    total_length: f64,
    width: f64,
    span_lengths: Vec<f64>,
    pier_layout: PierLayout,
    pier_section: PierSection,
    pier_height: f64,
    pier_section_size: f64,
    deck_depth: f64,
}

impl TryFrom<BridgeParams> for BridgeConfig {
    type Error = BridgeError;

    fn try_from(params: BridgeParams) -> Result<Self> {
        BridgeConfig::new(params)
    }
}

fn in_range(value: f64, (lo, hi): (f64, f64)) -> bool {
    value.is_finite() && value >= lo && value <= hi
}

impl BridgeConfig {
    /// Validate parameters and derive the deck depth.
    pub fn new(params: BridgeParams) -> Result<Self> {
        Self::check(params).map_err(|r| BridgeError::ConstraintViolation(r.0))
    }

    fn check(params: BridgeParams) -> std::result::Result<Self, Rejection> {
        let span_count = params.span_lengths.len() as u32;
        if span_count < SPAN_COUNT_RANGE.0 || span_count > SPAN_COUNT_RANGE.1 {
            return Err(Rejection(format!(
                "span count {span_count} outside {}..={}",
                SPAN_COUNT_RANGE.0, SPAN_COUNT_RANGE.1
            )));
        }
        if !in_range(params.total_length, TOTAL_LENGTH_RANGE) {
            return Err(Rejection(format!(
                "total length {:.2} m outside {:?}",
                params.total_length, TOTAL_LENGTH_RANGE
            )));
        }
        if !in_range(params.width, WIDTH_RANGE) {
            return Err(Rejection(format!(
                "width {:.2} m outside {:?}",
                params.width, WIDTH_RANGE
            )));
        }
        if let Some(span) = params
            .span_lengths
            .iter()
            .find(|s| !in_range(**s, SPAN_LENGTH_RANGE))
        {
            return Err(Rejection(format!(
                "span length {span:.2} m outside {SPAN_LENGTH_RANGE:?}"
            )));
        }
        let span_sum: f64 = params.span_lengths.iter().sum();
        if (span_sum - params.total_length).abs() > SPAN_SUM_TOLERANCE * params.total_length {
            return Err(Rejection(format!(
                "span lengths sum to {span_sum} m, expected {} m",
                params.total_length
            )));
        }
        if params.pier_layout == PierLayout::HammerHead && span_count == 2 {
            return Err(Rejection(
                "hammer-head piers need more than two spans".to_string(),
            ));
        }
        if !in_range(params.pier_height, PIER_HEIGHT_RANGE) {
            return Err(Rejection(format!(
                "pier height {:.2} m outside {PIER_HEIGHT_RANGE:?}",
                params.pier_height
            )));
        }
        if !in_range(params.pier_section_size, PIER_SECTION_SIZE_RANGE) {
            return Err(Rejection(format!(
                "pier section size {:.2} m outside {PIER_SECTION_SIZE_RANGE:?}",
                params.pier_section_size
            )));
        }

        match params.topology {
            Topology::BoxGirder { cell_count } => {
                if cell_count < CELL_COUNT_RANGE.0 || cell_count > CELL_COUNT_RANGE.1 {
                    return Err(Rejection(format!("cell count {cell_count} out of range")));
                }
                let cell_width = params.width * BOX_BOTTOM_WIDTH_RATIO / cell_count as f64;
                if cell_width < MIN_CELL_WIDTH {
                    return Err(Rejection(format!(
                        "{cell_count} cells of {cell_width:.2} m are narrower than {MIN_CELL_WIDTH} m"
                    )));
                }
            }
            Topology::BeamSlab { beam_count } => {
                let expected = beam_count_for_width(params.width);
                if beam_count != expected {
                    return Err(Rejection(format!(
                        "beam count {beam_count} inconsistent with width {:.2} m (expected {expected})",
                        params.width
                    )));
                }
            }
        }

        let longest_span = params.span_lengths.iter().copied().fold(0.0, f64::max);
        let deck_depth = match params.topology {
            Topology::BoxGirder { .. } => (longest_span * BOX_GIRDER_DEPTH_RATIO)
                .clamp(BOX_GIRDER_DEPTH_RANGE.0, BOX_GIRDER_DEPTH_RANGE.1),
            Topology::BeamSlab { .. } => {
                (longest_span * BEAM_DEPTH_RATIO).clamp(BEAM_DEPTH_RANGE.0, BEAM_DEPTH_RANGE.1)
                    + SLAB_THICKNESS
            }
        };

        Ok(Self {
            topology: params.topology,
            span_count,
            total_length: params.total_length,
            width: params.width,
            span_lengths: params.span_lengths,
            pier_layout: params.pier_layout,
            pier_section: params.pier_section,
            pier_height: params.pier_height,
            pier_section_size: params.pier_section_size,
            deck_depth,
        })
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn span_count(&self) -> u32 {
        self.span_count
    }

    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn span_lengths(&self) -> &[f64] {
        &self.span_lengths
    }

    pub fn pier_layout(&self) -> PierLayout {
        self.pier_layout
    }

    pub fn pier_section(&self) -> PierSection {
        self.pier_section
    }

    /// Clear height from the ground to the deck soffit.
    pub fn pier_height(&self) -> f64 {
        self.pier_height
    }

    /// Column diameter (circular) or side length (rectangular).
    pub fn pier_section_size(&self) -> f64 {
        self.pier_section_size
    }

    pub fn deck_depth(&self) -> f64 {
        self.deck_depth
    }

    pub fn deck_top(&self) -> f64 {
        self.pier_height + self.deck_depth
    }

    /// Longitudinal positions of the interior supports.
    pub fn pier_stations(&self) -> Vec<f64> {
        self.span_lengths
            .iter()
            .take(self.span_lengths.len().saturating_sub(1))
            .scan(0.0, |station, span| {
                *station += span;
                Some(*station)
            })
            .collect()
    }

    /// Deck footprint from the ground to the deck top; the volume handed to
    /// the survey planner.
    pub fn nominal_bounds(&self) -> Bounds {
        Bounds::from_corners(
            [0.0, -0.5 * self.width, 0.0],
            [self.total_length, 0.5 * self.width, self.deck_top()],
        )
    }
}

/// Optional overrides applied while sampling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub topology: Option<TopologyKind>,
    pub span_count: Option<u32>,
    pub total_length: Option<f64>,
    pub width: Option<f64>,
    pub pier_layout: Option<PierLayout>,
    pub pier_section: Option<PierSection>,
}

impl Constraints {
    /// Overrides outside their documented range can never be satisfied.
    pub fn check_overrides(&self) -> Result<()> {
        if let Some(spans) = self.span_count
            && (spans < SPAN_COUNT_RANGE.0 || spans > SPAN_COUNT_RANGE.1)
        {
            return Err(BridgeError::ConstraintViolation(format!(
                "span count override {spans} outside {SPAN_COUNT_RANGE:?}"
            )));
        }
        if let Some(length) = self.total_length
            && !in_range(length, TOTAL_LENGTH_RANGE)
        {
            return Err(BridgeError::ConstraintViolation(format!(
                "total length override {length} outside {TOTAL_LENGTH_RANGE:?}"
            )));
        }
        if let Some(width) = self.width
            && !in_range(width, WIDTH_RANGE)
        {
            return Err(BridgeError::ConstraintViolation(format!(
                "width override {width} outside {WIDTH_RANGE:?}"
            )));
        }
        Ok(())
    }
}

/// Round to centimetres so persisted dimensions stay readable.
fn round_cm(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Split `total` into `count` jittered spans whose sum is exactly `total`.
fn sample_spans<R: Rng + ?Sized>(rng: &mut R, total: f64, count: u32) -> Vec<f64> {
    let weights: Vec<f64> = (0..count)
        .map(|_| 1.0 + rng.random_range(-SPAN_JITTER..=SPAN_JITTER))
        .collect();
    let weight_sum: f64 = weights.iter().sum();

    let mut spans: Vec<f64> = weights[..weights.len() - 1]
        .iter()
        .map(|w| round_cm(total * w / weight_sum))
        .collect();
    let assigned: f64 = spans.iter().sum();
    spans.push(total - assigned);
    spans
}

/// Draw one candidate configuration.
pub fn sample<R: Rng + ?Sized>(rng: &mut R, constraints: &Constraints) -> Sample {
    let topology_kind = constraints.topology.unwrap_or_else(|| {
        if rng.random_bool(0.5) {
            TopologyKind::BoxGirder
        } else {
            TopologyKind::BeamSlab
        }
    });
    let span_count = constraints
        .span_count
        .unwrap_or_else(|| rng.random_range(SPAN_COUNT_RANGE.0..=SPAN_COUNT_RANGE.1));
    let total_length = constraints.total_length.unwrap_or_else(|| {
        round_cm(rng.random_range(TOTAL_LENGTH_RANGE.0..=TOTAL_LENGTH_RANGE.1))
    });
    let width = constraints
        .width
        .unwrap_or_else(|| round_cm(rng.random_range(WIDTH_RANGE.0..=WIDTH_RANGE.1)));
    let pier_layout = constraints.pier_layout.unwrap_or_else(|| {
        match rng.random_range(0..3) {
            0 => PierLayout::SingleColumn,
            1 => PierLayout::MultiColumn,
            _ => PierLayout::HammerHead,
        }
    });
    let pier_section = constraints.pier_section.unwrap_or_else(|| {
        if rng.random_bool(0.5) {
            PierSection::Circular
        } else {
            PierSection::Rectangular
        }
    });

    let span_lengths = sample_spans(rng, total_length, span_count.max(1));
    let pier_height = round_cm(rng.random_range(PIER_HEIGHT_RANGE.0..=PIER_HEIGHT_RANGE.1));
    let pier_section_size =
        round_cm(rng.random_range(PIER_SECTION_SIZE_RANGE.0..=PIER_SECTION_SIZE_RANGE.1));

    let topology = match topology_kind {
        TopologyKind::BoxGirder => Topology::BoxGirder {
            cell_count: rng.random_range(CELL_COUNT_RANGE.0..=CELL_COUNT_RANGE.1),
        },
        TopologyKind::BeamSlab => Topology::BeamSlab {
            beam_count: beam_count_for_width(width),
        },
    };

    let params = BridgeParams {
        topology,
        total_length,
        width,
        span_lengths,
        pier_layout,
        pier_section,
        pier_height,
        pier_section_size,
    };

    match BridgeConfig::check(params) {
        Ok(config) => Sample::Valid(config),
        Err(rejection) => Sample::Reject(rejection),
    }
}

/// Sample until a configuration is accepted or `max_attempts` is spent.
pub fn generate<R: Rng + ?Sized>(
    rng: &mut R,
    constraints: &Constraints,
    max_attempts: u32,
) -> Result<BridgeConfig> {
    constraints.check_overrides()?;

    let mut last_rejection = None;
    for attempt in 1..=max_attempts {
        match sample(rng, constraints) {
            Sample::Valid(config) => {
                log::debug!("Accepted configuration on attempt {attempt}");
                return Ok(config);
            }
            Sample::Reject(rejection) => {
                log::debug!("Attempt {attempt} rejected: {rejection}");
                last_rejection = Some(rejection);
            }
        }
    }

    Err(BridgeError::ConstraintViolation(format!(
        "no valid configuration after {max_attempts} attempts (last: {})",
        last_rejection.map_or_else(|| "none".to_string(), |r| r.0)
    )))
}

/// Deterministic generator for one bridge of a batch.
pub fn bridge_rng(batch_seed: u64, bridge_index: usize) -> StdRng {
    StdRng::seed_from_u64(batch_seed.wrapping_add(bridge_index as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference_params() -> BridgeParams {
        BridgeParams {
            topology: Topology::BoxGirder { cell_count: 2 },
            total_length: 100.0,
            width: 24.0,
            span_lengths: vec![33.0, 34.0, 33.0],
            pier_layout: PierLayout::SingleColumn,
            pier_section: PierSection::Circular,
            pier_height: 8.0,
            pier_section_size: 1.6,
        }
    }

    #[test]
    fn generated_configs_respect_ranges() {
        for seed in 0..200 {
            let mut rng = bridge_rng(seed, 0);
            let config = generate(&mut rng, &Constraints::default(), 64).unwrap();

            assert!((2..=5).contains(&config.span_count()));
            assert_eq!(config.span_lengths().len() as u32, config.span_count());
            assert!(in_range(config.total_length(), TOTAL_LENGTH_RANGE));
            assert!(in_range(config.width(), WIDTH_RANGE));
            assert!(in_range(config.pier_height(), PIER_HEIGHT_RANGE));
            assert!(config.span_lengths().iter().all(|s| *s > 0.0));

            let sum: f64 = config.span_lengths().iter().sum();
            assert!((sum - config.total_length()).abs() <= 1e-6 * config.total_length());
            assert!(
                !(config.pier_layout() == PierLayout::HammerHead && config.span_count() == 2)
            );
        }
    }

    #[test]
    fn same_seed_reproduces_configuration() {
        let constraints = Constraints {
            topology: Some(TopologyKind::BeamSlab),
            ..Default::default()
        };
        let a = generate(&mut bridge_rng(42, 3), &constraints, 64).unwrap();
        let b = generate(&mut bridge_rng(42, 3), &constraints, 64).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.topology().kind(), TopologyKind::BeamSlab);
    }

    #[test]
    fn overrides_are_honoured() {
        let constraints = Constraints {
            topology: Some(TopologyKind::BoxGirder),
            span_count: Some(3),
            total_length: Some(90.0),
            width: Some(25.0),
            pier_layout: Some(PierLayout::HammerHead),
            pier_section: Some(PierSection::Rectangular),
        };
        let config = generate(&mut bridge_rng(1, 0), &constraints, 64).unwrap();
        assert_eq!(config.span_count(), 3);
        assert_relative_eq!(config.total_length(), 90.0);
        assert_relative_eq!(config.width(), 25.0);
        assert_eq!(config.pier_layout(), PierLayout::HammerHead);
        assert_eq!(config.pier_section(), PierSection::Rectangular);
    }

    #[test]
    fn hammer_head_with_two_spans_exhausts_retries() {
        let constraints = Constraints {
            span_count: Some(2),
            pier_layout: Some(PierLayout::HammerHead),
            ..Default::default()
        };
        let err = generate(&mut bridge_rng(0, 0), &constraints, 10).unwrap_err();
        assert!(matches!(err, BridgeError::ConstraintViolation(_)));
    }

    #[test]
    fn out_of_range_override_fails_fast() {
        let constraints = Constraints {
            width: Some(40.0),
            ..Default::default()
        };
        let err = generate(&mut bridge_rng(0, 0), &constraints, 10).unwrap_err();
        assert!(matches!(err, BridgeError::ConstraintViolation(_)));
    }

    #[test]
    fn explicit_config_derives_supports_and_bounds() {
        let config = BridgeConfig::new(reference_params()).unwrap();
        assert_eq!(config.pier_stations(), vec![33.0, 67.0]);
        assert_relative_eq!(config.deck_depth(), 1.7);

        let bounds = config.nominal_bounds();
        assert_eq!(bounds.min(), [0.0, -12.0, 0.0]);
        assert_relative_eq!(bounds.max_z, 9.7);
    }

    #[test]
    fn inconsistent_spans_are_rejected() {
        let mut params = reference_params();
        params.span_lengths = vec![33.0, 34.0, 30.0];
        assert!(matches!(
            BridgeConfig::new(params),
            Err(BridgeError::ConstraintViolation(_))
        ));

        let mut params = reference_params();
        params.topology = Topology::BoxGirder { cell_count: 4 };
        assert!(BridgeConfig::new(params).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let config = BridgeConfig::new(reference_params()).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: BridgeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);

        let broken = json.replace("\"width\":24.0", "\"width\":99.0");
        assert!(serde_json::from_str::<BridgeConfig>(&broken).is_err());
    }
}
