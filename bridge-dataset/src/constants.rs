/// Shared dimensional constants for bridge generation and component derivation

/// Number of spans a generated bridge may have (inclusive)
pub const SPAN_COUNT_RANGE: (u32, u32) = (2, 5);

/// Total deck length in metres (inclusive)
pub const TOTAL_LENGTH_RANGE: (f64, f64) = (35.0, 160.0);

/// Deck width in metres (inclusive)
pub const WIDTH_RANGE: (f64, f64) = (20.5, 27.5);

/// Admissible length of any single span in metres (inclusive)
pub const SPAN_LENGTH_RANGE: (f64, f64) = (7.0, 50.0);

/// Relative jitter applied to equal span lengths while sampling
pub const SPAN_JITTER: f64 = 0.15;

/// Clear height between ground and deck soffit in metres
pub const PIER_HEIGHT_RANGE: (f64, f64) = (5.0, 12.0);

/// Column diameter or side length in metres
pub const PIER_SECTION_SIZE_RANGE: (f64, f64) = (1.2, 2.0);

/// Box girder cells per cross-section
pub const CELL_COUNT_RANGE: (u32, u32) = (1, 4);

/// Narrowest admissible box girder cell in metres
pub const MIN_CELL_WIDTH: f64 = 5.5;

/// Box girder depth as a fraction of the longest span, clamped to the range below
pub const BOX_GIRDER_DEPTH_RATIO: f64 = 1.0 / 20.0;
pub const BOX_GIRDER_DEPTH_RANGE: (f64, f64) = (1.6, 3.2);

/// Beam depth as a fraction of the longest span, clamped to the range below
pub const BEAM_DEPTH_RATIO: f64 = 1.0 / 15.0;
pub const BEAM_DEPTH_RANGE: (f64, f64) = (0.9, 2.4);

/// Beam-slab deck plate thickness
pub const SLAB_THICKNESS: f64 = 0.25;

/// Centre-to-centre spacing used to derive the beam count from the deck width
pub const BEAM_SPACING: f64 = 2.5;

/// Box girder web and flange thickness
pub const BOX_WALL_THICKNESS: f64 = 0.3;

/// Fraction of the deck width taken by the box bottom flange
pub const BOX_BOTTOM_WIDTH_RATIO: f64 = 0.7;

/// Depth by which pier extents reach into the deck soffit (pier–deck joint)
pub const PIER_DECK_EMBED: f64 = 0.05;

/// Hammer head cantilever as a fraction of the deck width
pub const HAMMER_HEAD_WIDTH_RATIO: f64 = 0.7;

/// Pier cap depth for hammer-head and multi-column piers
pub const PIER_CAP_DEPTH: f64 = 1.5;

/// Multi-column bents use three columns from this deck width upwards, two below
pub const THREE_COLUMN_MIN_WIDTH: f64 = 24.0;

/// Railing cross-section
pub const RAILING_HEIGHT: f64 = 1.1;
pub const RAILING_WIDTH: f64 = 0.3;

/// Approach slab dimensions at each abutment
pub const APPROACH_SLAB_LENGTH: f64 = 6.0;
pub const APPROACH_SLAB_THICKNESS: f64 = 0.4;

/// Back wall thickness along the bridge axis
pub const BACK_WALL_THICKNESS: f64 = 1.0;

/// Wing wall thickness across the bridge axis
pub const WING_WALL_THICKNESS: f64 = 0.5;

/// Relative tolerance on the span-length sum
pub const SPAN_SUM_TOLERANCE: f64 = 1e-6;

/// Volume quantum used to compare extent volumes during tie-breaking (m³)
pub const VOLUME_QUANTUM: f64 = 1e-6;
