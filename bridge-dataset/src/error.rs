//! Error types for bridge generation, simulation hand-off and segmentation.

use thiserror::Error;

/// Errors produced while building or processing one bridge.
///
/// Segmentation ambiguity is not represented here: ambiguous points are
/// resolved by the tie-break policy or dropped and counted.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A sampled or overridden configuration broke a domain constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Derived component extents are empty, inverted or overlap outside a joint.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The CAD or LiDAR collaborator failed, exited non-zero or timed out.
    #[error("{stage} stage failed: {reason}")]
    ExternalStageFailure { stage: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed scan data: {0}")]
    ScanFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
