//! Synthetic, ground-truth-labeled bridge point-cloud datasets.
//!
//! Randomized bridge configurations are expanded into component extents,
//! surveyed from eight scanner legs, handed to external CAD and LiDAR stages,
//! and the returned scan points are labeled by the component that owns them.

pub mod bounds;
pub mod config;
pub mod constants;
pub mod error;
pub mod external;
pub mod geometry;
pub mod laz;
pub mod manifest;
pub mod params;
pub mod pipeline;
pub mod scan;
pub mod scene;
pub mod segmentation;
pub mod survey;

pub use error::{BridgeError, Result};
