//! Bridge-local coordinate frame shared by component extents, meshes and scanner legs.
//!
//! X runs along the bridge axis with the deck starting at x = 0, Y is lateral
//! with the deck centred on y = 0 and Z points up from the ground at z = 0.

/// Up axis declared to the simulator's OBJ loader
pub const SCENE_UP_AXIS: &str = "z";

/// Unit vector pointing up in the bridge frame
pub const UP: [f64; 3] = [0.0, 0.0, 1.0];
