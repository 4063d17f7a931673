/// Axis-aligned bounding volumes in the bridge frame
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new()
    }
}

impl Bounds {
    /// Create empty bounds initialised to infinity values
    pub fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
            min_z: f64::INFINITY,
            max_z: f64::NEG_INFINITY,
        }
    }

    pub fn from_corners(min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            min_x: min[0],
            max_x: max[0],
            min_y: min[1],
            max_y: max[1],
            min_z: min[2],
            max_z: max[2],
        }
    }

    pub fn min(&self) -> [f64; 3] {
        [self.min_x, self.min_y, self.min_z]
    }

    pub fn max(&self) -> [f64; 3] {
        [self.max_x, self.max_y, self.max_z]
    }

    /// Grow bounds to include a point
    pub fn update(&mut self, x: f64, y: f64, z: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self.min_z = self.min_z.min(z);
        self.max_z = self.max_z.max(z);
    }

    /// Smallest bounds containing both inputs
    pub fn merge(mut self, other: &Bounds) -> Self {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
        self.min_z = self.min_z.min(other.min_z);
        self.max_z = self.max_z.max(other.max_z);
        self
    }

    /// Extent along each axis (length, width, height in the bridge frame)
    pub fn dimensions(&self) -> (f64, f64, f64) {
        (
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        )
    }

    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
            0.5 * (self.min_z + self.max_z),
        ]
    }

    pub fn volume(&self) -> f64 {
        let (dx, dy, dz) = self.dimensions();
        dx * dy * dz
    }

    /// Finite and strictly positive along every axis
    pub fn is_valid(&self) -> bool {
        let coords = [
            self.min_x, self.max_x, self.min_y, self.max_y, self.min_z, self.max_z,
        ];
        coords.iter().all(|c| c.is_finite())
            && self.min_x < self.max_x
            && self.min_y < self.max_y
            && self.min_z < self.max_z
    }

    /// Containment test with a tolerance band around every face
    pub fn contains(&self, p: [f64; 3], tolerance: f64) -> bool {
        p[0] >= self.min_x - tolerance
            && p[0] <= self.max_x + tolerance
            && p[1] >= self.min_y - tolerance
            && p[1] <= self.max_y + tolerance
            && p[2] >= self.min_z - tolerance
            && p[2] <= self.max_z + tolerance
    }

    /// Bounds grown by `margin` on every face
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            max_x: self.max_x + margin,
            min_y: self.min_y - margin,
            max_y: self.max_y + margin,
            min_z: self.min_z - margin,
            max_z: self.max_z + margin,
        }
    }

    /// Volume shared with another box, zero when they only touch
    pub fn intersection_volume(&self, other: &Bounds) -> f64 {
        let overlap = |lo_a: f64, hi_a: f64, lo_b: f64, hi_b: f64| {
            (hi_a.min(hi_b) - lo_a.max(lo_b)).max(0.0)
        };
        overlap(self.min_x, self.max_x, other.min_x, other.max_x)
            * overlap(self.min_y, self.max_y, other.min_y, other.max_y)
            * overlap(self.min_z, self.max_z, other.min_z, other.max_z)
    }
}
