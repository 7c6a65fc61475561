//! Value types for machine poses and circle geometry.
//!
//! A [`Pose`] carries three linear and three rotary coordinates; a
//! [`Cartesian`] is the plain 3-vector used for circle centers and plane
//! normals. Both are pure data with no interpolation behavior of their own.

use core::ops::{Add, Sub};

use libm::sqrt;
use serde::Deserialize;

use crate::config::constants::MAG_EPSILON;

/// Full machine pose: three linear axes plus three rotary axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Pose {
    /// Linear X coordinate (user units).
    pub x: f64,
    /// Linear Y coordinate (user units).
    pub y: f64,
    /// Linear Z coordinate (user units).
    pub z: f64,
    /// Rotary A coordinate (degrees).
    pub a: f64,
    /// Rotary B coordinate (degrees).
    pub b: f64,
    /// Rotary C coordinate (degrees).
    pub c: f64,
}

impl Pose {
    /// Create a pose from all six coordinates.
    pub const fn new(x: f64, y: f64, z: f64, a: f64, b: f64, c: f64) -> Self {
        Self { x, y, z, a, b, c }
    }

    /// Create a pose with only linear coordinates set.
    pub const fn linear(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, 0.0, 0.0, 0.0)
    }

    /// Linear portion of the pose.
    #[inline]
    pub const fn translation(&self) -> Cartesian {
        Cartesian::new(self.x, self.y, self.z)
    }

    /// Euclidean magnitude of the rotary portion.
    #[inline]
    pub fn rotation_magnitude(&self) -> f64 {
        sqrt(self.a * self.a + self.b * self.b + self.c * self.c)
    }

    /// Linear interpolation between two poses, `t` in `[0, 1]`.
    pub fn interpolate(from: Pose, to: Pose, t: f64) -> Pose {
        from + (to - from).scale(t)
    }

    fn scale(self, k: f64) -> Pose {
        Pose::new(
            self.x * k,
            self.y * k,
            self.z * k,
            self.a * k,
            self.b * k,
            self.c * k,
        )
    }
}

impl Add for Pose {
    type Output = Pose;

    fn add(self, rhs: Pose) -> Pose {
        Pose::new(
            self.x + rhs.x,
            self.y + rhs.y,
            self.z + rhs.z,
            self.a + rhs.a,
            self.b + rhs.b,
            self.c + rhs.c,
        )
    }
}

impl Sub for Pose {
    type Output = Pose;

    fn sub(self, rhs: Pose) -> Pose {
        Pose::new(
            self.x - rhs.x,
            self.y - rhs.y,
            self.z - rhs.z,
            self.a - rhs.a,
            self.b - rhs.b,
            self.c - rhs.c,
        )
    }
}

/// Plain 3-vector for circle centers, plane normals, and directions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Cartesian {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Cartesian {
    /// Create a vector from components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, rhs: Cartesian) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Cross product.
    #[inline]
    pub fn cross(&self, rhs: Cartesian) -> Cartesian {
        Cartesian::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Euclidean magnitude.
    #[inline]
    pub fn magnitude(&self) -> f64 {
        sqrt(self.dot(*self))
    }

    /// Scale by a factor.
    #[inline]
    pub fn scale(&self, k: f64) -> Cartesian {
        Cartesian::new(self.x * k, self.y * k, self.z * k)
    }

    /// Unit vector, or `None` when the magnitude is below `MAG_EPSILON`.
    pub fn unit(&self) -> Option<Cartesian> {
        let mag = self.magnitude();
        if mag < MAG_EPSILON {
            None
        } else {
            Some(self.scale(1.0 / mag))
        }
    }
}

impl Add for Cartesian {
    type Output = Cartesian;

    fn add(self, rhs: Cartesian) -> Cartesian {
        Cartesian::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Cartesian {
    type Output = Cartesian;

    fn sub(self, rhs: Cartesian) -> Cartesian {
        Cartesian::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}
