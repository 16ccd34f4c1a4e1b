//! Minimal geometry for object placement.
//!
//! Placement only needs a point and a yaw; rendering layers own everything
//! else about an object's transform.

use serde::{Deserialize, Serialize};

/// A point in scene space. Omitted coordinates default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate.
    #[serde(default)]
    pub x: f32,
    /// Y coordinate (up).
    #[serde(default)]
    pub y: f32,
    /// Z coordinate.
    #[serde(default)]
    pub z: f32,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a point from its coordinates.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Position plus rotation about the up axis, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec3,
    /// Rotation about the up axis in degrees, `[0, 360)` for randomized objects.
    #[serde(default)]
    pub rotation_degrees: f32,
}

impl Transform {
    /// Create a transform from a position and a yaw in degrees.
    pub const fn new(position: Vec3, rotation_degrees: f32) -> Self {
        Self {
            position,
            rotation_degrees,
        }
    }
}
