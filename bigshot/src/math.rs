//! Rotation math for view rays
//!
//! Rays are `glam::DVec3` values in a y-down camera frame looking along +z.
//! [`RotationTransform`] accumulates elementary rotations by prepending them,
//! so the rotation added last is the last one applied to a point.

use glam::{DMat3, DVec3};
use serde::Deserialize;

/// A 3D point / ray direction.
pub type Point3 = DVec3;

/// Camera orientation in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Orientation {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    pub const fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Orientation whose forward ray points along `dir` (roll 0).
    pub fn looking_at(dir: Point3) -> Self {
        let dir = dir.normalize();
        Self {
            yaw: dir.x.atan2(dir.z).to_degrees(),
            pitch: (-dir.y).clamp(-1.0, 1.0).asin().to_degrees(),
            roll: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Composable 3×3 rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationTransform {
    matrix: DMat3,
}

impl Default for RotationTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl RotationTransform {
    pub fn identity() -> Self {
        Self {
            matrix: DMat3::IDENTITY,
        }
    }

    /// Prepend a rotation of `angle` radians about `axis`.
    pub fn rotate(&mut self, axis: Axis, angle: f64) -> &mut Self {
        let r = match axis {
            Axis::X => DMat3::from_rotation_x(angle),
            Axis::Y => DMat3::from_rotation_y(angle),
            Axis::Z => DMat3::from_rotation_z(angle),
        };
        self.matrix = r * self.matrix;
        self
    }

    /// Combined view + calibration rotation used by the face renderer.
    ///
    /// Applied to a ray: view roll, pitch, yaw, then offset yaw, pitch, roll.
    pub fn for_view(view: Orientation, offset: Orientation) -> Self {
        let mut t = Self::identity();
        t.rotate(Axis::Z, view.roll.to_radians())
            .rotate(Axis::X, view.pitch.to_radians())
            .rotate(Axis::Y, view.yaw.to_radians())
            .rotate(Axis::Y, offset.yaw.to_radians())
            .rotate(Axis::X, offset.pitch.to_radians())
            .rotate(Axis::Z, offset.roll.to_radians());
        t
    }

    #[inline]
    pub fn apply(&self, p: Point3) -> Point3 {
        self.matrix * p
    }

    pub fn matrix(&self) -> DMat3 {
        self.matrix
    }
}
