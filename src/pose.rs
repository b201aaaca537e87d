//! Coordinate extraction.
//!
//! The runtime hands out right-handed, Y-up, row-major 3x4 rigid transforms.
//! Consumers get left-handed, Y-up values: the Z axis is negated. For a
//! rotation `R` that is the similarity `S R S` with `S = diag(1, 1, -1)`,
//! which flips the sign of the four entries that mix Z with X or Y.

use glam::{Mat3, Quat, Vec3};

use crate::backend::{RawMatrix34, RawPose};

/// Position and orientation in the left-handed convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_raw(matrix: &RawMatrix34) -> Self {
        Self {
            position: extract_position(matrix),
            rotation: extract_rotation(matrix),
        }
    }
}

/// A full pose snapshot of a tracked device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl Pose {
    pub fn from_raw(raw: &RawPose) -> Self {
        let transform = Transform::from_raw(&raw.device_to_absolute);
        Self {
            position: transform.position,
            rotation: transform.rotation,
            velocity: convert_vector(raw.velocity),
            angular_velocity: convert_axial_vector(raw.angular_velocity),
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: self.rotation,
        }
    }
}

pub fn extract_position(matrix: &RawMatrix34) -> Vec3 {
    let m = &matrix.m;
    Vec3::new(m[0][3], m[1][3], -m[2][3])
}

/// Trace-based quaternion extraction with signs taken from the off-diagonal
/// differences. The result is always renormalized.
pub fn extract_rotation(matrix: &RawMatrix34) -> Quat {
    let r = mirrored_rotation(matrix);

    let (m00, m11, m22) = (r[0][0], r[1][1], r[2][2]);
    let w = (1.0 + m00 + m11 + m22).max(0.0).sqrt() * 0.5;
    let x = (1.0 + m00 - m11 - m22).max(0.0).sqrt() * 0.5;
    let y = (1.0 - m00 + m11 - m22).max(0.0).sqrt() * 0.5;
    let z = (1.0 - m00 - m11 + m22).max(0.0).sqrt() * 0.5;

    let x = x.copysign(r[2][1] - r[1][2]);
    let y = y.copysign(r[0][2] - r[2][0]);
    let z = z.copysign(r[1][0] - r[0][1]);

    let q = Quat::from_xyzw(x, y, z, w);
    let length = q.length();
    if length > f32::EPSILON && length.is_finite() {
        q / length
    } else {
        Quat::IDENTITY
    }
}

/// Both halves of [`Transform::from_raw`] as a tuple.
pub fn extract(matrix: &RawMatrix34) -> (Vec3, Quat) {
    (extract_position(matrix), extract_rotation(matrix))
}

/// Rotation block of `matrix` expressed in the left-handed convention.
pub fn rotation_matrix(matrix: &RawMatrix34) -> Mat3 {
    let r = mirrored_rotation(matrix);
    Mat3::from_cols(
        Vec3::new(r[0][0], r[1][0], r[2][0]),
        Vec3::new(r[0][1], r[1][1], r[2][1]),
        Vec3::new(r[0][2], r[1][2], r[2][2]),
    )
}

fn mirrored_rotation(matrix: &RawMatrix34) -> [[f32; 3]; 3] {
    let m = &matrix.m;
    [
        [m[0][0], m[0][1], -m[0][2]],
        [m[1][0], m[1][1], -m[1][2]],
        [-m[2][0], -m[2][1], m[2][2]],
    ]
}

/// Linear velocities mirror like positions.
pub fn convert_vector(v: [f32; 3]) -> Vec3 {
    Vec3::new(v[0], v[1], -v[2])
}

/// Angular velocity is an axial vector, so mirroring Z negates X and Y.
pub fn convert_axial_vector(v: [f32; 3]) -> Vec3 {
    Vec3::new(-v[0], -v[1], v[2])
}
