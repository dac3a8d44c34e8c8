use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

use super::quat::Quat;
use super::vec3::Vec3;

/// A 3x3 matrix stored in column-major order.
///
/// Holds rotation matrices and world-space inverse inertia tensors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Mat3 {
    /// Columns of the matrix
    pub cols: [Vec3; 3],
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat3 {
    pub const ZERO: Self = Self {
        cols: [Vec3::ZERO, Vec3::ZERO, Vec3::ZERO],
    };

    pub const IDENTITY: Self = Self {
        cols: [Vec3::X, Vec3::Y, Vec3::Z],
    };

    #[inline]
    pub const fn from_cols(c0: Vec3, c1: Vec3, c2: Vec3) -> Self {
        Self { cols: [c0, c1, c2] }
    }

    #[inline]
    pub fn from_diagonal(diag: Vec3) -> Self {
        Self::from_cols(
            Vec3::new(diag.x, 0.0, 0.0),
            Vec3::new(0.0, diag.y, 0.0),
            Vec3::new(0.0, 0.0, diag.z),
        )
    }

    /// Rotation matrix of a (possibly slightly denormalized) quaternion
    pub fn from_quat(q: Quat) -> Self {
        let x2 = q.x + q.x;
        let y2 = q.y + q.y;
        let z2 = q.z + q.z;

        let xx = q.x * x2;
        let xy = q.x * y2;
        let xz = q.x * z2;
        let yy = q.y * y2;
        let yz = q.y * z2;
        let zz = q.z * z2;
        let wx = q.w * x2;
        let wy = q.w * y2;
        let wz = q.w * z2;

        Self::from_cols(
            Vec3::new(1.0 - (yy + zz), xy + wz, xz - wy),
            Vec3::new(xy - wz, 1.0 - (xx + zz), yz + wx),
            Vec3::new(xz + wy, yz - wx, 1.0 - (xx + yy)),
        )
    }

    /// `R * diag(d) * R^T`: a body-frame diagonal tensor expressed in world
    /// space for orientation `q`.
    pub fn rotated_diagonal(q: Quat, diagonal: Vec3) -> Self {
        let r = Self::from_quat(q);
        let scaled = Self::from_cols(
            r.cols[0] * diagonal.x,
            r.cols[1] * diagonal.y,
            r.cols[2] * diagonal.z,
        );
        scaled * r.transpose()
    }

    #[inline]
    pub fn transpose(self) -> Self {
        let [c0, c1, c2] = self.cols;
        Self::from_cols(
            Vec3::new(c0.x, c1.x, c2.x),
            Vec3::new(c0.y, c1.y, c2.y),
            Vec3::new(c0.z, c1.z, c2.z),
        )
    }

    #[inline]
    pub fn transform_vec(self, v: Vec3) -> Vec3 {
        self.cols[0] * v.x + self.cols[1] * v.y + self.cols[2] * v.z
    }

    #[inline]
    pub fn diagonal(self) -> Vec3 {
        Vec3::new(self.cols[0].x, self.cols[1].y, self.cols[2].z)
    }

    pub fn approx_eq(self, other: Self, epsilon: f32) -> bool {
        self.cols
            .iter()
            .zip(other.cols.iter())
            .all(|(a, b)| a.almost_equals(*b, epsilon))
    }
}

impl Add for Mat3 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::from_cols(
            self.cols[0] + other.cols[0],
            self.cols[1] + other.cols[1],
            self.cols[2] + other.cols[2],
        )
    }
}

impl Mul for Mat3 {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        Self::from_cols(
            self.transform_vec(other.cols[0]),
            self.transform_vec(other.cols[1]),
            self.transform_vec(other.cols[2]),
        )
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;

    #[inline]
    fn mul(self, v: Vec3) -> Vec3 {
        self.transform_vec(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_from_quat_matches_quat_rotation() {
        let q = Quat::from_axis_angle(Vec3::new(0.3, -1.0, 0.5), 1.1);
        let v = Vec3::new(1.0, -2.0, 0.5);
        assert!((Mat3::from_quat(q) * v).almost_equals(q * v, 1e-5));
    }

    #[test]
    fn test_rotated_diagonal_swaps_axes() {
        // 90 degrees about Z swaps the X and Y entries
        let q = Quat::from_axis_angle(Vec3::Z, FRAC_PI_2);
        let world = Mat3::rotated_diagonal(q, Vec3::new(1.0, 2.0, 3.0));
        assert!(world.approx_eq(Mat3::from_diagonal(Vec3::new(2.0, 1.0, 3.0)), 1e-5));
    }

    #[test]
    fn test_rotated_uniform_diagonal_is_unchanged() {
        let q = Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7);
        let world = Mat3::rotated_diagonal(q, Vec3::splat(0.4));
        assert!(world.approx_eq(Mat3::from_diagonal(Vec3::splat(0.4)), 1e-5));
    }

    #[test]
    fn test_transpose_of_rotation_is_inverse() {
        let r = Mat3::from_quat(Quat::from_axis_angle(Vec3::X, 0.4));
        assert!((r * r.transpose()).approx_eq(Mat3::IDENTITY, 1e-5));
    }
}
