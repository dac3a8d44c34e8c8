use std::ops::{Mul, MulAssign, Neg};

use serde::{Deserialize, Serialize};

use super::vec3::Vec3;

/// A quaternion representing a rotation in 3D space.
///
/// Stored as (x, y, z, w) where w is the scalar part. Orientations drift
/// off unit length between renormalizations (see [`Quat::integrate`]), so
/// rotation helpers tolerate slightly denormalized input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    /// Identity quaternion (no rotation)
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Creates a quaternion from a rotation axis and angle (in radians)
    #[inline]
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        let axis = axis.normalize();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Creates the shortest-arc rotation taking `from` onto `to`
    pub fn from_rotation_arc(from: Vec3, to: Vec3) -> Self {
        let from = from.normalize();
        let to = to.normalize();
        let dot = from.dot(to);

        if dot > 0.999_999 {
            return Self::IDENTITY;
        }

        if dot < -0.999_999 {
            let (axis, _) = from.tangents();
            return Self::from_axis_angle(axis, std::f32::consts::PI);
        }

        let cross = from.cross(to);
        Self::new(cross.x, cross.y, cross.z, 1.0 + dot).normalize()
    }

    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Returns a unit quaternion, or identity if the input has collapsed
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len > 1e-10 && len.is_finite() {
            let inv = 1.0 / len;
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        } else {
            Self::IDENTITY
        }
    }

    /// First-order renormalization. Cheap and accurate when the length is
    /// already close to one.
    #[inline]
    pub fn normalize_fast(self) -> Self {
        let f = (3.0 - self.length_squared()) * 0.5;
        if f == 0.0 {
            Self::new(0.0, 0.0, 0.0, 0.0)
        } else {
            Self::new(self.x * f, self.y * f, self.z * f, self.w * f)
        }
    }

    /// Returns the conjugate (inverse rotation for unit quaternions)
    #[inline]
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    #[inline]
    pub fn inverse(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq > 1e-10 {
            let inv = 1.0 / len_sq;
            Self::new(-self.x * inv, -self.y * inv, -self.z * inv, self.w * inv)
        } else {
            Self::IDENTITY
        }
    }

    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Rotates a vector by this quaternion
    #[inline]
    pub fn rotate_vec(self, v: Vec3) -> Vec3 {
        let qv = Vec3::new(self.x, self.y, self.z);
        let uv = qv.cross(v);
        let uuv = qv.cross(uv);
        v + (uv * self.w + uuv) * 2.0
    }

    /// Rotates by the conjugate
    #[inline]
    pub fn inverse_rotate_vec(self, v: Vec3) -> Vec3 {
        self.conjugate().rotate_vec(v)
    }

    /// Spherical linear interpolation along the shorter arc
    pub fn slerp(self, other: Self, t: f32) -> Self {
        let mut dot = self.dot(other);
        let other = if dot < 0.0 {
            dot = -dot;
            -other
        } else {
            other
        };

        if dot > 0.9995 {
            return Self::new(
                self.x + t * (other.x - self.x),
                self.y + t * (other.y - self.y),
                self.z + t * (other.z - self.z),
                self.w + t * (other.w - self.w),
            )
            .normalize();
        }

        let theta = dot.clamp(-1.0, 1.0).acos();
        let sin_theta = theta.sin();
        let s0 = ((1.0 - t) * theta).sin() / sin_theta;
        let s1 = (t * theta).sin() / sin_theta;

        Self::new(
            s0 * self.x + s1 * other.x,
            s0 * self.y + s1 * other.y,
            s0 * self.z + s1 * other.z,
            s0 * self.w + s1 * other.w,
        )
    }

    /// Semi-implicit orientation update `q += 0.5 * dt * (w * q)`.
    ///
    /// `angular_factor` masks rotation per world axis. The result is not
    /// renormalized; callers decide how often to do that.
    #[inline]
    pub fn integrate(self, angular_velocity: Vec3, dt: f32, angular_factor: Vec3) -> Self {
        let a = angular_velocity.component_mul(angular_factor);
        let half_dt = dt * 0.5;

        Self::new(
            self.x + half_dt * (a.x * self.w + a.y * self.z - a.z * self.y),
            self.y + half_dt * (a.y * self.w + a.z * self.x - a.x * self.z),
            self.z + half_dt * (a.z * self.w + a.x * self.y - a.y * self.x),
            self.w + half_dt * (-a.x * self.x - a.y * self.y - a.z * self.z),
        )
    }
}

impl Mul for Quat {
    type Output = Self;

    /// Hamilton product; `a * b` applies `b` first
    #[inline]
    fn mul(self, other: Self) -> Self {
        Self::new(
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
        )
    }
}

impl Mul<Vec3> for Quat {
    type Output = Vec3;

    #[inline]
    fn mul(self, v: Vec3) -> Vec3 {
        self.rotate_vec(v)
    }
}

impl MulAssign for Quat {
    #[inline]
    fn mul_assign(&mut self, other: Self) {
        *self = *self * other;
    }
}

impl Neg for Quat {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn same_rotation(a: Quat, b: Quat) -> bool {
        a.normalize().dot(b.normalize()).abs() > 1.0 - 1e-4
    }

    fn vec_close(a: Vec3, b: Vec3) -> bool {
        a.almost_equals(b, 1e-5)
    }

    #[test]
    fn test_axis_angle() {
        let q = Quat::from_axis_angle(Vec3::Z, FRAC_PI_2);
        assert!(vec_close(q * Vec3::X, Vec3::Y));
    }

    #[test]
    fn test_plane_orientation_for_y_up() {
        // Rotating local +Z onto world +Y
        let q = Quat::from_axis_angle(Vec3::X, -FRAC_PI_2);
        assert!(vec_close(q * Vec3::Z, Vec3::Y));
    }

    #[test]
    fn test_inverse_rotation() {
        let q = Quat::from_axis_angle(Vec3::new(1.0, 1.0, 1.0), PI / 3.0);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert!(vec_close(q.inverse_rotate_vec(q * v), v));
        assert!(vec_close(q.inverse() * (q * v), v));
    }

    #[test]
    fn test_rotation_arc() {
        let from = Vec3::new(1.0, 1.0, 1.0);
        let q = Quat::from_rotation_arc(from, -Vec3::X);
        assert!(vec_close(q * from.normalize(), -Vec3::X));

        let flip = Quat::from_rotation_arc(Vec3::Y, -Vec3::Y);
        assert!(vec_close(flip * Vec3::Y, -Vec3::Y));
    }

    #[test]
    fn test_slerp_midpoint() {
        let q2 = Quat::from_axis_angle(Vec3::Z, FRAC_PI_2);
        let mid = Quat::IDENTITY.slerp(q2, 0.5);
        assert!(same_rotation(mid, Quat::from_axis_angle(Vec3::Z, PI / 4.0)));
    }

    #[test]
    fn test_integrate_small_steps_tracks_exact_rotation() {
        let omega = Vec3::new(0.0, 0.0, PI);
        let dt = 1.0 / 600.0;
        let mut q = Quat::IDENTITY;
        for _ in 0..300 {
            q = q.integrate(omega, dt, Vec3::ONE).normalize();
        }
        // Half a second at PI rad/s
        assert!(same_rotation(q, Quat::from_axis_angle(Vec3::Z, FRAC_PI_2)));
    }

    #[test]
    fn test_integrate_respects_angular_factor() {
        let q = Quat::IDENTITY.integrate(Vec3::new(1.0, 2.0, 3.0), 0.1, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(q.x, 0.0);
        assert_eq!(q.y, 0.0);
        assert!(q.z > 0.0);
    }

    #[test]
    fn test_normalize_fast_close_to_unit() {
        let q = Quat::new(0.0, 0.0, 0.01, 1.0);
        assert_abs_diff_eq!(q.normalize_fast().length(), 1.0, epsilon = 1e-3);
    }
}
