use serde::{Deserialize, Serialize};

use crate::math::{Transform, Vec3};

/// An axis-aligned bounding box defined by minimum and maximum points.
///
/// Bodies cache one in world space; trimeshes and the tree broad-phase
/// store them per node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner (smallest x, y, z values)
    pub min: Vec3,
    /// Maximum corner (largest x, y, z values)
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// An empty AABB that contains no points
    pub const EMPTY: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Creates the tightest box around a set of points
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |aabb, p| aabb.expand_to_include(p))
    }

    #[inline]
    pub fn center(self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Surface area, used as the tree insertion cost
    #[inline]
    pub fn surface_area(self) -> f32 {
        let size = self.max - self.min;
        2.0 * (size.x * size.y + size.y * size.z + size.z * size.x)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn contains_aabb(self, other: Self) -> bool {
        self.min.x <= other.min.x
            && self.max.x >= other.max.x
            && self.min.y <= other.min.y
            && self.max.y >= other.max.y
            && self.min.z <= other.min.z
            && self.max.z >= other.max.z
    }

    /// Closed-interval overlap test; touching boxes overlap
    #[inline]
    pub fn overlaps(self, other: Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn expand_to_include(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Grows the box by a margin in all directions
    #[inline]
    pub fn expand(self, margin: f32) -> Self {
        let m = Vec3::splat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    pub fn corners(self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// World box enclosing this local box after `frame` is applied
    pub fn transformed(self, frame: Transform) -> Self {
        Self::from_points(self.corners().into_iter().map(|c| frame.point_to_world(c)))
    }

    /// Slab test for the segment `from -> to`. Returns the entry fraction in
    /// `[0, 1]` when the segment touches the box.
    pub fn segment_intersection(self, from: Vec3, to: Vec3) -> Option<f32> {
        let dir = to - from;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for axis in 0..3 {
            if dir[axis].abs() < 1e-12 {
                if from[axis] < self.min[axis] || from[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir[axis];
            let mut t1 = (self.min[axis] - from[axis]) * inv;
            let mut t2 = (self.max[axis] - from[axis]) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn test_overlaps_touching() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let c = Aabb::new(Vec3::new(1.1, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(a.overlaps(b));
        assert!(!a.overlaps(c));
    }

    #[test]
    fn test_from_points_and_union() {
        let a = Aabb::from_points([Vec3::new(1.0, -1.0, 0.0), Vec3::new(-2.0, 3.0, 1.0)]);
        assert_eq!(a.min, Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(a.max, Vec3::new(1.0, 3.0, 1.0));
        assert!(Aabb::EMPTY.is_empty());
        assert_eq!(Aabb::EMPTY.union(a), a);
    }

    #[test]
    fn test_transformed_rotated_box_grows() {
        let local = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        let frame = Transform::new(Vec3::new(5.0, 0.0, 0.0), Quat::from_axis_angle(Vec3::Z, FRAC_PI_4));
        let world = local.transformed(frame);
        let expected = 2.0f32.sqrt();
        assert!((world.max.x - (5.0 + expected)).abs() < 1e-5);
        assert!((world.max.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_segment_intersection() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let t = aabb.segment_intersection(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(3.0, 0.5, 0.5));
        assert!((t.unwrap_or(f32::NAN) - 0.25).abs() < 1e-6);
        assert!(aabb
            .segment_intersection(Vec3::new(-1.0, 2.0, 0.5), Vec3::new(3.0, 2.0, 0.5))
            .is_none());
        // Segment ends before reaching the box
        assert!(aabb
            .segment_intersection(Vec3::new(-3.0, 0.5, 0.5), Vec3::new(-1.0, 0.5, 0.5))
            .is_none());
    }
}
