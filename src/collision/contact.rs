use smallvec::SmallVec;

use crate::math::Vec3;

/// A single contact point between two shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Contact point on shape A in world space
    pub point_a: Vec3,
    /// Contact point on shape B in world space
    pub point_b: Vec3,
    /// Unit contact normal, pointing from A towards B
    pub normal: Vec3,
}

impl ContactPoint {
    pub fn new(point_a: Vec3, point_b: Vec3, normal: Vec3) -> Self {
        Self {
            point_a,
            point_b,
            normal,
        }
    }

    /// Penetration depth (positive when overlapping)
    pub fn depth(&self) -> f32 {
        -self.normal.dot(self.point_b - self.point_a)
    }

    /// The same contact seen from B
    pub fn flipped(self) -> Self {
        Self {
            point_a: self.point_b,
            point_b: self.point_a,
            normal: -self.normal,
        }
    }
}

/// Collects the contact points produced for one shape pair.
///
/// In test-only mode the collision routines stop at the first hit and
/// record nothing, which is all triggers and non-responding shapes need.
#[derive(Debug, Default)]
pub struct ContactSink {
    just_test: bool,
    points: SmallVec<[ContactPoint; 8]>,
}

impl ContactSink {
    pub fn new(just_test: bool) -> Self {
        Self {
            just_test,
            points: SmallVec::new(),
        }
    }

    #[inline]
    pub fn just_test(&self) -> bool {
        self.just_test
    }

    pub fn reset(&mut self, just_test: bool) {
        self.just_test = just_test;
        self.points.clear();
    }

    #[inline]
    pub fn push(&mut self, point_a: Vec3, point_b: Vec3, normal: Vec3) {
        self.points.push(ContactPoint::new(point_a, point_b, normal));
    }

    #[inline]
    pub fn points(&self) -> &[ContactPoint] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Swaps the roles of A and B for every point recorded since `start`
    pub(crate) fn flip_from(&mut self, start: usize) {
        for point in &mut self.points[start..] {
            *point = point.flipped();
        }
    }
}
