//! Broadphase strategies: cheap culling of body pairs before narrowphase

mod bvh;
mod naive;

pub use bvh::BvhBroadphase;
pub use naive::{NaiveBroadphase, NaiveMode};

use crate::dynamics::Body;
use crate::geometry::Aabb;

/// Produces candidate body pairs for the narrowphase.
///
/// Pairs are body indices into the world's body slice, lower index first.
pub trait BroadPhase: std::fmt::Debug {
    /// Appends every candidate pair of this step to `pairs`
    fn collision_pairs(&mut self, bodies: &mut [Body], pairs: &mut Vec<(usize, usize)>);

    /// Appends the index of every body whose bounds overlap `aabb`
    fn aabb_query(&mut self, bodies: &mut [Body], aabb: Aabb, result: &mut Vec<usize>);

    /// Called after a body was removed so cached state can be dropped
    fn body_removed(&mut self, _body: &Body) {}
}

/// Filter shared by every strategy: collision groups must accept each
/// other, and at least one body must be able to move.
///
/// Kinematic bodies count as movable so they can push sleeping bodies.
pub fn need_broadphase_collision(a: &Body, b: &Body) -> bool {
    if a.collision_filter_group & b.collision_filter_mask == 0
        || b.collision_filter_group & a.collision_filter_mask == 0
    {
        return false;
    }
    let inert = |body: &Body| body.is_static() || body.is_sleeping();
    !(inert(a) && inert(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;

    #[test]
    fn test_static_pairs_are_skipped() {
        let a = Body::fixed();
        let b = Body::fixed();
        assert!(!need_broadphase_collision(&a, &b));

        let ball = Body::new(1.0).with_shape(Shape::sphere(1.0).unwrap());
        assert!(need_broadphase_collision(&a, &ball));

        let mut sleeping = ball.clone();
        sleeping.sleep();
        assert!(!need_broadphase_collision(&a, &sleeping));
        assert!(need_broadphase_collision(&Body::kinematic(), &sleeping));
    }

    #[test]
    fn test_group_masks() {
        let a = Body::new(1.0).with_collision_filter(0b01, 0b10);
        let b = Body::new(1.0).with_collision_filter(0b10, 0b01);
        let c = Body::new(1.0).with_collision_filter(0b10, 0b10);
        assert!(need_broadphase_collision(&a, &b));
        assert!(!need_broadphase_collision(&a, &c));
    }
}
