use serde::{Deserialize, Serialize};

use crate::dynamics::{Body, BodyId};
use crate::math::Vec3;
use crate::world::{Subsystem, World};

/// A damped Hooke spring between two anchor points.
///
/// Springs act through forces rather than solver equations, so they run as
/// a [`Subsystem`] before collision detection each step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Anchor on body A, in its local frame
    pub local_anchor_a: Vec3,
    /// Anchor on body B, in its local frame
    pub local_anchor_b: Vec3,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

impl Spring {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: Vec3::ZERO,
            local_anchor_b: Vec3::ZERO,
            rest_length: 1.0,
            stiffness: 100.0,
            damping: 1.0,
        }
    }

    pub fn with_anchors(mut self, local_a: Vec3, local_b: Vec3) -> Self {
        self.local_anchor_a = local_a;
        self.local_anchor_b = local_b;
        self
    }

    pub fn with_rest_length(mut self, rest_length: f32) -> Self {
        self.rest_length = rest_length;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    /// Adds the spring force to both bodies' accumulators
    pub fn apply_force(&self, a: &mut Body, b: &mut Body) {
        let ri = a.vector_to_world_frame(self.local_anchor_a);
        let rj = b.vector_to_world_frame(self.local_anchor_b);
        let r = b.position() + rj - a.position() - ri;
        let length = r.length();
        let Some(direction) = r.try_normalize() else {
            return;
        };

        let relative_velocity =
            b.velocity - a.velocity + b.angular_velocity.cross(rj) - a.angular_velocity.cross(ri);
        let magnitude = -self.stiffness * (length - self.rest_length) - self.damping * relative_velocity.dot(direction);
        let f = direction * magnitude;

        a.force -= f;
        b.force += f;
        a.torque -= ri.cross(f);
        b.torque += rj.cross(f);
    }
}

impl Subsystem for Spring {
    fn update(&mut self, world: &mut World, _dt: f32) {
        if let Some((a, b)) = world.bodies_pair_mut(self.body_a, self.body_b) {
            self.apply_force(a, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;
    use approx::assert_abs_diff_eq;

    fn ball(x: f32) -> Body {
        Body::new(1.0)
            .with_shape(Shape::sphere(0.1).unwrap())
            .with_position(Vec3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_stretched_spring_pulls_together() {
        let spring = Spring::new(BodyId(0), BodyId(1))
            .with_rest_length(1.0)
            .with_stiffness(10.0)
            .with_damping(0.0);
        let (mut a, mut b) = (ball(0.0), ball(3.0));
        spring.apply_force(&mut a, &mut b);

        assert_abs_diff_eq!(a.force.x, 20.0, epsilon = 1e-5);
        assert_abs_diff_eq!(b.force.x, -20.0, epsilon = 1e-5);
        assert_eq!(a.torque, Vec3::ZERO);
    }

    #[test]
    fn test_damping_resists_separation() {
        let spring = Spring::new(BodyId(0), BodyId(1))
            .with_rest_length(2.0)
            .with_stiffness(0.0)
            .with_damping(2.0);
        let (mut a, mut b) = (ball(0.0), ball(2.0));
        b.velocity = Vec3::new(1.5, 0.0, 0.0);
        spring.apply_force(&mut a, &mut b);

        assert_abs_diff_eq!(b.force.x, -3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_offset_anchor_adds_torque() {
        let spring = Spring::new(BodyId(0), BodyId(1))
            .with_anchors(Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.0, 0.5, 0.0))
            .with_rest_length(0.0)
            .with_damping(0.0);
        let (mut a, mut b) = (ball(0.0), ball(2.0));
        spring.apply_force(&mut a, &mut b);

        assert!(a.torque.z < 0.0);
        assert!(b.torque.z > 0.0);
    }

    #[test]
    fn test_coincident_anchors_do_nothing() {
        let spring = Spring::new(BodyId(0), BodyId(1)).with_rest_length(1.0);
        let (mut a, mut b) = (ball(1.0), ball(1.0));
        spring.apply_force(&mut a, &mut b);
        assert_eq!(a.force, Vec3::ZERO);
    }
}
