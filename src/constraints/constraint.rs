use serde::{Deserialize, Serialize};

use crate::dynamics::{Body, BodyId};
use crate::math::Vec3;

use super::equation::{ContactEquation, Equation, SpookParams, DEFAULT_MAX_FORCE};

/// Stable identifier of a constraint inside a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintKind {
    /// Pins a point fixed in body A to a point fixed in body B
    PointToPoint { pivot_a: Vec3, pivot_b: Vec3 },
    /// Keeps the body centers `distance` apart
    Distance { distance: f32 },
}

/// A joint between two bodies, expressed as bilateral equations rebuilt
/// every step.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub(crate) id: Option<ConstraintId>,
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub kind: ConstraintKind,
    /// Whether the connected bodies still collide with each other
    pub collide_connected: bool,
    pub max_force: f32,
    pub stiffness: f32,
    pub relaxation: f32,
    enabled: bool,
    multipliers: Vec<f32>,
}

impl Constraint {
    fn new(body_a: BodyId, body_b: BodyId, kind: ConstraintKind) -> Self {
        Self {
            id: None,
            body_a,
            body_b,
            kind,
            collide_connected: true,
            max_force: DEFAULT_MAX_FORCE,
            stiffness: 1e7,
            relaxation: 4.0,
            enabled: true,
            multipliers: Vec::new(),
        }
    }

    /// Pivots are given in each body's local frame
    pub fn point_to_point(body_a: BodyId, pivot_a: Vec3, body_b: BodyId, pivot_b: Vec3) -> Self {
        Self::new(body_a, body_b, ConstraintKind::PointToPoint { pivot_a, pivot_b })
    }

    pub fn distance(body_a: BodyId, body_b: BodyId, distance: f32) -> Self {
        Self::new(body_a, body_b, ConstraintKind::Distance { distance })
    }

    pub fn with_max_force(mut self, max_force: f32) -> Self {
        self.max_force = max_force;
        self
    }

    pub fn with_collide_connected(mut self, collide_connected: bool) -> Self {
        self.collide_connected = collide_connected;
        self
    }

    pub fn with_spook(mut self, stiffness: f32, relaxation: f32) -> Self {
        self.stiffness = stiffness;
        self.relaxation = relaxation;
        self
    }

    #[inline]
    pub fn id(&self) -> Option<ConstraintId> {
        self.id
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// True if the constraint connects `a` and `b` in either order
    pub fn connects(&self, a: BodyId, b: BodyId) -> bool {
        (self.body_a == a && self.body_b == b) || (self.body_a == b && self.body_b == a)
    }

    #[inline]
    pub fn involves(&self, body: BodyId) -> bool {
        self.body_a == body || self.body_b == body
    }

    /// Forces applied by each equation in the last step
    pub fn multipliers(&self) -> &[f32] {
        &self.multipliers
    }

    pub(crate) fn set_multipliers(&mut self, multipliers: impl Iterator<Item = f32>) {
        self.multipliers.clear();
        self.multipliers.extend(multipliers);
    }

    /// Appends this constraint's equations for the bodies at indices `i`
    /// and `j`, linearized around their current poses.
    pub fn build_equations(&self, i: usize, j: usize, bodies: &[Body], dt: f32, out: &mut Vec<Equation>) {
        let spook = SpookParams::new(self.stiffness, self.relaxation, dt);
        let (a, b) = (&bodies[i], &bodies[j]);
        match self.kind {
            ConstraintKind::PointToPoint { pivot_a, pivot_b } => {
                let ri = a.vector_to_world_frame(pivot_a);
                let rj = b.vector_to_world_frame(pivot_b);
                for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
                    let row = ContactEquation::new(ri, rj, axis);
                    out.push(Equation::bilateral(i, j, row, self.max_force, spook));
                }
            }
            ConstraintKind::Distance { distance } => {
                let n = (b.position() - a.position()).try_normalize().unwrap_or(Vec3::X);
                let half = 0.5 * distance;
                let row = ContactEquation::new(n * half, n * -half, n);
                out.push(Equation::bilateral(i, j, row, self.max_force, spook));
            }
        }
    }

    /// Number of equations `build_equations` appends
    pub fn equation_count(&self) -> usize {
        match self.kind {
            ConstraintKind::PointToPoint { .. } => 3,
            ConstraintKind::Distance { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;
    use approx::assert_abs_diff_eq;

    fn bodies() -> Vec<Body> {
        vec![
            Body::new(1.0).with_shape(Shape::sphere(0.5).unwrap()),
            Body::new(1.0)
                .with_shape(Shape::sphere(0.5).unwrap())
                .with_position(Vec3::new(3.0, 0.0, 0.0)),
        ]
    }

    #[test]
    fn test_distance_gap() {
        let c = Constraint::distance(BodyId(0), BodyId(1), 2.0);
        let mut out = Vec::new();
        c.build_equations(0, 1, &bodies(), 1.0 / 60.0, &mut out);
        assert_eq!(out.len(), c.equation_count());
        // Centers are one unit further apart than required
        assert_abs_diff_eq!(out[0].compute_gq(&bodies()), 1.0, epsilon = 1e-6);
        assert_eq!(out[0].min_force, -DEFAULT_MAX_FORCE);
    }

    #[test]
    fn test_point_to_point_rows() {
        let c = Constraint::point_to_point(BodyId(0), Vec3::new(1.5, 0.0, 0.0), BodyId(1), Vec3::new(-1.5, 0.0, 0.0))
            .with_max_force(50.0);
        let mut out = Vec::new();
        c.build_equations(0, 1, &bodies(), 1.0 / 60.0, &mut out);
        assert_eq!(out.len(), 3);
        for eq in &out {
            assert_abs_diff_eq!(eq.compute_gq(&bodies()), 0.0, epsilon = 1e-6);
            assert_eq!(eq.max_force, 50.0);
        }
    }

    #[test]
    fn test_connects_either_order() {
        let c = Constraint::distance(BodyId(4), BodyId(7), 1.0);
        assert!(c.connects(BodyId(7), BodyId(4)));
        assert!(!c.connects(BodyId(7), BodyId(5)));
        assert!(c.involves(BodyId(4)));
    }
}
