use crate::dynamics::Body;
use crate::math::Vec3;

/// Default force bound of contact and constraint rows
pub const DEFAULT_MAX_FORCE: f32 = 1e6;

/// One body's half of a Jacobian row
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JacobianElement {
    pub spatial: Vec3,
    pub rotational: Vec3,
}

impl JacobianElement {
    #[inline]
    pub fn new(spatial: Vec3, rotational: Vec3) -> Self {
        Self { spatial, rotational }
    }

    #[inline]
    pub fn multiply_vectors(&self, spatial: Vec3, rotational: Vec3) -> f32 {
        self.spatial.dot(spatial) + self.rotational.dot(rotational)
    }
}

/// SPOOK stabilization terms derived from stiffness, relaxation and step size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpookParams {
    pub a: f32,
    pub b: f32,
    pub eps: f32,
}

impl SpookParams {
    pub fn new(stiffness: f32, relaxation: f32, dt: f32) -> Self {
        let d = 1.0 + 4.0 * relaxation;
        Self {
            a: 4.0 / (dt * d),
            b: 4.0 * relaxation / d,
            eps: 4.0 / (dt * dt * stiffness * d),
        }
    }
}

/// Non-penetration row along `ni`, also used for bilateral joint rows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEquation {
    /// Contact point relative to body i's center, in world orientation
    pub ri: Vec3,
    /// Contact point relative to body j's center, in world orientation
    pub rj: Vec3,
    /// Unit normal pointing from body i towards body j
    pub ni: Vec3,
    pub restitution: f32,
    /// Shape indices within each body; zero for joint rows
    pub shape_i: usize,
    pub shape_j: usize,
}

impl ContactEquation {
    pub fn new(ri: Vec3, rj: Vec3, ni: Vec3) -> Self {
        Self {
            ri,
            rj,
            ni,
            restitution: 0.0,
            shape_i: 0,
            shape_j: 0,
        }
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_shapes(mut self, shape_i: usize, shape_j: usize) -> Self {
        self.shape_i = shape_i;
        self.shape_j = shape_j;
        self
    }
}

/// Tangential row resisting sliding along `t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionEquation {
    pub ri: Vec3,
    pub rj: Vec3,
    pub t: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EquationKind {
    Contact(ContactEquation),
    Friction(FrictionEquation),
}

/// A scalar velocity constraint between two bodies, solved by the
/// Gauss-Seidel solver.
///
/// Bodies are referenced by their index in the world's body list for the
/// step the equation was built in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equation {
    pub body_i: usize,
    pub body_j: usize,
    pub min_force: f32,
    pub max_force: f32,
    pub spook: SpookParams,
    pub enabled: bool,
    /// Force applied by the last solve
    pub multiplier: f32,
    pub kind: EquationKind,
    jacobian_a: JacobianElement,
    jacobian_b: JacobianElement,
}

impl Equation {
    /// A unilateral contact row: pushes only, bounded by `[0, 1e6]`
    pub fn contact(body_i: usize, body_j: usize, contact: ContactEquation, spook: SpookParams) -> Self {
        let mut equation = Self::bilateral(body_i, body_j, contact, DEFAULT_MAX_FORCE, spook);
        equation.min_force = 0.0;
        equation
    }

    /// A contact-style row that may pull as well as push
    pub fn bilateral(
        body_i: usize,
        body_j: usize,
        contact: ContactEquation,
        max_force: f32,
        spook: SpookParams,
    ) -> Self {
        let n = contact.ni;
        Self {
            body_i,
            body_j,
            min_force: -max_force,
            max_force,
            spook,
            enabled: true,
            multiplier: 0.0,
            kind: EquationKind::Contact(contact),
            jacobian_a: JacobianElement::new(-n, -contact.ri.cross(n)),
            jacobian_b: JacobianElement::new(n, contact.rj.cross(n)),
        }
    }

    /// A friction row whose force stays within `[-slip_force, slip_force]`
    pub fn friction(body_i: usize, body_j: usize, friction: FrictionEquation, slip_force: f32, spook: SpookParams) -> Self {
        let t = friction.t;
        Self {
            body_i,
            body_j,
            min_force: -slip_force,
            max_force: slip_force,
            spook,
            enabled: true,
            multiplier: 0.0,
            kind: EquationKind::Friction(friction),
            jacobian_a: JacobianElement::new(-t, -friction.ri.cross(t)),
            jacobian_b: JacobianElement::new(t, friction.rj.cross(t)),
        }
    }

    #[inline]
    pub fn jacobian(&self) -> (JacobianElement, JacobianElement) {
        (self.jacobian_a, self.jacobian_b)
    }

    /// The contact data, if this is a contact or joint row
    pub fn as_contact(&self) -> Option<&ContactEquation> {
        match &self.kind {
            EquationKind::Contact(c) => Some(c),
            EquationKind::Friction(_) => None,
        }
    }

    /// Constraint violation. For contacts this is the signed gap along the
    /// normal, negative while penetrating.
    pub fn compute_gq(&self, bodies: &[Body]) -> f32 {
        match &self.kind {
            EquationKind::Contact(c) => {
                let (bi, bj) = (&bodies[self.body_i], &bodies[self.body_j]);
                c.ni.dot(bj.position + c.rj - bi.position - c.ri)
            }
            EquationKind::Friction(_) => 0.0,
        }
    }

    /// Constraint velocity `G W`
    pub fn compute_gw(&self, bodies: &[Body]) -> f32 {
        let (bi, bj) = (&bodies[self.body_i], &bodies[self.body_j]);
        self.jacobian_a.multiply_vectors(bi.velocity, bi.angular_velocity)
            + self.jacobian_b.multiply_vectors(bj.velocity, bj.angular_velocity)
    }

    /// Constraint velocity of the solver's accumulated corrections
    pub fn compute_gw_lambda(&self, bodies: &[Body]) -> f32 {
        let (bi, bj) = (&bodies[self.body_i], &bodies[self.body_j]);
        self.jacobian_a.multiply_vectors(bi.vlambda, bi.wlambda)
            + self.jacobian_b.multiply_vectors(bj.vlambda, bj.wlambda)
    }

    /// `G M^-1 f` for the external forces currently on both bodies
    pub fn compute_gimf(&self, bodies: &[Body]) -> f32 {
        let (bi, bj) = (&bodies[self.body_i], &bodies[self.body_j]);
        let ai = bi.inv_inertia_world_solve * bi.torque;
        let aj = bj.inv_inertia_world_solve * bj.torque;
        self.jacobian_a.multiply_vectors(bi.force * bi.inv_mass_solve, ai)
            + self.jacobian_b.multiply_vectors(bj.force * bj.inv_mass_solve, aj)
    }

    /// Effective inverse mass `G M^-1 G^T`
    pub fn compute_gimgt(&self, bodies: &[Body]) -> f32 {
        let (bi, bj) = (&bodies[self.body_i], &bodies[self.body_j]);
        let ra = self.jacobian_a.rotational;
        let rb = self.jacobian_b.rotational;
        bi.inv_mass_solve
            + bj.inv_mass_solve
            + ra.dot(bi.inv_inertia_world_solve * ra)
            + rb.dot(bj.inv_inertia_world_solve * rb)
    }

    /// Right-hand side of the SPOOK system
    pub fn compute_b(&self, bodies: &[Body], h: f32) -> f32 {
        let SpookParams { a, b, .. } = self.spook;
        let gimf = self.compute_gimf(bodies);
        match &self.kind {
            EquationKind::Contact(c) => {
                let (bi, bj) = (&bodies[self.body_i], &bodies[self.body_j]);
                let e1 = 1.0 + c.restitution;
                let gw = e1 * bj.velocity.dot(c.ni) - e1 * bi.velocity.dot(c.ni)
                    + bj.angular_velocity.dot(self.jacobian_b.rotational)
                    + bi.angular_velocity.dot(self.jacobian_a.rotational);
                -self.compute_gq(bodies) * a - gw * b - h * gimf
            }
            EquationKind::Friction(_) => -self.compute_gw(bodies) * b - h * gimf,
        }
    }

    #[inline]
    pub fn compute_c(&self, bodies: &[Body]) -> f32 {
        self.compute_gimgt(bodies) + self.spook.eps
    }

    /// Applies a change of `delta` in the row's accumulated impulse to the
    /// bodies' correction velocities.
    pub fn add_to_wlambda(&self, bodies: &mut [Body], delta: f32) {
        let bi = &mut bodies[self.body_i];
        bi.vlambda += self.jacobian_a.spatial * (bi.inv_mass_solve * delta);
        bi.wlambda += bi.inv_inertia_world_solve * self.jacobian_a.rotational * delta;

        let bj = &mut bodies[self.body_j];
        bj.vlambda += self.jacobian_b.spatial * (bj.inv_mass_solve * delta);
        bj.wlambda += bj.inv_inertia_world_solve * self.jacobian_b.rotational * delta;
    }

    /// Relative velocity of the contact points along the normal, positive
    /// when body i approaches body j.
    pub fn impact_velocity(&self, bodies: &[Body]) -> f32 {
        match &self.kind {
            EquationKind::Contact(c) => {
                let (bi, bj) = (&bodies[self.body_i], &bodies[self.body_j]);
                let vi = bi.velocity_at_world_point(bi.position + c.ri);
                let vj = bj.velocity_at_world_point(bj.position + c.rj);
                c.ni.dot(vi - vj)
            }
            EquationKind::Friction(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;
    use approx::assert_abs_diff_eq;

    fn pair() -> Vec<Body> {
        let mut a = Body::new(1.0).with_shape(Shape::sphere(1.0).unwrap());
        let mut b = Body::new(1.0)
            .with_shape(Shape::sphere(1.0).unwrap())
            .with_position(Vec3::new(1.8, 0.0, 0.0));
        a.update_solve_mass_properties();
        b.update_solve_mass_properties();
        vec![a, b]
    }

    fn touching() -> Equation {
        let n = Vec3::X;
        let contact = ContactEquation::new(n, -n, n);
        Equation::contact(0, 1, contact, SpookParams::new(1e7, 3.0, 1.0 / 60.0))
    }

    #[test]
    fn test_spook_params() {
        let p = SpookParams::new(1e7, 3.0, 0.1);
        assert_abs_diff_eq!(p.a, 4.0 / (0.1 * 13.0), epsilon = 1e-4);
        assert_abs_diff_eq!(p.b, 12.0 / 13.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.eps, 4.0 / (0.01 * 1e7 * 13.0), epsilon = 1e-9);
    }

    #[test]
    fn test_gap_is_negative_when_penetrating() {
        let bodies = pair();
        let eq = touching();
        assert_abs_diff_eq!(eq.compute_gq(&bodies), -0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_effective_mass_through_centers() {
        let bodies = pair();
        let eq = touching();
        // Arms are parallel to the normal, so rotation does not contribute
        assert_abs_diff_eq!(eq.compute_gimgt(&bodies), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_b_pushes_apart() {
        let mut bodies = pair();
        bodies[0].velocity = Vec3::new(1.0, 0.0, 0.0);
        let eq = touching();
        assert!(eq.compute_b(&bodies, 1.0 / 60.0) > 0.0);
        assert_abs_diff_eq!(eq.impact_velocity(&bodies), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_add_to_wlambda_is_equal_and_opposite() {
        let mut bodies = pair();
        let eq = touching();
        eq.add_to_wlambda(&mut bodies, 0.5);
        assert_eq!(bodies[0].vlambda, Vec3::new(-0.5, 0.0, 0.0));
        assert_eq!(bodies[1].vlambda, Vec3::new(0.5, 0.0, 0.0));
        assert!(bodies[0].wlambda.almost_zero(1e-7));
        assert_abs_diff_eq!(eq.compute_gw_lambda(&bodies), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_friction_row_bounds() {
        let eq = Equation::friction(
            0,
            1,
            FrictionEquation {
                ri: Vec3::ZERO,
                rj: Vec3::ZERO,
                t: Vec3::Z,
            },
            2.5,
            SpookParams::new(1e7, 3.0, 1.0 / 60.0),
        );
        assert_eq!((eq.min_force, eq.max_force), (-2.5, 2.5));
        assert!(eq.as_contact().is_none());
    }
}
