//! Exact contact generation for candidate body pairs.
//!
//! [`collide`] dispatches on the pair of shape kinds. Handlers are written
//! for one canonical order; the other order runs the same handler with the
//! arguments swapped and flips the resulting points. Pairs without a
//! handler, such as plane/plane or trimesh/trimesh, never touch.

mod convex;
mod particle;
mod plane;
mod sphere;
mod terrain;

use std::collections::HashMap;

use crate::constraints::{ContactEquation, Equation, FrictionEquation, SpookParams};
use crate::dynamics::{Body, BodyId, ContactMaterial, MaterialTable};
use crate::geometry::{Shape, ShapeKind};
use crate::math::{Transform, Vec3};

use super::contact::ContactSink;

pub use convex::convex_convex;
pub use particle::{convex_particle, plane_particle, sphere_particle};
pub use plane::{plane_convex, plane_trimesh};
pub use sphere::{sphere_convex, sphere_plane, sphere_sphere};
pub use terrain::{convex_heightfield, convex_trimesh, sphere_heightfield, sphere_trimesh};

/// A shape placed in world space
#[derive(Debug, Clone, Copy)]
pub struct ShapePose<'a> {
    pub shape: &'a Shape,
    pub frame: Transform,
}

impl<'a> ShapePose<'a> {
    pub fn new(shape: &'a Shape, frame: Transform) -> Self {
        Self { shape, frame }
    }
}

/// Collides two posed shapes, appending contacts with normals pointing
/// from `a` towards `b`. Returns whether they touch.
pub fn collide(a: ShapePose<'_>, b: ShapePose<'_>, sink: &mut ContactSink) -> bool {
    if let Some(hit) = collide_ordered(a, b, sink) {
        return hit;
    }
    let start = sink.len();
    match collide_ordered(b, a, sink) {
        Some(hit) => {
            sink.flip_from(start);
            hit
        }
        None => false,
    }
}

/// `None` when no handler takes the pair in this order
fn collide_ordered(a: ShapePose<'_>, b: ShapePose<'_>, sink: &mut ContactSink) -> Option<bool> {
    use ShapeKind as K;

    let (fa, fb) = (a.frame, b.frame);
    let hit = match (a.shape.kind(), b.shape.kind()) {
        (K::Sphere(x), K::Sphere(y)) => sphere_sphere(x.radius, fa, y.radius, fb, sink),
        (K::Sphere(x), K::Plane) => sphere_plane(x.radius, fa, fb, sink),
        (K::Sphere(x), K::Particle) => sphere_particle(x.radius, fa, fb.position, sink),
        (K::Sphere(x), K::Heightfield(field)) => sphere_heightfield(x.radius, fa, field, fb, sink),
        (K::Sphere(x), K::Trimesh(mesh)) => sphere_trimesh(x.radius, fa, mesh, fb, sink),
        (K::Sphere(x), _) => sphere_convex(x.radius, fa, b.shape.convex_hull()?, fb, sink),
        (K::Plane, K::Particle) => plane_particle(fa, fb.position, sink),
        (K::Plane, K::Trimesh(mesh)) => plane_trimesh(fa, mesh, fb, sink),
        (K::Plane, _) => plane_convex(fa, b.shape.convex_hull()?, fb, sink),
        (_, K::Particle) => convex_particle(a.shape.convex_hull()?, fa, fb.position, sink),
        (_, K::Heightfield(field)) => convex_heightfield(a.shape.convex_hull()?, fa, field, fb, sink),
        (_, K::Trimesh(mesh)) => convex_trimesh(a.shape.convex_hull()?, fa, mesh, fb, sink),
        _ => convex_convex(a.shape.convex_hull()?, fa, b.shape.convex_hull()?, fb, sink),
    };
    Some(hit)
}

/// A touching shape pair that only reports its overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeOverlap {
    pub body_i: usize,
    pub shape_i: usize,
    pub body_j: usize,
    pub shape_j: usize,
}

/// Normal force a body pair carried through its contacts in one step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairForce {
    pub total: f32,
    pub contacts: u32,
}

impl PairForce {
    #[inline]
    pub fn mean(&self) -> f32 {
        if self.contacts == 0 {
            0.0
        } else {
            self.total / self.contacts as f32
        }
    }
}

/// Unordered body-pair key
pub fn pair_key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Read-only world state the narrowphase works from
#[derive(Debug, Clone, Copy)]
pub struct NarrowphaseInput<'a> {
    pub bodies: &'a [Body],
    pub materials: &'a MaterialTable,
    /// Normal forces from the previous step, bounding friction this step
    pub previous_forces: &'a HashMap<(BodyId, BodyId), PairForce>,
    /// Gravity magnitude used for friction when a pair has no history
    pub friction_gravity: f32,
    pub dt: f32,
}

#[derive(Debug, Default)]
pub struct NarrowphaseOutput {
    pub contacts: Vec<Equation>,
    pub frictions: Vec<Equation>,
    pub overlaps: Vec<ShapeOverlap>,
}

impl NarrowphaseOutput {
    pub fn clear(&mut self) {
        self.contacts.clear();
        self.frictions.clear();
        self.overlaps.clear();
    }
}

/// Friction bound and spook for one body pair's contacts
#[derive(Debug, Clone, Copy)]
struct FrictionSetup {
    mu: f32,
    spook: SpookParams,
}

/// Running sums for averaged friction over a body pair
#[derive(Debug, Default)]
struct FrictionAverage {
    ri: Vec3,
    rj: Vec3,
    ni: Vec3,
    count: u32,
    setup: Option<FrictionSetup>,
}

#[derive(Debug, Default)]
pub struct Narrowphase {
    /// Replaces per-contact friction with one averaged pair per body pair
    pub enable_friction_reduction: bool,
    sink: ContactSink,
}

impl Narrowphase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds contact and friction equations for every candidate pair.
    /// Pairs that cannot respond are only tested and land in `overlaps`.
    pub fn get_contacts(&mut self, input: &NarrowphaseInput<'_>, pairs: &[(usize, usize)], out: &mut NarrowphaseOutput) {
        for &(i, j) in pairs {
            self.body_pair(input, i, j, out);
        }
    }

    fn body_pair(&mut self, input: &NarrowphaseInput<'_>, i: usize, j: usize, out: &mut NarrowphaseOutput) {
        let (bi, bj) = (&input.bodies[i], &input.bodies[j]);
        let materials = input.materials;
        let body_material = materials.resolve(bi.material, bj.material);
        let body_just_test = !(bi.collision_response && bj.collision_response)
            || bi.is_trigger
            || bj.is_trigger
            || (!bi.is_dynamic() && !bj.is_dynamic());

        let previous = match (bi.id(), bj.id()) {
            (Some(a), Some(b)) => input.previous_forces.get(&pair_key(a, b)).copied(),
            _ => None,
        };
        let inv_mass_sum = bi.inv_mass() + bj.inv_mass();
        let reduced_mass = if inv_mass_sum > 0.0 { 1.0 / inv_mass_sum } else { 0.0 };
        let fallback_normal_force = input.friction_gravity * reduced_mass;

        let mut average = FrictionAverage::default();

        for (si, shape_i) in bi.shapes().iter().enumerate() {
            let frame_i = bi.shape_transform(si);
            for (sj, shape_j) in bj.shapes().iter().enumerate() {
                if shape_i.collision_filter_group & shape_j.collision_filter_mask == 0
                    || shape_j.collision_filter_group & shape_i.collision_filter_mask == 0
                {
                    continue;
                }
                let frame_j = bj.shape_transform(sj);
                let reach = shape_i.bounding_radius() + shape_j.bounding_radius();
                if frame_i.position.distance(frame_j.position) > reach {
                    continue;
                }

                let just_test = body_just_test || !(shape_i.collision_response && shape_j.collision_response);
                self.sink.reset(just_test);
                let hit = collide(ShapePose::new(shape_i, frame_i), ShapePose::new(shape_j, frame_j), &mut self.sink);
                if !hit {
                    continue;
                }
                if just_test {
                    out.overlaps.push(ShapeOverlap {
                        body_i: i,
                        shape_i: si,
                        body_j: j,
                        shape_j: sj,
                    });
                    continue;
                }

                let material_i = shape_i.material.or(bi.material);
                let material_j = shape_j.material.or(bj.material);
                let cm: &ContactMaterial = materials
                    .resolve(shape_i.material, shape_j.material)
                    .or(body_material)
                    .unwrap_or(materials.default_contact_material());
                let restitution = materials
                    .combined_restitution(material_i, material_j)
                    .unwrap_or(cm.restitution);
                let friction = FrictionSetup {
                    mu: materials.combined_friction(material_i, material_j).unwrap_or(cm.friction),
                    spook: SpookParams::new(cm.friction_equation_stiffness, cm.friction_equation_relaxation, input.dt),
                };
                let contact_spook = SpookParams::new(cm.contact_equation_stiffness, cm.contact_equation_relaxation, input.dt);

                for point in self.sink.points() {
                    let approach_speed = (bi.velocity_at_world_point(point.point_a)
                        - bj.velocity_at_world_point(point.point_b))
                    .dot(point.normal);
                    let contact = ContactEquation::new(point.point_a - bi.position(), point.point_b - bj.position(), point.normal)
                        .with_restitution(cm.effective_restitution(restitution, approach_speed))
                        .with_shapes(si, sj);
                    out.contacts.push(Equation::contact(i, j, contact, contact_spook));

                    if friction.mu <= 0.0 {
                        continue;
                    }
                    if self.enable_friction_reduction {
                        average.ri += contact.ri;
                        average.rj += contact.rj;
                        average.ni += contact.ni;
                        average.count += 1;
                        average.setup = Some(friction);
                    } else {
                        let normal_force = previous.map_or(fallback_normal_force, |p| p.mean());
                        push_friction(out, i, j, contact.ri, contact.rj, contact.ni, friction.mu * normal_force, friction.spook);
                    }
                }
            }
        }

        if let Some(setup) = average.setup {
            let n = average.count as f32;
            if let Some(ni) = (average.ni / n).try_normalize() {
                let normal_force = previous.map_or(fallback_normal_force, |p| p.total);
                push_friction(out, i, j, average.ri / n, average.rj / n, ni, setup.mu * normal_force, setup.spook);
            }
        }
    }
}

/// Two friction rows along the tangents of `ni`
#[allow(clippy::too_many_arguments)]
fn push_friction(
    out: &mut NarrowphaseOutput,
    i: usize,
    j: usize,
    ri: Vec3,
    rj: Vec3,
    ni: Vec3,
    slip_force: f32,
    spook: SpookParams,
) {
    let (t1, t2) = ni.tangents();
    for t in [t1, t2] {
        out.frictions
            .push(Equation::friction(i, j, FrictionEquation { ri, rj, t }, slip_force, spook));
    }
}
