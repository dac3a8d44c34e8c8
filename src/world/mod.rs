//! The simulation world and its fixed-step pipeline

mod config;
mod events;
mod raycast;

use std::collections::HashMap;
use std::fmt::Debug;

use log::{debug, trace, warn};

use crate::collision::narrow_phase::pair_key;
use crate::collision::{
    BroadPhase, CollisionMatrix, Narrowphase, NarrowphaseInput, NarrowphaseOutput, OverlapKeeper, PairForce,
};
use crate::constraints::{Constraint, ConstraintId, Equation};
use crate::dynamics::{
    apply_damping, integrate, Body, BodyId, ContactMaterial, Material, MaterialId, MaterialTable, SleepState,
    SleepTransition,
};
use crate::error::{PhysicsError, Result};
use crate::geometry::Aabb;
use crate::math::Vec3;
use crate::solver::{GsSolver, Solver};

pub use config::{BroadphaseKind, WorldConfig};
pub use events::{CollideContact, ShapeKey, WorldEvent, WorldEventHandler};
pub use raycast::{Ray, RayMode, RaycastOptions, RaycastResult};

/// User logic run at the start of every fixed step, before collision
/// detection. Subsystems may read and modify the world freely.
pub trait Subsystem: Debug {
    fn update(&mut self, world: &mut World, dt: f32);
}

/// A resolved contact of the most recent step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactInfo {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub shape_a: usize,
    pub shape_b: usize,
    /// World contact point on body A
    pub point_a: Vec3,
    /// World contact point on body B
    pub point_b: Vec3,
    /// Unit normal from A towards B
    pub normal: Vec3,
    /// Overlap depth along the normal when the contact was found
    pub penetration: f32,
    /// Approach speed along the normal when the contact was found
    pub impact_velocity: f32,
    /// Normal force the solver applied
    pub force: f32,
}

/// The main physics world containing all bodies and managing simulation
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    /// Dense body storage; `ids[k]` is the id of `bodies[k]`
    bodies: Vec<Body>,
    ids: Vec<BodyId>,
    index_of: HashMap<BodyId, usize>,
    next_body_id: u32,
    constraints: Vec<Constraint>,
    next_constraint_id: u32,
    materials: MaterialTable,
    broadphase: Box<dyn BroadPhase>,
    narrowphase: Narrowphase,
    solver: Box<dyn Solver>,
    subsystems: Vec<Box<dyn Subsystem>>,

    // Per-step buffers, reused across steps
    pairs: Vec<(usize, usize)>,
    output: NarrowphaseOutput,
    equations: Vec<Equation>,
    contacts: Vec<ContactInfo>,
    pair_forces: HashMap<(BodyId, BodyId), PairForce>,

    collision_matrix: CollisionMatrix,
    previous_collision_matrix: CollisionMatrix,
    body_overlaps: OverlapKeeper<BodyId>,
    shape_overlaps: OverlapKeeper<ShapeKey>,
    events: Vec<WorldEvent>,

    time: f32,
    step_number: u64,
    accumulator: f32,
    last_iterations: usize,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// Creates a new physics world with the given configuration
    pub fn new(config: WorldConfig) -> Self {
        let mut narrowphase = Narrowphase::new();
        narrowphase.enable_friction_reduction = config.friction_reduction;
        Self {
            bodies: Vec::new(),
            ids: Vec::new(),
            index_of: HashMap::new(),
            next_body_id: 0,
            constraints: Vec::new(),
            next_constraint_id: 0,
            materials: MaterialTable::new(config.default_contact_material),
            broadphase: config.broadphase.build(),
            narrowphase,
            solver: Box::new(GsSolver::new(config.solver)),
            subsystems: Vec::new(),
            pairs: Vec::new(),
            output: NarrowphaseOutput::default(),
            equations: Vec::new(),
            contacts: Vec::new(),
            pair_forces: HashMap::new(),
            collision_matrix: CollisionMatrix::new(),
            previous_collision_matrix: CollisionMatrix::new(),
            body_overlaps: OverlapKeeper::new(),
            shape_overlaps: OverlapKeeper::new(),
            events: Vec::new(),
            time: 0.0,
            step_number: 0,
            accumulator: 0.0,
            last_iterations: 0,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    /// Replaces the broadphase strategy
    pub fn set_broadphase(&mut self, broadphase: Box<dyn BroadPhase>) {
        self.broadphase = broadphase;
    }

    /// Replaces the solver
    pub fn set_solver(&mut self, solver: Box<dyn Solver>) {
        self.config.solver = *solver.config();
        self.solver = solver;
    }

    pub fn narrowphase_mut(&mut self) -> &mut Narrowphase {
        &mut self.narrowphase
    }

    /// Simulated time in seconds
    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Number of fixed steps taken so far
    #[inline]
    pub fn step_number(&self) -> u64 {
        self.step_number
    }

    /// Solver sweeps used by the last step
    #[inline]
    pub fn solver_iterations(&self) -> usize {
        self.last_iterations
    }

    // Bodies

    /// Adds a body and returns its id. Adding a body that is already in this
    /// world is a no-op returning the existing id.
    pub fn add_body(&mut self, mut body: Body) -> BodyId {
        if let Some(id) = body.id().filter(|id| self.index_of.contains_key(id)) {
            warn!("body {:?} is already in the world", id);
            return id;
        }

        let id = BodyId(self.next_body_id);
        self.next_body_id += 1;
        body.id = Some(id);
        body.aabb_needs_update = true;
        body.interpolated_position = body.position;
        body.interpolated_quaternion = body.quaternion;

        self.index_of.insert(id, self.bodies.len());
        self.bodies.push(body);
        self.ids.push(id);
        self.collision_matrix.resize(self.bodies.len());
        self.previous_collision_matrix.resize(self.bodies.len());
        debug!("added body {:?}, {} bodies", id, self.bodies.len());
        id
    }

    /// Removes a body together with every constraint attached to it.
    /// Returns `None` if the body is not in the world.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        let Some(index) = self.index_of.remove(&id) else {
            warn!("cannot remove body {:?}: not in the world", id);
            return None;
        };

        let mut body = self.bodies.remove(index);
        self.ids.remove(index);
        for slot in self.index_of.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        self.collision_matrix.remove_index(index);
        self.previous_collision_matrix.remove_index(index);

        self.body_overlaps.remove_key(id);
        for shape in 0..body.shapes().len() {
            self.shape_overlaps.remove_key(ShapeKey { body: id, shape });
        }
        self.broadphase.body_removed(&body);
        self.pair_forces.retain(|&(a, b), _| a != id && b != id);

        let before = self.constraints.len();
        self.constraints.retain(|c| !c.involves(id));
        let dropped = before - self.constraints.len();
        if dropped > 0 {
            debug!("removed {} constraints attached to body {:?}", dropped, id);
        }

        body.id = None;
        debug!("removed body {:?}, {} bodies", id, self.bodies.len());
        Some(body)
    }

    #[inline]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contains_body(&self, id: BodyId) -> bool {
        self.index_of.contains_key(&id)
    }

    /// Gets a reference to a body
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.index_of.get(&id).map(|&i| &self.bodies[i])
    }

    /// Gets a mutable reference to a body
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.index_of.get(&id).map(|&i| &mut self.bodies[i])
    }

    /// Mutable access to two distinct bodies at once
    pub fn bodies_pair_mut(&mut self, a: BodyId, b: BodyId) -> Option<(&mut Body, &mut Body)> {
        let i = *self.index_of.get(&a)?;
        let j = *self.index_of.get(&b)?;
        if i == j {
            return None;
        }
        if i < j {
            let (head, tail) = self.bodies.split_at_mut(j);
            Some((&mut head[i], &mut tail[0]))
        } else {
            let (head, tail) = self.bodies.split_at_mut(i);
            Some((&mut tail[0], &mut head[j]))
        }
    }

    // Constraints

    /// Adds a constraint between two bodies already in the world
    pub fn add_constraint(&mut self, mut constraint: Constraint) -> Result<ConstraintId> {
        for body in [constraint.body_a, constraint.body_b] {
            if !self.contains_body(body) {
                return Err(PhysicsError::BodyNotFound(body));
            }
        }
        let id = ConstraintId(self.next_constraint_id);
        self.next_constraint_id += 1;
        constraint.id = Some(id);
        debug!("added constraint {:?} between {:?} and {:?}", id, constraint.body_a, constraint.body_b);
        self.constraints.push(constraint);
        Ok(id)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Option<Constraint> {
        let Some(position) = self.constraints.iter().position(|c| c.id == Some(id)) else {
            warn!("cannot remove constraint {:?}: not in the world", id);
            return None;
        };
        debug!("removed constraint {:?}", id);
        let mut constraint = self.constraints.remove(position);
        constraint.id = None;
        Some(constraint)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == Some(id))
    }

    pub fn constraint_mut(&mut self, id: ConstraintId) -> Option<&mut Constraint> {
        self.constraints.iter_mut().find(|c| c.id == Some(id))
    }

    #[inline]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    // Materials and subsystems

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.add_material(material)
    }

    /// Registers contact parameters for a material pair, replacing any
    /// previous entry for the same pair
    pub fn add_contact_material(&mut self, contact_material: ContactMaterial) {
        debug!("added contact material for {:?}", contact_material.materials);
        self.materials.add_contact_material(contact_material);
    }

    #[inline]
    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn add_subsystem(&mut self, subsystem: impl Subsystem + 'static) {
        self.subsystems.push(Box::new(subsystem));
    }

    // Queries

    /// Contacts resolved in the most recent step
    #[inline]
    pub fn contacts(&self) -> &[ContactInfo] {
        &self.contacts
    }

    /// Events queued by the most recent `step` or `step_accumulated` call
    #[inline]
    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    /// Takes the queued events
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, WorldEvent> {
        self.events.drain(..)
    }

    /// Hands every queued event to `handler`, in order, and clears the queue
    pub fn dispatch_events(&mut self, handler: &mut impl WorldEventHandler) {
        for event in self.events.drain(..) {
            handler.handle(&event);
        }
    }

    /// Casts `ray` against every body the broadphase finds along it
    pub fn raycast(&mut self, ray: &Ray) -> Vec<RaycastResult> {
        let mut candidates = Vec::new();
        self.broadphase
            .aabb_query(&mut self.bodies, Aabb::from_points([ray.from, ray.to]), &mut candidates);
        ray.cast(candidates.iter().map(|&i| &self.bodies[i]))
    }

    /// The hit nearest to `from`
    pub fn raycast_closest(&mut self, from: Vec3, to: Vec3, options: RaycastOptions) -> Option<RaycastResult> {
        let ray = Ray::new(from, to, RayMode::Closest).with_options(options);
        self.raycast(&ray).into_iter().next()
    }

    /// Any hit, found with the least work
    pub fn raycast_any(&mut self, from: Vec3, to: Vec3, options: RaycastOptions) -> Option<RaycastResult> {
        let ray = Ray::new(from, to, RayMode::Any).with_options(options);
        self.raycast(&ray).into_iter().next()
    }

    /// Every hit along the segment
    pub fn raycast_all(&mut self, from: Vec3, to: Vec3, options: RaycastOptions) -> Vec<RaycastResult> {
        let ray = Ray::new(from, to, RayMode::All).with_options(options);
        self.raycast(&ray)
    }

    // Stepping

    /// Advances the simulation by one fixed step of `dt` seconds.
    /// Interpolated poses are set to the new poses.
    pub fn step(&mut self, dt: f32) {
        if !valid_dt(dt) {
            return;
        }
        self.events.clear();
        self.internal_step(dt);
        for body in &mut self.bodies {
            body.interpolated_position = body.position;
            body.interpolated_quaternion = body.quaternion;
        }
    }

    /// Advances by `elapsed` wall time using fixed steps of `dt`, taking at
    /// most `max_substeps` of them. Leftover time stays in the accumulator
    /// and is used to interpolate body poses between the last two steps.
    /// Returns the number of fixed steps taken.
    pub fn step_accumulated(&mut self, dt: f32, elapsed: f32, max_substeps: u32) -> u32 {
        if !valid_dt(dt) {
            return 0;
        }
        self.events.clear();
        self.accumulator += elapsed.max(0.0);

        let mut substeps = 0;
        while self.accumulator >= dt && substeps < max_substeps {
            self.internal_step(dt);
            self.accumulator -= dt;
            substeps += 1;
        }
        if self.accumulator >= dt {
            warn!(
                "substep cap of {} reached, dropping {:.4}s of simulation time",
                max_substeps,
                self.accumulator - self.accumulator % dt
            );
        }
        self.accumulator %= dt;

        let t = self.accumulator / dt;
        for body in &mut self.bodies {
            body.interpolated_position = body.previous_position.lerp(body.position, t);
            body.interpolated_quaternion = body.previous_quaternion.slerp(body.quaternion, t).normalize();
        }
        substeps
    }

    fn internal_step(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        for body in &mut self.bodies {
            if body.is_dynamic() {
                body.force += gravity * body.mass();
            }
        }

        let mut subsystems = std::mem::take(&mut self.subsystems);
        for subsystem in &mut subsystems {
            subsystem.update(self, dt);
        }
        subsystems.append(&mut self.subsystems);
        self.subsystems = subsystems;

        self.pairs.clear();
        self.broadphase.collision_pairs(&mut self.bodies, &mut self.pairs);
        self.prune_connected_pairs();

        std::mem::swap(&mut self.collision_matrix, &mut self.previous_collision_matrix);
        self.collision_matrix.reset();
        self.body_overlaps.tick();
        self.shape_overlaps.tick();

        self.output.clear();
        let input = NarrowphaseInput {
            bodies: &self.bodies,
            materials: &self.materials,
            previous_forces: &self.pair_forces,
            friction_gravity: self.config.friction_gravity_magnitude(),
            dt,
        };
        self.narrowphase.get_contacts(&input, &self.pairs, &mut self.output);

        self.record_contacts();
        self.emit_overlap_events();
        self.wake_touched_bodies();
        self.solve(dt);

        for body in &mut self.bodies {
            apply_damping(body, dt);
        }
        self.events.push(WorldEvent::PreStep);
        let normalization = self.config.quat_normalization(self.step_number);
        for body in &mut self.bodies {
            integrate(body, dt, normalization);
            body.clear_forces();
        }
        self.time += dt;
        self.step_number += 1;
        self.events.push(WorldEvent::PostStep);

        if self.config.allow_sleep {
            for (body, &id) in self.bodies.iter_mut().zip(&self.ids) {
                match body.sleep_tick(self.time) {
                    Some(SleepTransition::Sleepy) => self.events.push(WorldEvent::Sleepy { body: id }),
                    Some(SleepTransition::Sleep) => self.events.push(WorldEvent::Sleep { body: id }),
                    Some(SleepTransition::WakeUp) => self.events.push(WorldEvent::WakeUp { body: id }),
                    None => {}
                }
            }
        }

        trace!(
            "step {}: {} pairs, {} contacts, {} equations, {} sweeps",
            self.step_number,
            self.pairs.len(),
            self.contacts.len(),
            self.equations.len(),
            self.last_iterations
        );
    }

    /// Drops candidate pairs joined by a constraint that disables
    /// collisions between its bodies
    fn prune_connected_pairs(&mut self) {
        if self.constraints.iter().all(|c| c.collide_connected) {
            return;
        }
        let (ids, constraints) = (&self.ids, &self.constraints);
        self.pairs.retain(|&(i, j)| {
            !constraints
                .iter()
                .any(|c| !c.collide_connected && c.connects(ids[i], ids[j]))
        });
    }

    /// Snapshots contacts, marks the collision matrix and queues collide
    /// events for pairs that were apart last step
    fn record_contacts(&mut self) {
        self.contacts.clear();
        for eq in &self.output.contacts {
            let Some(contact) = eq.as_contact() else {
                continue;
            };
            let (i, j) = (eq.body_i, eq.body_j);
            let (id_i, id_j) = (self.ids[i], self.ids[j]);
            let point_a = self.bodies[i].position + contact.ri;
            let point_b = self.bodies[j].position + contact.rj;
            let impact_velocity = eq.impact_velocity(&self.bodies);

            self.contacts.push(ContactInfo {
                body_a: id_i,
                body_b: id_j,
                shape_a: contact.shape_i,
                shape_b: contact.shape_j,
                point_a,
                point_b,
                normal: contact.ni,
                penetration: -eq.compute_gq(&self.bodies),
                impact_velocity,
                force: 0.0,
            });

            if !self.previous_collision_matrix.get(i, j) && !self.collision_matrix.get(i, j) {
                self.events.push(WorldEvent::Collide {
                    body: id_i,
                    other: id_j,
                    contact: CollideContact {
                        point: point_a,
                        normal: contact.ni,
                        impact_velocity,
                    },
                });
                self.events.push(WorldEvent::Collide {
                    body: id_j,
                    other: id_i,
                    contact: CollideContact {
                        point: point_b,
                        normal: -contact.ni,
                        impact_velocity,
                    },
                });
            }
            self.collision_matrix.set(i, j, true);
            self.body_overlaps.set(id_i, id_j);
            self.shape_overlaps.set(
                ShapeKey {
                    body: id_i,
                    shape: contact.shape_i,
                },
                ShapeKey {
                    body: id_j,
                    shape: contact.shape_j,
                },
            );
        }

        for overlap in &self.output.overlaps {
            let (id_i, id_j) = (self.ids[overlap.body_i], self.ids[overlap.body_j]);
            self.body_overlaps.set(id_i, id_j);
            self.shape_overlaps.set(
                ShapeKey {
                    body: id_i,
                    shape: overlap.shape_i,
                },
                ShapeKey {
                    body: id_j,
                    shape: overlap.shape_j,
                },
            );
        }
    }

    fn emit_overlap_events(&mut self) {
        let (mut began, mut ended) = (Vec::new(), Vec::new());
        self.body_overlaps.diff(&mut began, &mut ended);
        self.events.extend(
            began
                .into_iter()
                .map(|(body_a, body_b)| WorldEvent::BeginContact { body_a, body_b }),
        );
        self.events
            .extend(ended.into_iter().map(|(body_a, body_b)| WorldEvent::EndContact { body_a, body_b }));

        let (mut began, mut ended) = (Vec::new(), Vec::new());
        self.shape_overlaps.diff(&mut began, &mut ended);
        self.events.extend(
            began
                .into_iter()
                .map(|(shape_a, shape_b)| WorldEvent::BeginShapeContact { shape_a, shape_b }),
        );
        self.events.extend(
            ended
                .into_iter()
                .map(|(shape_a, shape_b)| WorldEvent::EndShapeContact { shape_a, shape_b }),
        );
    }

    /// Sleeping bodies wake when an awake, fast enough body touches them
    fn wake_touched_bodies(&mut self) {
        for eq in &self.output.contacts {
            let (i, j) = (eq.body_i, eq.body_j);
            if disturbs(&self.bodies[j], &self.bodies[i]) {
                self.bodies[i].wake_up_after_narrowphase = true;
            }
            if disturbs(&self.bodies[i], &self.bodies[j]) {
                self.bodies[j].wake_up_after_narrowphase = true;
            }
        }
        for (body, &id) in self.bodies.iter_mut().zip(&self.ids) {
            if body.wake_up_after_narrowphase && body.wake_up() {
                self.events.push(WorldEvent::WakeUp { body: id });
            }
        }
    }

    fn solve(&mut self, dt: f32) {
        self.equations.clear();
        self.equations.extend(self.output.frictions.drain(..));
        let contacts_start = self.equations.len();
        self.equations.extend(self.output.contacts.drain(..));
        let constraints_start = self.equations.len();

        for constraint in &self.constraints {
            if !constraint.is_enabled() {
                continue;
            }
            if let (Some(&i), Some(&j)) = (
                self.index_of.get(&constraint.body_a),
                self.index_of.get(&constraint.body_b),
            ) {
                constraint.build_equations(i, j, &self.bodies, dt, &mut self.equations);
            }
        }

        self.last_iterations = self.solver.solve(dt, &mut self.bodies, &mut self.equations);

        self.pair_forces.clear();
        let contacts = &self.equations[contacts_start..constraints_start];
        for (info, eq) in self.contacts.iter_mut().zip(contacts) {
            info.force = eq.multiplier;
            let force = self.pair_forces.entry(pair_key(info.body_a, info.body_b)).or_default();
            force.total += eq.multiplier;
            force.contacts += 1;
        }

        let mut rows = self.equations[constraints_start..].iter();
        for constraint in &mut self.constraints {
            let built = constraint.is_enabled()
                && self.index_of.contains_key(&constraint.body_a)
                && self.index_of.contains_key(&constraint.body_b);
            let count = if built { constraint.equation_count() } else { 0 };
            constraint.set_multipliers(rows.by_ref().take(count).map(|eq| eq.multiplier));
        }
    }
}

fn valid_dt(dt: f32) -> bool {
    let valid = dt.is_finite() && dt > 0.0;
    if !valid {
        warn!("ignoring step with invalid dt {}", dt);
    }
    valid
}

/// Whether `other` moving against the sleeping `sleeper` wakes it
fn disturbs(other: &Body, sleeper: &Body) -> bool {
    if !(sleeper.allow_sleep && sleeper.is_dynamic() && sleeper.is_sleeping()) {
        return false;
    }
    if other.sleep_state() != SleepState::Awake || other.is_static() {
        return false;
    }
    let speed_squared = other.velocity.length_squared() + other.angular_velocity.length_squared();
    speed_squared >= 2.0 * other.sleep_speed_limit * other.sleep_speed_limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Spring;
    use crate::geometry::Shape;
    use crate::math::Quat;
    use approx::assert_abs_diff_eq;

    const DT: f32 = 1.0 / 60.0;

    fn y_up_world() -> World {
        World::new(WorldConfig::default().with_gravity(Vec3::new(0.0, -9.8, 0.0)))
    }

    /// Static plane through the origin facing +Y
    fn ground() -> Body {
        Body::fixed()
            .with_shape(Shape::plane())
            .with_rotation(Quat::from_axis_angle(Vec3::X, -std::f32::consts::FRAC_PI_2))
    }

    fn ball(radius: f32, position: Vec3) -> Body {
        Body::new(1.0)
            .with_shape(Shape::sphere(radius).unwrap())
            .with_position(position)
    }

    fn cube(half: f32, position: Vec3) -> Body {
        Body::new(1.0)
            .with_shape(Shape::cuboid(Vec3::splat(half)).unwrap())
            .with_position(position)
    }

    #[test]
    fn test_gravity_simulation() {
        let mut world = y_up_world();
        let id = world.add_body(ball(0.5, Vec3::new(0.0, 10.0, 0.0)));

        for _ in 0..60 {
            world.step(DT);
        }

        let body = world.body(id).unwrap();
        assert!(body.position().y < 6.0);
        assert_abs_diff_eq!(body.velocity.y, -9.8, epsilon = 0.15);
        assert_abs_diff_eq!(world.time(), 1.0, epsilon = 1e-4);
        assert_eq!(world.step_number(), 60);
    }

    #[test]
    fn test_sphere_settles_on_plane() {
        let mut world = y_up_world();
        world.add_body(ground());
        let id = world.add_body(ball(1.0, Vec3::new(0.0, 10.0, 0.0)));

        for _ in 0..600 {
            world.step(DT);
        }

        let body = world.body(id).unwrap();
        assert_abs_diff_eq!(body.position().y, 1.0, epsilon = 1e-2);
        assert!(body.velocity.y.abs() < 1e-3);
    }

    #[test]
    fn test_bouncy_sphere_comes_to_rest() {
        for restitution in [0.3, 0.6, 0.9, 0.95] {
            let mut config = WorldConfig::default().with_gravity(Vec3::new(0.0, -9.8, 0.0));
            config.default_contact_material = ContactMaterial::default().with_restitution(restitution);
            let mut world = World::new(config);
            world.add_body(ground());
            let id = world.add_body(ball(1.0, Vec3::new(0.0, 1.5, 0.0)));

            let mut bounced = false;
            for _ in 0..1200 {
                world.step(DT);
                bounced |= world.body(id).unwrap().velocity.y > 0.5;
            }

            let body = world.body(id).unwrap();
            assert!(bounced, "restitution {restitution} never bounced");
            assert_abs_diff_eq!(body.position().y, 1.0, epsilon = 1e-2);
            assert!(body.velocity.y.abs() < 1e-3, "restitution {restitution} still moving");
        }
    }

    #[test]
    fn test_box_rests_on_plane() {
        let mut world = y_up_world();
        world.add_body(ground());
        let id = world.add_body(cube(0.5, Vec3::new(0.0, 2.0, 0.0)));

        for _ in 0..300 {
            world.step(DT);
        }

        let body = world.body(id).unwrap();
        assert_abs_diff_eq!(body.position().y, 0.5, epsilon = 2e-2);
        assert!(body.velocity.length() < 1e-2);
        assert!(body.angular_velocity.length() < 1e-2);
        assert!(world.contacts().len() >= 3);
    }

    #[test]
    fn test_friction_stops_sliding_box() {
        for friction_reduction in [false, true] {
            let mut config = WorldConfig::default().with_gravity(Vec3::new(0.0, -9.8, 0.0));
            config.friction_reduction = friction_reduction;
            let mut world = World::new(config);
            world.add_body(ground());
            let id = world.add_body(cube(0.5, Vec3::new(0.0, 0.49, 0.0)).with_velocity(Vec3::new(3.0, 0.0, 0.0)));

            for _ in 0..150 {
                world.step(DT);
            }

            let body = world.body(id).unwrap();
            assert!(body.velocity.x.abs() < 0.1);
            assert!(body.position().x > 0.5);
        }
    }

    #[test]
    fn test_sleep_sequence() {
        let mut world = World::new(WorldConfig::default().with_sleep(true));
        let id = world.add_body(ball(0.5, Vec3::ZERO).with_velocity(Vec3::new(0.05, 0.0, 0.0)));

        let mut transitions = Vec::new();
        for step in 1..=150 {
            world.step(DT);
            transitions.extend(
                world
                    .drain_events()
                    .filter(|event| {
                        matches!(
                            event,
                            WorldEvent::Sleepy { .. } | WorldEvent::Sleep { .. } | WorldEvent::WakeUp { .. }
                        )
                    })
                    .map(|event| (step, event)),
            );
        }

        let events: Vec<_> = transitions.iter().map(|&(_, event)| event).collect();
        assert_eq!(events, [WorldEvent::Sleepy { body: id }, WorldEvent::Sleep { body: id }]);
        // Each transition waits out a full second of slow motion
        let (sleepy_step, sleep_step) = (transitions[0].0, transitions[1].0);
        assert!(sleepy_step >= 60, "sleepy at step {sleepy_step}");
        assert!(sleep_step - sleepy_step >= 60, "asleep at step {sleep_step}");
        assert!(world.body(id).unwrap().is_sleeping());
    }

    #[test]
    fn test_moving_body_wakes_sleeper() {
        let mut world = World::default();
        let sleeper = world.add_body(ball(1.0, Vec3::ZERO));
        world.body_mut(sleeper).unwrap().sleep();
        let striker = world.add_body(ball(1.0, Vec3::new(3.0, 0.0, 0.0)).with_velocity(Vec3::new(-10.0, 0.0, 0.0)));

        let mut woke = false;
        for _ in 0..30 {
            world.step(DT);
            woke |= world.events().contains(&WorldEvent::WakeUp { body: sleeper });
        }

        assert!(woke);
        assert!(world.body(sleeper).unwrap().velocity.x < 0.0);
        assert!(world.body(striker).unwrap().velocity.x > -10.0);
    }

    #[test]
    fn test_begin_and_end_contact_events() {
        let mut world = World::default();
        let floor = world.add_body(ground());
        let ball_id = world.add_body(ball(1.0, Vec3::new(0.0, 0.95, 0.0)));

        world.step(DT);
        let events = world.events();
        assert!(events.contains(&WorldEvent::BeginContact {
            body_a: floor,
            body_b: ball_id
        }));
        assert!(events.contains(&WorldEvent::BeginShapeContact {
            shape_a: ShapeKey { body: floor, shape: 0 },
            shape_b: ShapeKey {
                body: ball_id,
                shape: 0
            },
        }));
        let collides = events
            .iter()
            .filter(|e| matches!(e, WorldEvent::Collide { .. }))
            .count();
        assert_eq!(collides, 2);
        let pre = events.iter().position(|e| *e == WorldEvent::PreStep);
        let post = events.iter().position(|e| *e == WorldEvent::PostStep);
        assert!(pre < post);

        let body = world.body_mut(ball_id).unwrap();
        body.set_position(Vec3::new(0.0, 5.0, 0.0));
        body.velocity = Vec3::ZERO;
        world.step(DT);
        let events = world.events();
        assert!(events.contains(&WorldEvent::EndContact {
            body_a: floor,
            body_b: ball_id
        }));
        assert!(!events.iter().any(|e| matches!(e, WorldEvent::BeginContact { .. })));
    }

    #[test]
    fn test_collide_fires_once_per_pair() {
        let mut world = World::default();
        world.add_body(ground());
        let id = world.add_body(cube(0.5, Vec3::new(0.0, 0.45, 0.0)));

        world.step(DT);
        assert_eq!(world.contacts().len(), 4);
        let collided: Vec<_> = world
            .events()
            .iter()
            .filter_map(|e| match e {
                WorldEvent::Collide { body, .. } => Some(*body),
                _ => None,
            })
            .collect();
        assert_eq!(collided.len(), 2);
        assert!(collided.contains(&id));

        // Still touching, so no new collide
        world.step(DT);
        assert!(!world.events().iter().any(|e| matches!(e, WorldEvent::Collide { .. })));
    }

    #[test]
    fn test_trigger_reports_without_pushing() {
        let mut world = World::default();
        let sensor = world.add_body(
            Body::fixed()
                .with_shape(Shape::sphere(1.0).unwrap())
                .with_trigger(true),
        );
        let visitor = world.add_body(ball(0.5, Vec3::new(1.0, 0.0, 0.0)));

        world.step(DT);

        assert!(world.events().contains(&WorldEvent::BeginContact {
            body_a: sensor,
            body_b: visitor
        }));
        assert!(!world.events().iter().any(|e| matches!(e, WorldEvent::Collide { .. })));
        assert!(world.contacts().is_empty());
        assert_eq!(world.body(visitor).unwrap().velocity, Vec3::ZERO);
    }

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let mut world = World::default();
        let id = world.add_body(ball(0.5, Vec3::ZERO));
        let copy = world.body(id).unwrap().clone();
        assert_eq!(world.add_body(copy), id);
        assert_eq!(world.body_count(), 1);

        let removed = world.remove_body(id).unwrap();
        assert_eq!(removed.id(), None);
        assert!(world.remove_body(id).is_none());
        assert_eq!(world.body_count(), 0);

        let again = world.add_body(removed);
        assert_ne!(again, id);
    }

    #[test]
    fn test_remove_body_keeps_lookup_consistent() {
        let mut world = World::new(WorldConfig::default().with_broadphase(BroadphaseKind::Bvh));
        let ids: Vec<_> = (0..4)
            .map(|i| world.add_body(ball(0.5, Vec3::new(i as f32 * 0.9, 0.0, 0.0))))
            .collect();
        let joint = world.add_constraint(Constraint::distance(ids[1], ids[2], 0.9)).unwrap();
        world.step(DT);

        assert!(world.remove_body(ids[1]).is_some());
        assert!(world.constraint(joint).is_none());
        assert_eq!(world.body(ids[3]).unwrap().id(), Some(ids[3]));

        world.step(DT);
        let contacts = world.contacts();
        assert!(contacts.iter().all(|c| c.body_a != ids[1] && c.body_b != ids[1]));
        assert!(contacts.iter().any(|c| c.body_a == ids[2] && c.body_b == ids[3]));
    }

    #[test]
    fn test_collision_filters_skip_pairs() {
        let mut world = World::default();
        world.add_body(ball(0.5, Vec3::ZERO).with_collision_filter(0b01, 0b01));
        world.add_body(ball(0.5, Vec3::new(0.8, 0.0, 0.0)).with_collision_filter(0b10, 0b10));

        world.step(DT);

        assert!(world.contacts().is_empty());
        assert!(world.bodies().iter().all(|b| b.velocity == Vec3::ZERO));
    }

    #[test]
    fn test_kinematic_body_pushes_dynamic() {
        let mut world = World::default();
        let paddle = world.add_body(
            Body::kinematic()
                .with_shape(Shape::cuboid(Vec3::splat(0.5)).unwrap())
                .with_velocity(Vec3::new(2.0, 0.0, 0.0)),
        );
        let target = world.add_body(ball(0.5, Vec3::new(1.05, 0.0, 0.0)));

        for _ in 0..30 {
            world.step(DT);
        }

        let paddle = world.body(paddle).unwrap();
        assert_eq!(paddle.velocity, Vec3::new(2.0, 0.0, 0.0));
        assert_abs_diff_eq!(paddle.position().x, 1.0, epsilon = 1e-3);
        assert!(world.body(target).unwrap().velocity.x > 0.0);
    }

    #[test]
    fn test_raycast_modes() {
        let mut world = World::default();
        let near = world.add_body(ball(0.5, Vec3::new(2.0, 0.0, 0.0)));
        world.add_body(ball(0.5, Vec3::new(5.0, 0.0, 0.0)));
        world.add_body(ball(0.5, Vec3::new(5.0, 3.0, 0.0)));
        let (from, to) = (Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        let options = RaycastOptions::default();

        let closest = world.raycast_closest(from, to, options).unwrap();
        assert_eq!(closest.body, near);
        assert_abs_diff_eq!(closest.distance, 1.5, epsilon = 1e-5);
        assert!(world.raycast_any(from, to, options).is_some());
        assert_eq!(world.raycast_all(from, to, options).len(), 4);

        let below = Vec3::new(0.0, -5.0, 0.0);
        assert!(world
            .raycast_closest(from + below, to + below, options)
            .is_none());
    }

    #[test]
    fn test_accumulated_step_interpolates() {
        let mut world = y_up_world();
        let id = world.add_body(ball(0.5, Vec3::new(0.0, 10.0, 0.0)));

        assert_eq!(world.step_accumulated(DT, 1.5 * DT, 10), 1);
        let body = world.body(id).unwrap();
        let (previous, current) = (body.previous_position().y, body.position().y);
        assert!(current < previous);
        assert_abs_diff_eq!(
            body.interpolated_position().y,
            previous + (current - previous) * 0.5,
            epsilon = 1e-4
        );

        // Leftover half step plus the new time covers one more step
        assert_eq!(world.step_accumulated(DT, 0.6 * DT, 10), 1);
        assert_eq!(world.step_accumulated(DT, 10.0 * DT, 3), 3);
        assert_eq!(world.step_number(), 5);
    }

    #[test]
    fn test_invalid_dt_is_ignored() {
        let mut world = World::default();
        world.add_body(ball(0.5, Vec3::ZERO));
        world.step(0.0);
        world.step(f32::NAN);
        assert_eq!(world.step_accumulated(-1.0, 1.0, 4), 0);
        assert_eq!(world.step_number(), 0);
    }

    #[test]
    fn test_distance_constraint_holds_pendulum() {
        let mut world = y_up_world();
        let pivot = world.add_body(Body::fixed().with_shape(Shape::sphere(0.1).unwrap()));
        let bob = world.add_body(ball(0.1, Vec3::new(2.0, 0.0, 0.0)));
        let joint = world.add_constraint(Constraint::distance(pivot, bob, 2.0)).unwrap();

        for _ in 0..60 {
            world.step(DT);
        }

        let position = world.body(bob).unwrap().position();
        assert_abs_diff_eq!(position.length(), 2.0, epsilon = 0.05);
        assert!(position.y < -1.0);
        let multipliers = world.constraint(joint).unwrap().multipliers();
        assert_eq!(multipliers.len(), 1);
        // The rod pulls the bob towards the pivot
        assert!(multipliers[0] < 0.0);
    }

    #[test]
    fn test_constraint_needs_bodies_in_world() {
        let mut world = World::default();
        let a = world.add_body(ball(0.5, Vec3::ZERO));
        let missing = BodyId(42);
        assert_eq!(
            world.add_constraint(Constraint::distance(a, missing, 1.0)),
            Err(PhysicsError::BodyNotFound(missing))
        );
        assert!(world.remove_constraint(ConstraintId(7)).is_none());
    }

    #[test]
    fn test_connected_bodies_can_ignore_each_other() {
        for collide_connected in [true, false] {
            let mut world = World::default();
            let a = world.add_body(ball(0.5, Vec3::ZERO));
            let b = world.add_body(ball(0.5, Vec3::new(0.8, 0.0, 0.0)));
            let joint = Constraint::distance(a, b, 0.8).with_collide_connected(collide_connected);
            world.add_constraint(joint).unwrap();

            world.step(DT);

            assert_eq!(world.contacts().is_empty(), !collide_connected);
        }
    }

    #[test]
    fn test_spring_subsystem_pulls_bodies() {
        let mut world = World::default();
        let a = world.add_body(ball(0.2, Vec3::ZERO));
        let b = world.add_body(ball(0.2, Vec3::new(3.0, 0.0, 0.0)));
        world.add_subsystem(Spring::new(a, b).with_rest_length(1.0).with_stiffness(20.0));

        world.step(DT);

        assert!(world.body(a).unwrap().velocity.x > 0.0);
        assert!(world.body(b).unwrap().velocity.x < 0.0);
        assert_eq!(world.body(a).unwrap().force, Vec3::ZERO);
    }

    #[test]
    fn test_sphere_rests_on_heightfield() {
        let mut world = World::new(WorldConfig::default().with_gravity(Vec3::new(0.0, 0.0, -9.8)));
        world.add_body(Body::fixed().with_shape(Shape::heightfield(vec![vec![0.0; 6]; 6], 1.0).unwrap()));
        let id = world.add_body(ball(0.5, Vec3::new(2.3, 2.3, 1.0)));

        for _ in 0..180 {
            world.step(DT);
        }

        assert_abs_diff_eq!(world.body(id).unwrap().position().z, 0.5, epsilon = 2e-2);
    }

    #[test]
    fn test_sphere_rests_on_trimesh() {
        let vertices = vec![
            Vec3::new(-2.0, -2.0, 0.0),
            Vec3::new(2.0, -2.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(-2.0, 2.0, 0.0),
        ];
        let mut world = World::new(WorldConfig::default().with_gravity(Vec3::new(0.0, 0.0, -9.8)));
        world.add_body(Body::fixed().with_shape(Shape::trimesh(vertices, vec![0, 1, 2, 0, 2, 3]).unwrap()));
        let id = world.add_body(ball(0.5, Vec3::new(0.3, -0.6, 1.0)));

        for _ in 0..180 {
            world.step(DT);
        }

        assert_abs_diff_eq!(world.body(id).unwrap().position().z, 0.5, epsilon = 2e-2);
    }

    #[test]
    fn test_aabb_rebuilds_from_serialized_shape_frames() {
        let mut world = y_up_world();
        let tilt = Quat::from_axis_angle(Vec3::new(1.0, 2.0, 0.5).normalize(), 0.7);
        let mut body = Body::new(2.0)
            .with_position(Vec3::new(0.0, 4.0, 0.0))
            .with_angular_velocity(Vec3::new(0.3, 1.0, -0.4));
        body.add_shape(Shape::cuboid(Vec3::new(0.5, 0.2, 0.3)).unwrap(), Vec3::new(0.5, 0.0, 0.0), tilt);
        body.add_shape(Shape::sphere(0.25).unwrap(), Vec3::new(-0.4, 0.1, 0.0), Quat::IDENTITY);
        let id = world.add_body(body);
        for _ in 0..10 {
            world.step(DT);
        }

        let body = world.body_mut(id).unwrap();
        let cached = body.aabb();
        let frames: Vec<(Vec3, Quat)> = (0..2)
            .map(|i| (body.shape_offset(i), body.shape_orientation(i)))
            .collect();
        let json = serde_json::to_string(&(body.position(), body.rotation(), frames)).unwrap();
        let (position, rotation, frames): (Vec3, Quat, Vec<(Vec3, Quat)>) = serde_json::from_str(&json).unwrap();

        let mut rebuilt = Body::new(2.0).with_position(position).with_rotation(rotation);
        for (shape, (offset, orientation)) in body.shapes().iter().cloned().zip(frames) {
            rebuilt.add_shape(shape, offset, orientation);
        }
        let fresh = rebuilt.compute_aabb();
        for (a, b) in [(fresh.min, cached.min), (fresh.max, cached.max)] {
            assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-4);
            assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-4);
            assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_dispatch_events_in_order() {
        let mut world = World::default();
        world.add_body(ball(0.5, Vec3::ZERO));
        world.step(DT);

        let mut seen = Vec::new();
        world.dispatch_events(&mut |event: &WorldEvent| seen.push(*event));

        assert_eq!(seen, [WorldEvent::PreStep, WorldEvent::PostStep]);
        assert!(world.events().is_empty());
    }
}
