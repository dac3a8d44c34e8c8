use serde::{Deserialize, Serialize};

use crate::geometry::{box_inertia, Aabb, Shape};
use crate::math::{Mat3, Quat, Transform, Vec3};

use super::material::MaterialId;

/// Stable identifier of a body inside a [`World`](crate::world::World)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub u32);

/// The type of rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Dynamic bodies are affected by forces and collisions
    #[default]
    Dynamic,
    /// Static bodies never move
    Static,
    /// Kinematic bodies move according to their velocity but aren't affected by forces
    Kinematic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SleepState {
    #[default]
    Awake,
    /// Slow enough to sleep; waiting out the sleep time limit
    Sleepy,
    Sleeping,
}

/// A sleep state change reported by [`Body::sleep_tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTransition {
    Sleepy,
    Sleep,
    /// A sleeping body was given a speed above its limit
    WakeUp,
}

/// A rigid body in the physics simulation
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) id: Option<BodyId>,
    body_type: BodyType,

    pub(crate) position: Vec3,
    pub(crate) quaternion: Quat,
    pub(crate) previous_position: Vec3,
    pub(crate) previous_quaternion: Quat,
    pub(crate) interpolated_position: Vec3,
    pub(crate) interpolated_quaternion: Quat,

    /// Linear velocity
    pub velocity: Vec3,
    /// Angular velocity (in radians per second)
    pub angular_velocity: Vec3,
    /// Accumulated force (reset each step)
    pub force: Vec3,
    /// Accumulated torque (reset each step)
    pub torque: Vec3,

    mass: f32,
    inv_mass: f32,
    inertia: Vec3,
    inv_inertia: Vec3,
    inv_inertia_world: Mat3,
    fixed_rotation: bool,

    /// Per-axis multiplier on linear motion; zero locks an axis
    pub linear_factor: Vec3,
    /// Per-axis multiplier on angular motion; zero locks an axis
    pub angular_factor: Vec3,
    /// Fraction of linear velocity lost per second
    pub linear_damping: f32,
    /// Fraction of angular velocity lost per second
    pub angular_damping: f32,

    pub material: Option<MaterialId>,
    pub collision_filter_group: u32,
    pub collision_filter_mask: u32,
    /// When false, contacts are detected and reported but never resolved
    pub collision_response: bool,
    /// Triggers report overlaps and never produce contact forces
    pub is_trigger: bool,

    pub allow_sleep: bool,
    pub sleep_speed_limit: f32,
    pub sleep_time_limit: f32,
    sleep_state: SleepState,
    /// Time at which the body last started moving slower than the limit
    slow_since: Option<f32>,
    pub(crate) wake_up_after_narrowphase: bool,

    shapes: Vec<Shape>,
    shape_offsets: Vec<Vec3>,
    shape_orientations: Vec<Quat>,
    bounding_radius: f32,
    aabb: Aabb,
    pub(crate) aabb_needs_update: bool,

    // Solver scratch, valid during one step
    pub(crate) inv_mass_solve: f32,
    pub(crate) inv_inertia_world_solve: Mat3,
    pub(crate) vlambda: Vec3,
    pub(crate) wlambda: Vec3,
}

impl Default for Body {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Body {
    /// Creates a body of the given mass. A positive mass makes it dynamic,
    /// zero makes it static.
    pub fn new(mass: f32) -> Self {
        let body_type = if mass > 0.0 {
            BodyType::Dynamic
        } else {
            BodyType::Static
        };
        let mut body = Self {
            id: None,
            body_type,
            position: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
            previous_position: Vec3::ZERO,
            previous_quaternion: Quat::IDENTITY,
            interpolated_position: Vec3::ZERO,
            interpolated_quaternion: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass: mass.max(0.0),
            inv_mass: 0.0,
            inertia: Vec3::ZERO,
            inv_inertia: Vec3::ZERO,
            inv_inertia_world: Mat3::ZERO,
            fixed_rotation: false,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            linear_damping: 0.01,
            angular_damping: 0.01,
            material: None,
            collision_filter_group: 1,
            collision_filter_mask: u32::MAX,
            collision_response: true,
            is_trigger: false,
            allow_sleep: true,
            sleep_speed_limit: 0.1,
            sleep_time_limit: 1.0,
            sleep_state: SleepState::Awake,
            slow_since: None,
            wake_up_after_narrowphase: false,
            shapes: Vec::new(),
            shape_offsets: Vec::new(),
            shape_orientations: Vec::new(),
            bounding_radius: 0.0,
            aabb: Aabb::EMPTY,
            aabb_needs_update: true,
            inv_mass_solve: 0.0,
            inv_inertia_world_solve: Mat3::ZERO,
            vlambda: Vec3::ZERO,
            wlambda: Vec3::ZERO,
        };
        body.update_mass_properties();
        body
    }

    /// Creates a dynamic body. A non-positive mass still yields a dynamic
    /// body, but one that forces cannot move.
    pub fn dynamic(mass: f32) -> Self {
        let mut body = Self::new(mass);
        body.set_type(BodyType::Dynamic);
        body
    }

    /// Creates a static body
    pub fn fixed() -> Self {
        Self::new(0.0)
    }

    /// Creates a kinematic body, moved only by its velocity
    pub fn kinematic() -> Self {
        let mut body = Self::new(0.0);
        body.set_type(BodyType::Kinematic);
        body
    }

    /// Sets the position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    /// Sets the rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.set_quaternion(rotation);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Attaches a shape at the body origin
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.add_shape(shape, Vec3::ZERO, Quat::IDENTITY);
        self
    }

    /// Attaches a shape with a local offset and orientation
    pub fn with_shape_at(mut self, shape: Shape, offset: Vec3, orientation: Quat) -> Self {
        self.add_shape(shape, offset, orientation);
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    /// Sets linear damping
    pub fn with_linear_damping(mut self, damping: f32) -> Self {
        self.linear_damping = damping.clamp(0.0, 1.0);
        self
    }

    /// Sets angular damping
    pub fn with_angular_damping(mut self, damping: f32) -> Self {
        self.angular_damping = damping.clamp(0.0, 1.0);
        self
    }

    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_filter_group = group;
        self.collision_filter_mask = mask;
        self
    }

    pub fn with_collision_response(mut self, collision_response: bool) -> Self {
        self.collision_response = collision_response;
        self
    }

    pub fn with_trigger(mut self, is_trigger: bool) -> Self {
        self.is_trigger = is_trigger;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed_rotation: bool) -> Self {
        self.fixed_rotation = fixed_rotation;
        self.update_mass_properties();
        self
    }

    pub fn with_linear_factor(mut self, factor: Vec3) -> Self {
        self.linear_factor = factor;
        self
    }

    pub fn with_angular_factor(mut self, factor: Vec3) -> Self {
        self.angular_factor = factor;
        self
    }

    pub fn with_allow_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub fn with_sleep_limits(mut self, speed_limit: f32, time_limit: f32) -> Self {
        self.sleep_speed_limit = speed_limit;
        self.sleep_time_limit = time_limit;
        self
    }

    /// The world-assigned id, once the body has been added
    #[inline]
    pub fn id(&self) -> Option<BodyId> {
        self.id
    }

    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Changes the body type and refreshes the mass properties
    pub fn set_type(&mut self, body_type: BodyType) {
        self.body_type = body_type;
        self.update_mass_properties();
    }

    /// Returns true if this is a dynamic body
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Returns true if this is a static body
    #[inline]
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    /// Returns true if this is a kinematic body
    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.body_type == BodyType::Kinematic
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Teleports the body. Interpolation history is reset too.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.previous_position = position;
        self.interpolated_position = position;
        self.aabb_needs_update = true;
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.quaternion
    }

    /// Reorients the body. Interpolation history is reset too.
    pub fn set_quaternion(&mut self, rotation: Quat) {
        self.quaternion = rotation.normalize();
        self.previous_quaternion = self.quaternion;
        self.interpolated_quaternion = self.quaternion;
        self.aabb_needs_update = true;
        self.update_inertia_world();
    }

    /// Position at the end of the previous internal step
    #[inline]
    pub fn previous_position(&self) -> Vec3 {
        self.previous_position
    }

    /// Position blended between the last two internal steps by the
    /// leftover time of an accumulated step
    #[inline]
    pub fn interpolated_position(&self) -> Vec3 {
        self.interpolated_position
    }

    #[inline]
    pub fn interpolated_quaternion(&self) -> Quat {
        self.interpolated_quaternion
    }

    /// Returns the transform of this body
    #[inline]
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.quaternion)
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(0.0);
        self.update_mass_properties();
    }

    /// Inverse mass; zero for anything that is not dynamic
    #[inline]
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    #[inline]
    pub fn inertia(&self) -> Vec3 {
        self.inertia
    }

    #[inline]
    pub fn inv_inertia(&self) -> Vec3 {
        self.inv_inertia
    }

    #[inline]
    pub fn inv_inertia_world(&self) -> Mat3 {
        self.inv_inertia_world
    }

    #[inline]
    pub fn fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn set_fixed_rotation(&mut self, fixed_rotation: bool) {
        self.fixed_rotation = fixed_rotation;
        self.update_mass_properties();
    }

    /// Recomputes inverse mass and inertia from the mass and shapes.
    ///
    /// A single shape at the origin uses its own inertia. Compound bodies
    /// approximate the inertia with the box of their local bounds.
    pub fn update_mass_properties(&mut self) {
        self.inv_mass = if self.is_dynamic() && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        };

        self.inertia = match self.shapes.as_slice() {
            [] => Vec3::ZERO,
            [shape] if self.shape_offsets[0] == Vec3::ZERO && self.shape_orientations[0] == Quat::IDENTITY => {
                shape.local_inertia(self.mass)
            }
            _ => box_inertia(self.local_aabb().half_extents(), self.mass),
        };

        let rotates = !self.fixed_rotation && self.is_dynamic();
        let invert = |i: f32| {
            if i > 0.0 && rotates {
                1.0 / i
            } else {
                0.0
            }
        };
        self.inv_inertia = Vec3::new(invert(self.inertia.x), invert(self.inertia.y), invert(self.inertia.z));
        self.update_inertia_world();
    }

    /// Updates the world space inverse inertia tensor
    pub fn update_inertia_world(&mut self) {
        self.inv_inertia_world = Mat3::rotated_diagonal(self.quaternion, self.inv_inertia);
    }

    /// Inverse mass and inertia as seen by the solver this step. Sleeping
    /// and kinematic bodies act as immovable.
    pub(crate) fn update_solve_mass_properties(&mut self) {
        if self.sleep_state == SleepState::Sleeping || self.is_kinematic() {
            self.inv_mass_solve = 0.0;
            self.inv_inertia_world_solve = Mat3::ZERO;
        } else {
            self.inv_mass_solve = self.inv_mass;
            self.inv_inertia_world_solve = self.inv_inertia_world;
        }
    }

    pub fn add_shape(&mut self, shape: Shape, offset: Vec3, orientation: Quat) -> usize {
        self.shapes.push(shape);
        self.shape_offsets.push(offset);
        self.shape_orientations.push(orientation.normalize());
        self.shapes_changed();
        self.shapes.len() - 1
    }

    pub fn remove_shape(&mut self, index: usize) -> Option<Shape> {
        if index >= self.shapes.len() {
            log::warn!("remove_shape: no shape at index {index}");
            return None;
        }
        let shape = self.shapes.remove(index);
        self.shape_offsets.remove(index);
        self.shape_orientations.remove(index);
        self.shapes_changed();
        Some(shape)
    }

    #[inline]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Edits a shape in place, then refreshes bounds and mass properties
    pub fn modify_shape<R>(&mut self, index: usize, edit: impl FnOnce(&mut Shape) -> R) -> Option<R> {
        let shape = self.shapes.get_mut(index)?;
        let result = edit(shape);
        shape.update_bounding_radius();
        self.shapes_changed();
        Some(result)
    }

    #[inline]
    pub fn shape_offset(&self, index: usize) -> Vec3 {
        self.shape_offsets[index]
    }

    #[inline]
    pub fn shape_orientation(&self, index: usize) -> Quat {
        self.shape_orientations[index]
    }

    /// World frame of shape `index`
    #[inline]
    pub fn shape_transform(&self, index: usize) -> Transform {
        self.transform()
            .compose(self.shape_offsets[index], self.shape_orientations[index])
    }

    fn shapes_changed(&mut self) {
        self.bounding_radius = self
            .shapes
            .iter()
            .zip(&self.shape_offsets)
            .map(|(s, o)| s.bounding_radius() + o.length())
            .fold(0.0, f32::max);
        self.aabb_needs_update = true;
        self.update_mass_properties();
    }

    /// Radius of a sphere around the body origin enclosing every shape
    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    fn local_aabb(&self) -> Aabb {
        (0..self.shapes.len()).fold(Aabb::EMPTY, |acc, i| {
            let frame = Transform::new(self.shape_offsets[i], self.shape_orientations[i]);
            acc.union(self.shapes[i].world_aabb(frame))
        })
    }

    /// World bounds of all shapes, computed fresh
    pub fn compute_aabb(&self) -> Aabb {
        (0..self.shapes.len()).fold(Aabb::EMPTY, |acc, i| {
            acc.union(self.shapes[i].world_aabb(self.shape_transform(i)))
        })
    }

    /// World bounds, refreshed if the body moved since the last call
    pub fn aabb(&mut self) -> Aabb {
        if self.aabb_needs_update {
            self.aabb = self.compute_aabb();
            self.aabb_needs_update = false;
        }
        self.aabb
    }

    /// World bounds without touching the cache
    pub fn current_aabb(&self) -> Aabb {
        if self.aabb_needs_update {
            self.compute_aabb()
        } else {
            self.aabb
        }
    }

    pub fn point_to_local_frame(&self, world: Vec3) -> Vec3 {
        self.transform().point_to_local(world)
    }

    pub fn point_to_world_frame(&self, local: Vec3) -> Vec3 {
        self.transform().point_to_world(local)
    }

    pub fn vector_to_local_frame(&self, world: Vec3) -> Vec3 {
        self.transform().vector_to_local(world)
    }

    pub fn vector_to_world_frame(&self, local: Vec3) -> Vec3 {
        self.transform().vector_to_world(local)
    }

    /// Translational plus rotational kinetic energy
    pub fn kinetic_energy(&self) -> f32 {
        let w = self.angular_velocity;
        let rotational = w.x * w.x * self.inertia.x + w.y * w.y * self.inertia.y + w.z * w.z * self.inertia.z;
        0.5 * (self.mass * self.velocity.length_squared() + rotational)
    }

    /// Velocity of a world point rigidly attached to the body
    pub fn velocity_at_world_point(&self, point: Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(point - self.position)
    }

    fn accepts_forces(&mut self) -> bool {
        if !self.is_dynamic() {
            return false;
        }
        if self.sleep_state == SleepState::Sleeping {
            self.wake_up();
        }
        true
    }

    /// Applies a force at the center of mass
    pub fn apply_force(&mut self, force: Vec3) {
        if self.accepts_forces() {
            self.force += force;
        }
    }

    /// Applies a force at a point given relative to the center of mass,
    /// in world orientation
    pub fn apply_force_at(&mut self, force: Vec3, relative_point: Vec3) {
        if self.accepts_forces() {
            self.force += force;
            self.torque += relative_point.cross(force);
        }
    }

    /// Like [`Body::apply_force_at`] with both vectors in the body frame
    pub fn apply_local_force(&mut self, local_force: Vec3, local_point: Vec3) {
        let force = self.vector_to_world_frame(local_force);
        let point = self.vector_to_world_frame(local_point);
        self.apply_force_at(force, point);
    }

    /// Applies a torque
    pub fn apply_torque(&mut self, torque: Vec3) {
        if self.accepts_forces() {
            self.torque += torque;
        }
    }

    /// Applies an impulse at the center of mass
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.accepts_forces() {
            self.velocity += impulse * self.inv_mass;
        }
    }

    /// Applies an impulse at a point relative to the center of mass
    pub fn apply_impulse_at(&mut self, impulse: Vec3, relative_point: Vec3) {
        if self.accepts_forces() {
            self.velocity += impulse * self.inv_mass;
            self.angular_velocity += self.inv_inertia_world * relative_point.cross(impulse);
        }
    }

    pub fn apply_local_impulse(&mut self, local_impulse: Vec3, local_point: Vec3) {
        let impulse = self.vector_to_world_frame(local_impulse);
        let point = self.vector_to_world_frame(local_point);
        self.apply_impulse_at(impulse, point);
    }

    /// Clears accumulated forces
    pub fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    #[inline]
    pub fn sleep_state(&self) -> SleepState {
        self.sleep_state
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    /// Wakes up the body. Returns true if it was asleep.
    pub fn wake_up(&mut self) -> bool {
        let was_sleeping = self.sleep_state == SleepState::Sleeping;
        self.sleep_state = SleepState::Awake;
        self.slow_since = None;
        self.wake_up_after_narrowphase = false;
        was_sleeping
    }

    /// Puts the body to sleep
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.slow_since = None;
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.wake_up_after_narrowphase = false;
    }

    /// Advances the sleep state machine at simulation time `time`.
    ///
    /// A body turns sleepy once it has stayed below the speed limit for
    /// longer than the time limit, and falls asleep after staying slow for
    /// that long again. Speeding up resets it to awake.
    pub fn sleep_tick(&mut self, time: f32) -> Option<SleepTransition> {
        if !self.allow_sleep || !self.is_dynamic() {
            return None;
        }

        let speed_squared = self.velocity.length_squared() + self.angular_velocity.length_squared();
        let limit_squared = self.sleep_speed_limit * self.sleep_speed_limit;
        if speed_squared >= limit_squared {
            return self.wake_up().then_some(SleepTransition::WakeUp);
        }
        if self.is_sleeping() {
            return None;
        }

        let Some(since) = self.slow_since else {
            self.slow_since = Some(time);
            return None;
        };
        if time - since <= self.sleep_time_limit {
            return None;
        }
        match self.sleep_state {
            SleepState::Awake => {
                self.sleep_state = SleepState::Sleepy;
                self.slow_since = Some(time);
                Some(SleepTransition::Sleepy)
            }
            _ => {
                self.sleep();
                Some(SleepTransition::Sleep)
            }
        }
    }
}
