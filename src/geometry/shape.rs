use crate::dynamics::MaterialId;
use crate::error::{PhysicsError, Result};
use crate::math::{Transform, Vec3};

use super::aabb::Aabb;
use super::convex::{box_inertia, ConvexPolyhedron};
use super::heightfield::Heightfield;
use super::trimesh::Trimesh;

/// Segment count used by [`Shape::cylinder`]
pub const DEFAULT_CYLINDER_SEGMENTS: usize = 8;

/// The type of collision shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Sphere,
    Plane,
    Box,
    ConvexPolyhedron,
    Heightfield,
    Particle,
    Cylinder,
    Trimesh,
}

/// Geometry of a collision shape, in the shape's local frame
#[derive(Debug, Clone)]
pub enum ShapeKind {
    /// A sphere defined by its radius
    Sphere(Sphere),
    /// Infinite half-space below the local XY plane; the normal is local +Z
    Plane,
    /// A box (cuboid) defined by half-extents
    Box(BoxShape),
    ConvexPolyhedron(ConvexPolyhedron),
    /// A faceted frustum along local Y
    Cylinder(Cylinder),
    Heightfield(Heightfield),
    Trimesh(Trimesh),
    /// A point with no extent
    Particle,
}

/// A sphere collision shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub radius: f32,
}

impl Sphere {
    fn world_aabb(&self, transform: Transform) -> Aabb {
        Aabb::from_center_half_extents(transform.position, Vec3::splat(self.radius))
    }

    fn inertia(&self, mass: f32) -> Vec3 {
        Vec3::splat(0.4 * mass * self.radius * self.radius)
    }
}

/// A box (cuboid) collision shape, backed by an 8-vertex hull
#[derive(Debug, Clone)]
pub struct BoxShape {
    half_extents: Vec3,
    hull: ConvexPolyhedron,
}

impl BoxShape {
    pub fn new(half_extents: Vec3) -> Result<Self> {
        Ok(Self {
            half_extents,
            hull: ConvexPolyhedron::cuboid(half_extents)?,
        })
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    #[inline]
    pub fn hull(&self) -> &ConvexPolyhedron {
        &self.hull
    }

    fn world_aabb(&self, transform: Transform) -> Aabb {
        // Sum of absolute rotated axes gives the world half extents
        let h = self.half_extents;
        let ex = transform.vector_to_world(Vec3::new(h.x, 0.0, 0.0)).abs();
        let ey = transform.vector_to_world(Vec3::new(0.0, h.y, 0.0)).abs();
        let ez = transform.vector_to_world(Vec3::new(0.0, 0.0, h.z)).abs();
        Aabb::from_center_half_extents(transform.position, ex + ey + ez)
    }
}

/// A cylinder or truncated cone approximated by a convex hull
#[derive(Debug, Clone)]
pub struct Cylinder {
    pub radius_top: f32,
    pub radius_bottom: f32,
    pub height: f32,
    pub segments: usize,
    hull: ConvexPolyhedron,
}

impl Cylinder {
    pub fn new(radius_top: f32, radius_bottom: f32, height: f32, segments: usize) -> Result<Self> {
        Ok(Self {
            radius_top,
            radius_bottom,
            height,
            segments,
            hull: ConvexPolyhedron::cylinder(radius_top, radius_bottom, height, segments)?,
        })
    }

    #[inline]
    pub fn hull(&self) -> &ConvexPolyhedron {
        &self.hull
    }

    fn inertia(&self, mass: f32) -> Vec3 {
        let r = 0.5 * (self.radius_top + self.radius_bottom);
        let h = self.height;
        let side = mass * (3.0 * r * r + h * h) / 12.0;
        Vec3::new(side, 0.5 * mass * r * r, side)
    }
}

/// A collision shape attached to a body, with its filtering and material
/// attributes.
#[derive(Debug, Clone)]
pub struct Shape {
    kind: ShapeKind,
    bounding_radius: f32,
    /// When false the shape reports overlaps but produces no contact forces
    pub collision_response: bool,
    pub collision_filter_group: u32,
    pub collision_filter_mask: u32,
    /// Overrides the owning body's material for contacts on this shape
    pub material: Option<MaterialId>,
}

impl Shape {
    fn from_kind(kind: ShapeKind) -> Self {
        Self {
            bounding_radius: bounding_radius(&kind),
            kind,
            collision_response: true,
            collision_filter_group: 1,
            collision_filter_mask: u32::MAX,
            material: None,
        }
    }

    /// Creates a sphere shape
    pub fn sphere(radius: f32) -> Result<Self> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(PhysicsError::InvalidDimensions(format!(
                "sphere radius must be positive, got {radius}"
            )));
        }
        Ok(Self::from_kind(ShapeKind::Sphere(Sphere { radius })))
    }

    /// Creates an infinite plane facing local +Z
    pub fn plane() -> Self {
        Self::from_kind(ShapeKind::Plane)
    }

    /// Creates a box shape from half-extents
    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        Ok(Self::from_kind(ShapeKind::Box(BoxShape::new(half_extents)?)))
    }

    pub fn convex(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Result<Self> {
        Ok(Self::from_kind(ShapeKind::ConvexPolyhedron(ConvexPolyhedron::new(
            vertices, faces,
        )?)))
    }

    /// Creates a cylinder along local Y with [`DEFAULT_CYLINDER_SEGMENTS`] sides
    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32) -> Result<Self> {
        Self::cylinder_with_segments(radius_top, radius_bottom, height, DEFAULT_CYLINDER_SEGMENTS)
    }

    pub fn cylinder_with_segments(radius_top: f32, radius_bottom: f32, height: f32, segments: usize) -> Result<Self> {
        Ok(Self::from_kind(ShapeKind::Cylinder(Cylinder::new(
            radius_top,
            radius_bottom,
            height,
            segments,
        )?)))
    }

    pub fn heightfield(data: Vec<Vec<f32>>, element_size: f32) -> Result<Self> {
        Ok(Self::from_kind(ShapeKind::Heightfield(Heightfield::new(data, element_size)?)))
    }

    pub fn trimesh(vertices: Vec<Vec3>, indices: Vec<u32>) -> Result<Self> {
        Ok(Self::from_kind(ShapeKind::Trimesh(Trimesh::new(vertices, indices)?)))
    }

    pub fn particle() -> Self {
        Self::from_kind(ShapeKind::Particle)
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
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

    #[inline]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Mutable access for in-place edits such as heightfield updates. The
    /// owning body must refresh its bounds afterwards.
    #[inline]
    pub fn kind_mut(&mut self) -> &mut ShapeKind {
        &mut self.kind
    }

    /// Returns the shape type
    pub fn shape_type(&self) -> ShapeType {
        match self.kind {
            ShapeKind::Sphere(_) => ShapeType::Sphere,
            ShapeKind::Plane => ShapeType::Plane,
            ShapeKind::Box(_) => ShapeType::Box,
            ShapeKind::ConvexPolyhedron(_) => ShapeType::ConvexPolyhedron,
            ShapeKind::Cylinder(_) => ShapeType::Cylinder,
            ShapeKind::Heightfield(_) => ShapeType::Heightfield,
            ShapeKind::Trimesh(_) => ShapeType::Trimesh,
            ShapeKind::Particle => ShapeType::Particle,
        }
    }

    /// Radius of a sphere around the local origin enclosing the shape
    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    /// Recomputes the bounding radius after the geometry changed
    pub fn update_bounding_radius(&mut self) {
        self.bounding_radius = bounding_radius(&self.kind);
    }

    /// The hull used by the convex collision routines, if this shape has one
    pub fn convex_hull(&self) -> Option<&ConvexPolyhedron> {
        match &self.kind {
            ShapeKind::Box(b) => Some(&b.hull),
            ShapeKind::ConvexPolyhedron(c) => Some(c),
            ShapeKind::Cylinder(c) => Some(&c.hull),
            _ => None,
        }
    }

    /// Diagonal of the local inertia tensor for the given mass.
    ///
    /// Planes, heightfields and particles contribute no rotational inertia.
    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        match &self.kind {
            ShapeKind::Sphere(s) => s.inertia(mass),
            ShapeKind::Box(b) => box_inertia(b.half_extents, mass),
            ShapeKind::ConvexPolyhedron(c) => c.local_inertia(mass),
            ShapeKind::Cylinder(c) => c.inertia(mass),
            ShapeKind::Trimesh(t) => t.local_inertia(mass),
            ShapeKind::Plane | ShapeKind::Heightfield(_) | ShapeKind::Particle => Vec3::ZERO,
        }
    }

    /// Computes the AABB of this shape given a world transform
    pub fn world_aabb(&self, transform: Transform) -> Aabb {
        match &self.kind {
            ShapeKind::Sphere(s) => s.world_aabb(transform),
            ShapeKind::Plane => plane_aabb(transform),
            ShapeKind::Box(b) => b.world_aabb(transform),
            ShapeKind::ConvexPolyhedron(c) => c.world_aabb(transform),
            ShapeKind::Cylinder(c) => c.hull.world_aabb(transform),
            ShapeKind::Heightfield(h) => h.world_aabb(transform),
            ShapeKind::Trimesh(t) => t.world_aabb(transform),
            ShapeKind::Particle => Aabb::new(transform.position, transform.position),
        }
    }
}

fn bounding_radius(kind: &ShapeKind) -> f32 {
    match kind {
        ShapeKind::Sphere(s) => s.radius,
        ShapeKind::Plane => f32::INFINITY,
        ShapeKind::Box(b) => b.half_extents.length(),
        ShapeKind::ConvexPolyhedron(c) => c.bounding_radius(),
        ShapeKind::Cylinder(c) => c.hull.bounding_radius(),
        ShapeKind::Heightfield(h) => h.bounding_radius(),
        ShapeKind::Trimesh(t) => t.bounding_radius(),
        ShapeKind::Particle => 0.0,
    }
}

/// Unbounded except along an axis-aligned normal, where the box stops at
/// the plane
fn plane_aabb(transform: Transform) -> Aabb {
    let normal = transform.vector_to_world(Vec3::Z);
    let mut min = Vec3::splat(-f32::MAX);
    let mut max = Vec3::splat(f32::MAX);
    for axis in 0..3 {
        if (normal[axis] - 1.0).abs() < 1e-6 {
            max[axis] = transform.position[axis];
        } else if (normal[axis] + 1.0).abs() < 1e-6 {
            min[axis] = transform.position[axis];
        }
    }
    Aabb::new(min, max)
}
