//! Convex polyhedra: hull validation, separating-axis tests and face clipping

use smallvec::SmallVec;

use crate::error::{PhysicsError, Result};
use crate::math::{Transform, Vec3};

use super::aabb::Aabb;

/// Vertex indices of one face, counter-clockwise seen from outside
pub type Face = SmallVec<[usize; 4]>;

/// A world-space polygon being clipped
pub type Polygon = SmallVec<[Vec3; 8]>;

/// Inside test slack when clipping against side planes
const CLIP_EPSILON: f32 = 1e-5;

/// Clipped points deeper than this above the reference face are dropped
const MAX_CONTACT_DEPTH: f32 = 1e-6;

/// Tolerance for the outward-normal check during validation
const WINDING_TOLERANCE: f32 = 1e-6;

/// A point produced by clipping an incident face against a reference face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPoint {
    /// Point on the incident face
    pub point: Vec3,
    /// Reference face normal in world space
    pub normal: Vec3,
    /// Signed distance above the reference face; negative means penetrating
    pub depth: f32,
}

/// A closed convex polyhedron in local coordinates.
///
/// Construction validates the hull: every face index must be in range,
/// every face must have a non-degenerate normal, and that normal must
/// point away from the vertex centroid.
#[derive(Debug, Clone)]
pub struct ConvexPolyhedron {
    vertices: Vec<Vec3>,
    faces: Vec<Face>,
    face_normals: Vec<Vec3>,
    unique_edges: Vec<Vec3>,
    unique_axes: Option<Vec<Vec3>>,
    bounding_radius: f32,
}

impl ConvexPolyhedron {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(PhysicsError::InvalidConvex(format!(
                "need at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if faces.is_empty() {
            return Err(PhysicsError::InvalidConvex("no faces".into()));
        }
        if let Some(bad) = vertices.iter().position(|v| !v.is_finite()) {
            return Err(PhysicsError::InvalidConvex(format!("vertex {bad} is not finite")));
        }

        let faces: Vec<Face> = faces.into_iter().map(Face::from_vec).collect();
        for (face_index, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(PhysicsError::InvalidConvex(format!(
                    "face {face_index} has only {} vertices",
                    face.len()
                )));
            }
            if let Some(&index) = face.iter().find(|&&i| i >= vertices.len()) {
                return Err(PhysicsError::FaceIndexOutOfRange {
                    face: face_index,
                    index,
                    len: vertices.len(),
                });
            }
        }

        let centroid = vertices.iter().fold(Vec3::ZERO, |acc, &v| acc + v) / vertices.len() as f32;
        let mut face_normals = Vec::with_capacity(faces.len());
        for (face_index, face) in faces.iter().enumerate() {
            let normal = polygon_normal(face.iter().map(|&i| vertices[i])).ok_or_else(|| {
                PhysicsError::InvalidConvex(format!("face {face_index} is degenerate"))
            })?;
            if normal.dot(vertices[face[0]] - centroid) < -WINDING_TOLERANCE {
                return Err(PhysicsError::InvalidConvex(format!(
                    "face {face_index} normal points inward; check the winding order"
                )));
            }
            face_normals.push(normal);
        }

        let unique_edges = compute_unique_edges(&vertices, &faces);
        let bounding_radius = vertices.iter().map(|v| v.length()).fold(0.0, f32::max);

        Ok(Self {
            vertices,
            faces,
            face_normals,
            unique_edges,
            unique_axes: None,
            bounding_radius,
        })
    }

    /// Restricts the face axes tested during SAT to the given set. Boxes use
    /// this to test three axes instead of six face normals.
    pub fn with_unique_axes(mut self, axes: Vec<Vec3>) -> Self {
        self.unique_axes = Some(axes.into_iter().map(Vec3::normalize).collect());
        self
    }

    /// Axis-aligned box with the given half extents
    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        let h = half_extents;
        if !(h.x > 0.0 && h.y > 0.0 && h.z > 0.0) {
            return Err(PhysicsError::InvalidDimensions(format!(
                "box half extents must be positive, got {h:?}"
            )));
        }
        let vertices = vec![
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
        ];
        let faces = vec![
            vec![3, 2, 1, 0], // -z
            vec![4, 5, 6, 7], // +z
            vec![5, 4, 0, 1], // -y
            vec![2, 3, 7, 6], // +y
            vec![0, 4, 7, 3], // -x
            vec![1, 2, 6, 5], // +x
        ];
        Ok(Self::new(vertices, faces)?.with_unique_axes(vec![Vec3::Z, Vec3::Y, Vec3::X]))
    }

    /// Faceted frustum along local Y, centered on the origin
    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: usize) -> Result<Self> {
        if !(radius_top > 0.0 && radius_bottom > 0.0 && height > 0.0) {
            return Err(PhysicsError::InvalidDimensions(format!(
                "cylinder radii and height must be positive, got {radius_top}/{radius_bottom}/{height}"
            )));
        }
        if segments < 3 {
            return Err(PhysicsError::InvalidDimensions(format!(
                "cylinder needs at least 3 segments, got {segments}"
            )));
        }

        let half = height * 0.5;
        let mut vertices = Vec::with_capacity(segments * 2);
        for i in 0..segments {
            let theta = std::f32::consts::TAU * i as f32 / segments as f32;
            let (s, c) = theta.sin_cos();
            vertices.push(Vec3::new(radius_bottom * c, -half, radius_bottom * s));
            vertices.push(Vec3::new(radius_top * c, half, radius_top * s));
        }

        let bottom = |i: usize| 2 * (i % segments);
        let top = |i: usize| 2 * (i % segments) + 1;

        let mut faces = Vec::with_capacity(segments + 2);
        faces.push((0..segments).map(bottom).collect());
        faces.push((0..segments).rev().map(top).collect());
        for i in 0..segments {
            faces.push(vec![bottom(i), top(i), top(i + 1), bottom(i + 1)]);
        }
        Self::new(vertices, faces)
    }

    /// A flat two-sided hull for one triangle, expressed relative to its
    /// centroid. Returns the hull and the centroid.
    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Result<(Self, Vec3)> {
        let centroid = (a + b + c) / 3.0;
        let vertices = vec![a - centroid, b - centroid, c - centroid];
        let hull = Self::new(vertices, vec![vec![0, 1, 2], vec![2, 1, 0]])?;
        Ok((hull, centroid))
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    #[inline]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    #[inline]
    pub fn face_normals(&self) -> &[Vec3] {
        &self.face_normals
    }

    #[inline]
    pub fn unique_edges(&self) -> &[Vec3] {
        &self.unique_edges
    }

    #[inline]
    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().copied())
    }

    /// Box approximation of the inertia from the local bounds
    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        box_inertia(self.local_aabb().half_extents(), mass)
    }

    pub fn world_aabb(&self, frame: Transform) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|&v| frame.point_to_world(v)))
    }

    /// True when the local point lies strictly behind every face plane
    pub fn contains_point(&self, local: Vec3) -> bool {
        self.faces
            .iter()
            .zip(&self.face_normals)
            .all(|(face, n)| n.dot(local - self.vertices[face[0]]) < 0.0)
    }

    /// World-space interval of the hull projected on `axis`
    pub fn project(&self, frame: Transform, axis: Vec3) -> (f32, f32) {
        let local_axis = frame.vector_to_local(axis);
        let offset = frame.position.dot(axis);
        let (min, max) = self
            .vertices
            .iter()
            .map(|v| v.dot(local_axis))
            .fold((f32::MAX, f32::MIN), |(lo, hi), d| (lo.min(d), hi.max(d)));
        (min + offset, max + offset)
    }

    /// Overlap of both hulls along `axis`, or `None` when they are apart
    pub fn overlap_depth(&self, frame_a: Transform, other: &Self, frame_b: Transform, axis: Vec3) -> Option<f32> {
        let (min_a, max_a) = self.project(frame_a, axis);
        let (min_b, max_b) = other.project(frame_b, axis);
        if max_a < min_b || max_b < min_a {
            return None;
        }
        Some((max_a - min_b).min(max_b - min_a))
    }

    fn face_axes(&self) -> &[Vec3] {
        self.unique_axes.as_deref().unwrap_or(&self.face_normals)
    }

    /// Finds the axis of least penetration between two hulls.
    ///
    /// Tests the face axes of both hulls and then the cross products of
    /// their edges. Returns `None` as soon as one axis separates them. The
    /// returned axis points from B towards A.
    pub fn find_separating_axis(&self, frame_a: Transform, other: &Self, frame_b: Transform) -> Option<Vec3> {
        let mut best_depth = f32::MAX;
        let mut best_axis = None;

        let face_axes = self
            .face_axes()
            .iter()
            .map(|&n| frame_a.vector_to_world(n))
            .chain(other.face_axes().iter().map(|&n| frame_b.vector_to_world(n)));
        for axis in face_axes {
            let depth = self.overlap_depth(frame_a, other, frame_b, axis)?;
            if depth < best_depth {
                best_depth = depth;
                best_axis = Some(axis);
            }
        }

        for &edge_a in &self.unique_edges {
            let world_a = frame_a.vector_to_world(edge_a);
            for &edge_b in &other.unique_edges {
                let cross = world_a.cross(frame_b.vector_to_world(edge_b));
                if cross.almost_zero(1e-6) {
                    continue;
                }
                let axis = cross.normalize();
                let depth = self.overlap_depth(frame_a, other, frame_b, axis)?;
                if depth < best_depth {
                    best_depth = depth;
                    best_axis = Some(axis);
                }
            }
        }

        let axis = best_axis?;
        if (frame_b.position - frame_a.position).dot(axis) > 0.0 {
            Some(-axis)
        } else {
            Some(axis)
        }
    }

    /// Clips B's face most aligned with `separating_normal` against this
    /// hull's reference face and appends the surviving points to `out`.
    ///
    /// `separating_normal` must point from B towards A.
    pub fn clip_against_hull(
        &self,
        frame_a: Transform,
        other: &Self,
        frame_b: Transform,
        separating_normal: Vec3,
        min_dist: f32,
        max_dist: f32,
        out: &mut SmallVec<[ClipPoint; 8]>,
    ) {
        let mut incident = None;
        let mut best = f32::MIN;
        for (i, &n) in other.face_normals.iter().enumerate() {
            let d = frame_b.vector_to_world(n).dot(separating_normal);
            if d > best {
                best = d;
                incident = Some(i);
            }
        }
        let Some(incident) = incident else {
            return;
        };

        let polygon: Polygon = other.faces[incident]
            .iter()
            .map(|&i| frame_b.point_to_world(other.vertices[i]))
            .collect();
        self.clip_face_against_hull(frame_a, separating_normal, polygon, min_dist, max_dist, out);
    }

    /// Clips a world-space polygon against the side planes of this hull's
    /// reference face, the face whose normal is most opposed to
    /// `separating_normal`.
    pub fn clip_face_against_hull(
        &self,
        frame_a: Transform,
        separating_normal: Vec3,
        polygon: Polygon,
        min_dist: f32,
        max_dist: f32,
        out: &mut SmallVec<[ClipPoint; 8]>,
    ) {
        let mut reference = None;
        let mut best = f32::MAX;
        for (i, &n) in self.face_normals.iter().enumerate() {
            let d = frame_a.vector_to_world(n).dot(separating_normal);
            if d < best {
                best = d;
                reference = Some(i);
            }
        }
        let Some(reference) = reference else {
            return;
        };

        let face = &self.faces[reference];
        let ref_normal = frame_a.vector_to_world(self.face_normals[reference]);

        let mut input = polygon;
        let mut output = Polygon::new();
        for k in 0..face.len() {
            let a = frame_a.point_to_world(self.vertices[face[k]]);
            let b = frame_a.point_to_world(self.vertices[face[(k + 1) % face.len()]]);
            let Some(side) = (b - a).cross(ref_normal).try_normalize() else {
                continue;
            };
            output.clear();
            clip_polygon_against_plane(&input, &mut output, side, -side.dot(a));
            std::mem::swap(&mut input, &mut output);
            if input.is_empty() {
                return;
            }
        }

        let plane_constant = -ref_normal.dot(frame_a.point_to_world(self.vertices[face[0]]));
        for point in input {
            let depth = (ref_normal.dot(point) + plane_constant).max(min_dist);
            if depth <= max_dist && depth <= MAX_CONTACT_DEPTH {
                out.push(ClipPoint {
                    point,
                    normal: ref_normal,
                    depth,
                });
            }
        }
    }
}

/// Sutherland-Hodgman step: keeps the part of `input` on the negative side
/// of the plane `normal . p + constant = 0`.
pub fn clip_polygon_against_plane(input: &[Vec3], output: &mut Polygon, normal: Vec3, constant: f32) {
    let Some(&last) = input.last() else {
        return;
    };
    if input.len() < 2 {
        return;
    }

    let distance = |p: Vec3| normal.dot(p) + constant - CLIP_EPSILON;
    let mut first = last;
    let mut d_first = distance(first);
    for &next in input {
        let d_next = distance(next);
        if d_first <= 0.0 {
            if d_next <= 0.0 {
                output.push(next);
            } else {
                output.push(first.lerp(next, d_first / (d_first - d_next)));
            }
        } else if d_next <= 0.0 {
            output.push(first.lerp(next, d_first / (d_first - d_next)));
            output.push(next);
        }
        first = next;
        d_first = d_next;
    }
}

/// True when `point` lies inside the convex polygon, given its normal.
/// Points on an edge count as inside.
pub fn point_in_polygon(vertices: &[Vec3], normal: Vec3, point: Vec3) -> bool {
    let mut sign = 0.0f32;
    for (i, &v) in vertices.iter().enumerate() {
        let next = vertices[(i + 1) % vertices.len()];
        let r = (next - v).cross(normal).dot(point - v);
        if r.abs() < 1e-7 {
            continue;
        }
        if sign == 0.0 {
            sign = r.signum();
        } else if sign != r.signum() {
            return false;
        }
    }
    true
}

/// Solid-box inertia diagonal for the given half extents
pub fn box_inertia(half_extents: Vec3, mass: f32) -> Vec3 {
    let h = half_extents;
    let k = mass / 3.0;
    Vec3::new(k * (h.y * h.y + h.z * h.z), k * (h.x * h.x + h.z * h.z), k * (h.x * h.x + h.y * h.y))
}

/// Newell normal of a planar polygon, counter-clockwise orientation
fn polygon_normal(points: impl Iterator<Item = Vec3> + Clone) -> Option<Vec3> {
    let mut normal = Vec3::ZERO;
    let first = points.clone().next()?;
    let mut prev = first;
    for p in points.skip(1).chain(std::iter::once(first)) {
        normal.x += (prev.y - p.y) * (prev.z + p.z);
        normal.y += (prev.z - p.z) * (prev.x + p.x);
        normal.z += (prev.x - p.x) * (prev.y + p.y);
        prev = p;
    }
    normal.try_normalize()
}

fn compute_unique_edges(vertices: &[Vec3], faces: &[Face]) -> Vec<Vec3> {
    let mut edges: Vec<Vec3> = Vec::new();
    for face in faces {
        for k in 0..face.len() {
            let a = vertices[face[k]];
            let b = vertices[face[(k + 1) % face.len()]];
            let Some(edge) = (b - a).try_normalize() else {
                continue;
            };
            let known = edges
                .iter()
                .any(|&e| e.almost_equals(edge, 1e-6) || e.almost_equals(-edge, 1e-6));
            if !known {
                edges.push(edge);
            }
        }
    }
    edges
}
