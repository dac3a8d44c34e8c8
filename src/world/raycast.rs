//! Segment queries against bodies and their shapes

use serde::{Deserialize, Serialize};

use crate::dynamics::{Body, BodyId};
use crate::geometry::{ConvexPolyhedron, Heightfield, Shape, ShapeKind, Trimesh};
use crate::math::{Transform, Vec3};

use super::events::ShapeKey;

/// Parallel-ray tolerance
const PRECISION: f32 = 1e-4;

/// Which hits a ray reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RayMode {
    /// The hit nearest to `from`
    #[default]
    Closest,
    /// The first hit found, in no particular order
    Any,
    /// Every hit
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaycastOptions {
    pub collision_filter_group: u32,
    pub collision_filter_mask: u32,
    /// Ignore faces whose normal points along the ray
    pub skip_backfaces: bool,
    /// Ignore bodies and shapes with collision response turned off
    pub check_collision_response: bool,
}

impl Default for RaycastOptions {
    fn default() -> Self {
        Self {
            collision_filter_group: u32::MAX,
            collision_filter_mask: u32::MAX,
            skip_backfaces: false,
            check_collision_response: true,
        }
    }
}

impl RaycastOptions {
    fn accepts(&self, group: u32, mask: u32, collision_response: bool) -> bool {
        if self.check_collision_response && !collision_response {
            return false;
        }
        self.collision_filter_group & mask != 0 && group & self.collision_filter_mask != 0
    }
}

/// A single ray hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastResult {
    pub from: Vec3,
    pub to: Vec3,
    pub hit_point: Vec3,
    pub hit_normal: Vec3,
    pub body: BodyId,
    /// Index of the hit shape within its body
    pub shape_index: usize,
    /// Hull face or mesh triangle that was hit, where the shape has one
    pub face_index: Option<usize>,
    /// Distance from `from` to the hit point
    pub distance: f32,
}

/// Collects hits according to a [`RayMode`]
#[derive(Debug)]
struct RayHits {
    mode: RayMode,
    hits: Vec<RaycastResult>,
    done: bool,
}

impl RayHits {
    fn new(mode: RayMode) -> Self {
        Self {
            mode,
            hits: Vec::new(),
            done: false,
        }
    }

    fn report(&mut self, hit: RaycastResult) {
        match self.mode {
            RayMode::All => self.hits.push(hit),
            RayMode::Closest => match self.hits.first_mut() {
                Some(best) if best.distance <= hit.distance => {}
                Some(best) => *best = hit,
                None => self.hits.push(hit),
            },
            RayMode::Any => {
                self.hits.push(hit);
                self.done = true;
            }
        }
    }
}

/// A line segment from `from` to `to` tested against bodies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub from: Vec3,
    pub to: Vec3,
    pub mode: RayMode,
    pub options: RaycastOptions,
}

impl Ray {
    pub fn new(from: Vec3, to: Vec3, mode: RayMode) -> Self {
        Self {
            from,
            to,
            mode,
            options: RaycastOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RaycastOptions) -> Self {
        self.options = options;
        self
    }

    /// Unit direction, or zero for a degenerate ray
    pub fn direction(&self) -> Vec3 {
        (self.to - self.from).try_normalize().unwrap_or(Vec3::ZERO)
    }

    pub fn length(&self) -> f32 {
        self.from.distance(self.to)
    }

    /// Casts against `bodies` in order. Bodies not yet added to a world
    /// have no id to report and are skipped.
    pub fn cast<'a>(&self, bodies: impl IntoIterator<Item = &'a Body>) -> Vec<RaycastResult> {
        let mut hits = RayHits::new(self.mode);
        if self.direction() == Vec3::ZERO {
            return hits.hits;
        }
        for body in bodies {
            if hits.done {
                break;
            }
            self.intersect_body(body, &mut hits);
        }
        hits.hits
    }

    fn intersect_body(&self, body: &Body, hits: &mut RayHits) {
        let Some(id) = body.id() else {
            return;
        };
        if !self
            .options
            .accepts(body.collision_filter_group, body.collision_filter_mask, body.collision_response)
        {
            return;
        }
        for (index, shape) in body.shapes().iter().enumerate() {
            if hits.done {
                return;
            }
            if !self
                .options
                .accepts(shape.collision_filter_group, shape.collision_filter_mask, shape.collision_response)
            {
                continue;
            }
            let key = ShapeKey { body: id, shape: index };
            self.intersect_shape(shape, body.shape_transform(index), key, hits);
        }
    }

    fn intersect_shape(&self, shape: &Shape, frame: Transform, key: ShapeKey, hits: &mut RayHits) {
        if self.from.distance(frame.position) - shape.bounding_radius() > self.length() {
            return;
        }
        match shape.kind() {
            ShapeKind::Sphere(sphere) => self.intersect_sphere(sphere.radius, frame.position, key, hits),
            ShapeKind::Plane => self.intersect_plane(frame, key, hits),
            ShapeKind::Heightfield(field) => self.intersect_heightfield(field, frame, key, hits),
            ShapeKind::Trimesh(mesh) => self.intersect_trimesh(mesh, frame, key, hits),
            ShapeKind::Particle => {}
            _ => {
                if let Some(hull) = shape.convex_hull() {
                    self.intersect_convex(hull, frame, key, hits);
                }
            }
        }
    }

    fn report(&self, hits: &mut RayHits, key: ShapeKey, hit_point: Vec3, hit_normal: Vec3, face_index: Option<usize>) {
        if self.options.skip_backfaces && hit_normal.dot(self.direction()) > 0.0 {
            return;
        }
        hits.report(RaycastResult {
            from: self.from,
            to: self.to,
            hit_point,
            hit_normal,
            body: key.body,
            shape_index: key.shape,
            face_index,
            distance: self.from.distance(hit_point),
        });
    }

    fn intersect_sphere(&self, radius: f32, center: Vec3, key: ShapeKey, hits: &mut RayHits) {
        let d = self.to - self.from;
        let m = self.from - center;
        let a = d.length_squared();
        let b = 2.0 * d.dot(m);
        let c = m.length_squared() - radius * radius;
        let delta = b * b - 4.0 * a * c;
        if delta < 0.0 {
            return;
        }

        let root = delta.sqrt();
        for t in [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)] {
            if hits.done || !(0.0..=1.0).contains(&t) {
                continue;
            }
            let point = self.from.lerp(self.to, t);
            let normal = (point - center).try_normalize().unwrap_or(-self.direction());
            self.report(hits, key, point, normal, None);
            if delta == 0.0 {
                break;
            }
        }
    }

    fn intersect_plane(&self, frame: Transform, key: ShapeKey, hits: &mut RayHits) {
        let normal = frame.rotation * Vec3::Z;
        let from_side = (self.from - frame.position).dot(normal);
        let to_side = (self.to - frame.position).dot(normal);
        if from_side * to_side > 0.0 || self.length() < from_side {
            return;
        }
        let direction = self.direction();
        let n_dot_dir = normal.dot(direction);
        if n_dot_dir.abs() < PRECISION {
            return;
        }
        let t = -from_side / n_dot_dir;
        self.report(hits, key, self.from + direction * t, normal, None);
    }

    fn intersect_convex(&self, hull: &ConvexPolyhedron, frame: Transform, key: ShapeKey, hits: &mut RayHits) {
        let direction = self.direction();
        let length = self.length();
        let vertices = hull.vertices();

        for (face_index, (face, local_normal)) in hull.faces().iter().zip(hull.face_normals()).enumerate() {
            if hits.done {
                return;
            }
            let normal = frame.vector_to_world(*local_normal);
            let dot = direction.dot(normal);
            if dot.abs() < PRECISION {
                continue;
            }
            let a = frame.point_to_world(vertices[face[0]]);
            let scalar = normal.dot(a - self.from) / dot;
            if scalar < 0.0 || scalar > length {
                continue;
            }
            let point = self.from + direction * scalar;

            let inside = face.windows(2).skip(1).any(|edge| {
                let b = frame.point_to_world(vertices[edge[0]]);
                let c = frame.point_to_world(vertices[edge[1]]);
                point_in_triangle(point, a, b, c)
            });
            if inside {
                self.report(hits, key, point, normal, Some(face_index));
            }
        }
    }

    fn intersect_heightfield(&self, field: &Heightfield, frame: Transform, key: ShapeKey, hits: &mut RayHits) {
        let from = frame.point_to_local(self.from);
        let to = frame.point_to_local(self.to);
        let Some((xs, ys)) = field.cell_range(crate::geometry::Aabb::from_points([from, to])) else {
            return;
        };
        let (_, ny) = field.size();

        for xi in xs {
            for yi in ys.clone() {
                for (upper, triangle) in field.cell_triangles(xi, yi).into_iter().enumerate() {
                    if hits.done {
                        return;
                    }
                    let Some(t) = segment_triangle(from, to - from, triangle) else {
                        continue;
                    };
                    let [a, b, c] = triangle;
                    let Some(local_normal) = (b - a).cross(c - a).try_normalize() else {
                        continue;
                    };
                    let face = 2 * (xi * (ny - 1) + yi) + upper;
                    self.report(
                        hits,
                        key,
                        self.from.lerp(self.to, t),
                        frame.vector_to_world(local_normal),
                        Some(face),
                    );
                }
            }
        }
    }

    fn intersect_trimesh(&self, mesh: &Trimesh, frame: Transform, key: ShapeKey, hits: &mut RayHits) {
        let from = frame.point_to_local(self.from);
        let to = frame.point_to_local(self.to);
        let mut triangles = Vec::new();
        mesh.triangles_on_segment(from, to, &mut triangles);
        triangles.sort_unstable();

        for index in triangles {
            if hits.done {
                return;
            }
            if let Some(t) = segment_triangle(from, to - from, mesh.triangle(index)) {
                let normal = frame.vector_to_world(mesh.triangle_normal(index));
                self.report(hits, key, self.from.lerp(self.to, t), normal, Some(index));
            }
        }
    }
}

/// Barycentric containment test, inclusive on the two edges at `a`
fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;
    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);
    let u = dot11 * dot02 - dot01 * dot12;
    let v = dot00 * dot12 - dot01 * dot02;
    u >= 0.0 && v >= 0.0 && u + v < dot00 * dot11 - dot01 * dot01
}

/// Two-sided segment/triangle test. Returns the segment parameter in
/// `[0, 1]` of the hit.
fn segment_triangle(from: Vec3, delta: Vec3, [a, b, c]: [Vec3; 3]) -> Option<f32> {
    let e1 = b - a;
    let e2 = c - a;
    let p = delta.cross(e2);
    let det = e1.dot(p);
    if det.abs() < crate::math::consts::EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = from - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = delta.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (0.0..=1.0).contains(&t).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;
    use approx::assert_abs_diff_eq;

    fn placed(mut body: Body, id: u32) -> Body {
        body.id = Some(BodyId(id));
        body
    }

    fn ball(id: u32, x: f32) -> Body {
        placed(
            Body::new(1.0)
                .with_shape(Shape::sphere(1.0).unwrap())
                .with_position(Vec3::new(x, 0.0, 0.0)),
            id,
        )
    }

    #[test]
    fn test_sphere_entry_and_exit() {
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), RayMode::All);
        let hits = ray.cast([&ball(0, 0.0)]);
        assert_eq!(hits.len(), 2);
        assert_abs_diff_eq!(hits[0].hit_point.x, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hits[0].distance, 4.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hits[0].hit_normal.x, -1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hits[1].hit_point.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_closest_picks_nearest_body() {
        let bodies = [ball(0, 4.0), ball(1, 0.0)];
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), RayMode::Closest);
        let hits = ray.cast(&bodies);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body, BodyId(1));
    }

    #[test]
    fn test_any_stops_after_first() {
        let bodies = [ball(0, 4.0), ball(1, 0.0)];
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), RayMode::Any);
        let hits = ray.cast(&bodies);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body, BodyId(0));
    }

    #[test]
    fn test_plane_hit() {
        let ground = placed(Body::fixed().with_shape(Shape::plane()), 0);
        let ray = Ray::new(Vec3::new(1.0, 2.0, 5.0), Vec3::new(1.0, 2.0, -5.0), RayMode::Closest);
        let hits = ray.cast([&ground]);
        assert_eq!(hits.len(), 1);
        assert_abs_diff_eq!(hits[0].hit_point.z, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hits[0].distance, 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(hits[0].hit_normal.z, 1.0, epsilon = 1e-6);

        let short = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0), RayMode::Closest);
        assert!(short.cast([&ground]).is_empty());
    }

    #[test]
    fn test_box_faces_and_backfaces() {
        let cube = placed(Body::new(1.0).with_shape(Shape::cuboid(Vec3::ONE).unwrap()), 3);
        let ray = Ray::new(Vec3::new(0.2, 0.3, 5.0), Vec3::new(0.2, 0.3, -5.0), RayMode::All);
        let hits = ray.cast([&cube]);
        assert_eq!(hits.len(), 2);
        assert!(hits
            .iter()
            .any(|h| h.hit_normal.z > 0.999 && (h.hit_point.z - 1.0).abs() < 1e-5));
        assert!(hits.iter().all(|h| h.face_index.is_some()));

        let options = RaycastOptions {
            skip_backfaces: true,
            ..Default::default()
        };
        let front = ray.with_options(options).cast([&cube]);
        assert_eq!(front.len(), 1);
        assert_abs_diff_eq!(front[0].distance, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotated_box() {
        let rotation = Quat::from_axis_angle(Vec3::Z, std::f32::consts::FRAC_PI_4);
        let cube = placed(
            Body::new(1.0)
                .with_shape(Shape::cuboid(Vec3::ONE).unwrap())
                .with_rotation(rotation),
            0,
        );
        let ray = Ray::new(Vec3::new(-5.0, 0.3, 0.0), Vec3::new(0.0, 0.3, 0.0), RayMode::Closest);
        let hits = ray.cast([&cube]);
        assert_eq!(hits.len(), 1);
        // Diamond edge from (-sqrt2, 0) to (0, sqrt2)
        assert_abs_diff_eq!(hits[0].hit_point.x, 0.3 - std::f32::consts::SQRT_2, epsilon = 1e-4);
        assert_abs_diff_eq!(hits[0].hit_normal.y, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-4);
    }

    #[test]
    fn test_filters_and_response() {
        let ghost = placed(
            Body::new(1.0)
                .with_shape(Shape::sphere(1.0).unwrap())
                .with_collision_response(false),
            0,
        );
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), RayMode::Closest);
        assert!(ray.cast([&ghost]).is_empty());

        let options = RaycastOptions {
            check_collision_response: false,
            ..Default::default()
        };
        assert_eq!(ray.with_options(options).cast([&ghost]).len(), 1);

        let masked = placed(
            Body::new(1.0)
                .with_shape(Shape::sphere(1.0).unwrap())
                .with_collision_filter(0b10, u32::MAX),
            1,
        );
        let options = RaycastOptions {
            collision_filter_mask: 0b01,
            ..Default::default()
        };
        assert!(ray.with_options(options).cast([&masked]).is_empty());
    }

    #[test]
    fn test_heightfield_hit() {
        let field = placed(
            Body::fixed().with_shape(Shape::heightfield(vec![vec![0.5; 4]; 4], 1.0).unwrap()),
            0,
        );
        let ray = Ray::new(Vec3::new(1.3, 1.6, 4.0), Vec3::new(1.3, 1.6, -4.0), RayMode::All);
        let hits = ray.cast([&field]);
        assert_eq!(hits.len(), 1);
        assert_abs_diff_eq!(hits[0].hit_point.z, 0.5, epsilon = 1e-5);
        assert_abs_diff_eq!(hits[0].hit_normal.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_trimesh_hit() {
        let vertices = vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ];
        let mesh = placed(
            Body::fixed()
                .with_shape(Shape::trimesh(vertices, vec![0, 1, 2, 0, 2, 3]).unwrap())
                .with_position(Vec3::new(0.0, 0.0, -1.0)),
            0,
        );
        let ray = Ray::new(Vec3::new(0.4, -0.2, 3.0), Vec3::new(0.4, -0.2, -3.0), RayMode::Closest);
        let hits = ray.cast([&mesh]);
        assert_eq!(hits.len(), 1);
        assert_abs_diff_eq!(hits[0].distance, 4.0, epsilon = 1e-5);
        assert!(hits[0].face_index.is_some());
    }

    #[test]
    fn test_particles_are_not_hit() {
        let dot = placed(Body::new(1.0).with_shape(Shape::particle()), 0);
        let ray = Ray::new(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), RayMode::All);
        assert!(ray.cast([&dot]).is_empty());
    }
}
