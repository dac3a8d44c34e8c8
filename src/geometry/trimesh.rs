//! Static triangle meshes with a triangle BVH

use crate::error::{PhysicsError, Result};
use crate::math::{Transform, Vec3};

use super::aabb::Aabb;
use super::bvh::Bvh;
use super::convex::{box_inertia, ConvexPolyhedron};

/// An indexed triangle soup. Triangles are counter-clockwise seen from
/// the side their normal points to.
#[derive(Debug, Clone)]
pub struct Trimesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
    tree: Bvh,
    local_aabb: Aabb,
    bounding_radius: f32,
}

impl Trimesh {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<u32>) -> Result<Self> {
        if indices.is_empty() || indices.len() % 3 != 0 {
            return Err(PhysicsError::InvalidTrimesh(format!(
                "index count must be a non-zero multiple of 3, got {}",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(PhysicsError::InvalidTrimesh(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(PhysicsError::InvalidTrimesh("vertices must be finite".into()));
        }

        let triangles: Vec<[u32; 3]> = indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        let normals = triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| vertices[i as usize]);
                (b - a).cross(c - a).normalize()
            })
            .collect();

        let mut tree = Bvh::with_margin(0.0);
        for (i, t) in triangles.iter().enumerate() {
            tree.insert(i as u32, Aabb::from_points(t.map(|i| vertices[i as usize])));
        }

        let local_aabb = Aabb::from_points(vertices.iter().copied());
        let bounding_radius = vertices.iter().map(|v| v.length()).fold(0.0, f32::max);

        log::debug!("built trimesh with {} triangles", triangles.len());
        Ok(Self {
            vertices,
            triangles,
            normals,
            tree,
            local_aabb,
            bounding_radius,
        })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Corners of triangle `index` in local space
    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        self.triangles[index].map(|i| self.vertices[i as usize])
    }

    /// Unit normal of triangle `index`; zero for degenerate triangles
    pub fn triangle_normal(&self, index: usize) -> Vec3 {
        self.normals[index]
    }

    /// Flat convex hull of one triangle plus its centroid, for the convex
    /// collision routines. `None` for degenerate triangles.
    pub fn triangle_hull(&self, index: usize) -> Option<(ConvexPolyhedron, Vec3)> {
        let [a, b, c] = self.triangle(index);
        ConvexPolyhedron::triangle(a, b, c).ok()
    }

    /// Triangles whose bounds overlap a local-space box
    pub fn triangles_in_aabb(&self, local: Aabb, out: &mut Vec<usize>) {
        self.tree.query_aabb(local, |id| out.push(id as usize));
    }

    /// Triangles whose bounds a local-space segment passes through
    pub fn triangles_on_segment(&self, from: Vec3, to: Vec3, out: &mut Vec<usize>) {
        self.tree.query_segment(from, to, |id| out.push(id as usize));
    }

    pub fn local_aabb(&self) -> Aabb {
        self.local_aabb
    }

    pub fn world_aabb(&self, frame: Transform) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|&v| frame.point_to_world(v)))
    }

    pub fn bounding_radius(&self) -> f32 {
        self.bounding_radius
    }

    pub fn local_inertia(&self, mass: f32) -> Vec3 {
        box_inertia(self.local_aabb.half_extents(), mass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Trimesh {
        let vertices = vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
        ];
        Trimesh::new(vertices, vec![0, 1, 2, 0, 2, 3]).unwrap()
    }

    #[test]
    fn test_normals_follow_winding() {
        let mesh = quad();
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.triangle_normal(0).almost_equals(Vec3::Y, 1e-6));
        assert!(mesh.triangle_normal(1).almost_equals(Vec3::Y, 1e-6));
    }

    #[test]
    fn test_rejects_bad_indices() {
        assert!(matches!(
            Trimesh::new(vec![Vec3::ZERO; 3], vec![0, 1]),
            Err(PhysicsError::InvalidTrimesh(_))
        ));
        assert!(Trimesh::new(vec![Vec3::ZERO; 3], vec![0, 1, 3]).is_err());
    }

    #[test]
    fn test_region_query() {
        let mesh = quad();
        let mut hits = Vec::new();
        mesh.triangles_in_aabb(Aabb::new(Vec3::new(2.0, -0.1, 0.0), Vec3::new(3.0, 0.1, 1.0)), &mut hits);
        assert!(hits.is_empty());

        mesh.triangles_in_aabb(Aabb::new(Vec3::splat(-0.1), Vec3::splat(0.1)), &mut hits);
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);

        hits.clear();
        mesh.triangles_on_segment(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0), &mut hits);
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn test_triangle_hull_faces_up() {
        let mesh = quad();
        let (hull, centroid) = mesh.triangle_hull(0).unwrap();
        assert!(hull.face_normals()[0].almost_equals(Vec3::Y, 1e-6));
        assert!(centroid.y.abs() < 1e-6);
    }
}
