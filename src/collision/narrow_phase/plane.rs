//! Planes against vertex-based shapes

use crate::collision::contact::ContactSink;
use crate::geometry::{ConvexPolyhedron, Trimesh};
use crate::math::{Transform, Vec3};

/// Pushes a contact for every world vertex on or behind the plane
fn vertices_behind_plane(
    plane: Transform,
    vertices: impl Iterator<Item = Vec3>,
    sink: &mut ContactSink,
) -> bool {
    let normal = plane.vector_to_world(Vec3::Z);
    let mut found = false;
    for vertex in vertices {
        let height = (vertex - plane.position).dot(normal);
        if height > 0.0 {
            continue;
        }
        if sink.just_test() {
            return true;
        }
        found = true;
        sink.push(vertex - normal * height, vertex, normal);
    }
    found
}

pub fn plane_convex(plane: Transform, hull: &ConvexPolyhedron, frame_b: Transform, sink: &mut ContactSink) -> bool {
    vertices_behind_plane(plane, hull.vertices().iter().map(|&v| frame_b.point_to_world(v)), sink)
}

pub fn plane_trimesh(plane: Transform, mesh: &Trimesh, frame_b: Transform, sink: &mut ContactSink) -> bool {
    vertices_behind_plane(plane, mesh.vertices().iter().map(|&v| frame_b.point_to_world(v)), sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_resting_box_touches_with_four_corners() {
        let hull = ConvexPolyhedron::cuboid(Vec3::splat(0.5)).unwrap();
        let frame = Transform::new(Vec3::new(0.0, 0.0, 0.45), Quat::IDENTITY);
        let mut sink = ContactSink::new(false);

        assert!(plane_convex(Transform::IDENTITY, &hull, frame, &mut sink));
        assert_eq!(sink.len(), 4);
        for p in sink.points() {
            assert_eq!(p.normal, Vec3::Z);
            assert_abs_diff_eq!(p.depth(), 0.05, epsilon = 1e-6);
            assert_abs_diff_eq!(p.point_a.z, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_tilted_plane() {
        let hull = ConvexPolyhedron::cuboid(Vec3::splat(0.5)).unwrap();
        let tilt = Quat::from_axis_angle(Vec3::X, 0.3);
        let plane = Transform::new(Vec3::ZERO, tilt);
        let above = Transform::new(tilt * Vec3::new(0.0, 0.0, 2.0), tilt);

        assert!(!plane_convex(plane, &hull, above, &mut ContactSink::new(false)));
    }

    #[test]
    fn test_trimesh_vertices() {
        let mesh = Trimesh::new(
            vec![Vec3::new(0.0, 0.0, -0.1), Vec3::new(1.0, 0.0, 0.2), Vec3::new(0.0, 1.0, -0.2)],
            vec![0, 1, 2],
        )
        .unwrap();
        let mut sink = ContactSink::new(false);
        assert!(plane_trimesh(Transform::IDENTITY, &mesh, Transform::IDENTITY, &mut sink));
        assert_eq!(sink.len(), 2);
    }
}
