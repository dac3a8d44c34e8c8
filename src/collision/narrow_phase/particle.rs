//! Particles are points: they collide only by lying inside another shape

use crate::collision::contact::ContactSink;
use crate::geometry::ConvexPolyhedron;
use crate::math::{Transform, Vec3};

pub fn sphere_particle(radius: f32, frame_a: Transform, particle: Vec3, sink: &mut ContactSink) -> bool {
    let center = frame_a.position;
    if center.distance_squared(particle) > radius * radius {
        return false;
    }
    if sink.just_test() {
        return true;
    }
    let normal = (particle - center).try_normalize().unwrap_or(Vec3::Y);
    sink.push(center + normal * radius, particle, normal);
    true
}

pub fn plane_particle(plane: Transform, particle: Vec3, sink: &mut ContactSink) -> bool {
    let normal = plane.vector_to_world(Vec3::Z);
    let height = (particle - plane.position).dot(normal);
    if height > 0.0 {
        return false;
    }
    if sink.just_test() {
        return true;
    }
    sink.push(particle - normal * height, particle, normal);
    true
}

/// The particle is pushed out through the face it is closest to
pub fn convex_particle(hull: &ConvexPolyhedron, frame_a: Transform, particle: Vec3, sink: &mut ContactSink) -> bool {
    if !hull.contains_point(frame_a.point_to_local(particle)) {
        return false;
    }
    if sink.just_test() {
        return true;
    }

    let vertices = hull.vertices();
    let nearest = hull
        .faces()
        .iter()
        .zip(hull.face_normals())
        .map(|(face, &n)| {
            let normal = frame_a.vector_to_world(n);
            let depth = -normal.dot(particle - frame_a.point_to_world(vertices[face[0]]));
            (normal, depth)
        })
        .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));

    match nearest {
        Some((normal, depth)) => {
            sink.push(particle + normal * depth, particle, normal);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Quat;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_particle_in_sphere() {
        let mut sink = ContactSink::new(false);
        assert!(sphere_particle(1.0, Transform::IDENTITY, Vec3::new(0.0, 0.8, 0.0), &mut sink));
        let p = sink.points()[0];
        assert_eq!(p.normal, Vec3::Y);
        assert_abs_diff_eq!(p.depth(), 0.2, epsilon = 1e-6);

        assert!(!sphere_particle(1.0, Transform::IDENTITY, Vec3::new(0.0, 1.2, 0.0), &mut sink));
    }

    #[test]
    fn test_particle_below_plane() {
        let mut sink = ContactSink::new(false);
        assert!(plane_particle(Transform::IDENTITY, Vec3::new(3.0, -2.0, -0.25), &mut sink));
        let p = sink.points()[0];
        assert_eq!(p.point_a, Vec3::new(3.0, -2.0, 0.0));
        assert_abs_diff_eq!(p.depth(), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_particle_leaves_through_nearest_face() {
        let hull = ConvexPolyhedron::cuboid(Vec3::ONE).unwrap();
        let frame = Transform::new(Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY);
        let mut sink = ContactSink::new(false);

        assert!(convex_particle(&hull, frame, Vec3::new(10.2, 0.0, 0.9), &mut sink));
        let p = sink.points()[0];
        assert!(p.normal.almost_equals(Vec3::Z, 1e-6));
        assert_abs_diff_eq!(p.depth(), 0.1, epsilon = 1e-5);
        assert!(p.point_a.almost_equals(Vec3::new(10.2, 0.0, 1.0), 1e-5));

        assert!(!convex_particle(&hull, frame, Vec3::new(0.0, 0.0, 0.0), &mut sink));
    }
}
