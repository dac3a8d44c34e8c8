//! Sphere against sphere, plane and convex hulls

use smallvec::SmallVec;

use crate::collision::contact::ContactSink;
use crate::geometry::{point_in_polygon, ConvexPolyhedron};
use crate::math::{Transform, Vec3};

pub fn sphere_sphere(radius_a: f32, frame_a: Transform, radius_b: f32, frame_b: Transform, sink: &mut ContactSink) -> bool {
    let (ca, cb) = (frame_a.position, frame_b.position);
    let r = radius_a + radius_b;
    if ca.distance_squared(cb) > r * r {
        return false;
    }
    if sink.just_test() {
        return true;
    }

    // Concentric spheres get an arbitrary but consistent normal
    let normal = (cb - ca).try_normalize().unwrap_or(Vec3::Y);
    sink.push(ca + normal * radius_a, cb - normal * radius_b, normal);
    true
}

/// Sphere against the half-space below the plane's local XY plane
pub fn sphere_plane(radius: f32, frame_a: Transform, plane: Transform, sink: &mut ContactSink) -> bool {
    let plane_normal = plane.vector_to_world(Vec3::Z);
    let center = frame_a.position;
    let distance = (center - plane.position).dot(plane_normal);
    if distance > radius {
        return false;
    }
    if sink.just_test() {
        return true;
    }

    sink.push(center - plane_normal * radius, center - plane_normal * distance, -plane_normal);
    true
}

/// Sphere against a convex hull: corners first, then faces, then the
/// edges of faces the sphere hangs over. Yields at most one contact.
pub fn sphere_convex(
    radius: f32,
    frame_a: Transform,
    hull: &ConvexPolyhedron,
    frame_b: Transform,
    sink: &mut ContactSink,
) -> bool {
    let center = frame_a.position;
    let r2 = radius * radius;
    let vertices = hull.vertices();

    for &v in vertices {
        let corner = frame_b.point_to_world(v);
        let to_corner = corner - center;
        if to_corner.length_squared() < r2 {
            if sink.just_test() {
                return true;
            }
            let normal = to_corner.try_normalize().unwrap_or(Vec3::Y);
            sink.push(center + normal * radius, corner, normal);
            return true;
        }
    }

    for (face, &local_normal) in hull.faces().iter().zip(hull.face_normals()) {
        let normal = frame_b.vector_to_world(local_normal);
        let face_point = frame_b.point_to_world(vertices[face[0]]);
        let deepest = center - normal * radius;
        let penetration = (deepest - face_point).dot(normal);
        if penetration >= 0.0 || (center - face_point).dot(normal) <= 0.0 {
            continue;
        }

        let polygon: SmallVec<[Vec3; 8]> = face.iter().map(|&i| frame_b.point_to_world(vertices[i])).collect();
        if point_in_polygon(&polygon, normal, center) {
            if sink.just_test() {
                return true;
            }
            sink.push(deepest, deepest - normal * penetration, -normal);
            return true;
        }

        for k in 0..polygon.len() {
            let v1 = polygon[k];
            let v2 = polygon[(k + 1) % polygon.len()];
            let edge = v2 - v1;
            let Some(edge_unit) = edge.try_normalize() else {
                continue;
            };
            let along = (center - v1).dot(edge_unit);
            let closest = v1 + edge_unit * along;
            if along > 0.0 && along * along < edge.length_squared() && closest.distance_squared(center) < r2 {
                if sink.just_test() {
                    return true;
                }
                let normal = (closest - center).try_normalize().unwrap_or(-normal);
                sink.push(center + normal * radius, closest, normal);
                return true;
            }
        }
    }
    false
}
