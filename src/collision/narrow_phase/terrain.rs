//! Heightfields and triangle meshes, collided piecewise through the
//! convex routines: one triangular pillar or flat triangle hull at a time.

use crate::collision::contact::ContactSink;
use crate::geometry::{Aabb, ConvexPolyhedron, Heightfield, Trimesh};
use crate::math::{Quat, Transform, Vec3};

use super::convex::convex_convex;
use super::sphere::sphere_convex;

/// Frame of `frame_a` expressed in `frame_b`'s local space
fn relative_frame(frame_a: Transform, frame_b: Transform) -> Transform {
    Transform::new(
        frame_b.point_to_local(frame_a.position),
        frame_b.rotation.inverse() * frame_a.rotation,
    )
}

/// Runs `test` for every pillar whose bounding sphere can reach a body of
/// `reach` radius at `position`, stopping early in test-only mode.
fn each_pillar(
    field: &Heightfield,
    frame: Transform,
    local_bounds: Aabb,
    position: Vec3,
    reach: f32,
    sink: &mut ContactSink,
    mut test: impl FnMut(&ConvexPolyhedron, Transform, &mut ContactSink) -> bool,
) -> bool {
    let Some((xs, ys)) = field.cell_range(local_bounds) else {
        return false;
    };
    let mut found = false;
    for xi in xs {
        for yi in ys.clone() {
            for upper in [false, true] {
                let Some(pillar) = field.pillar(xi, yi, upper) else {
                    continue;
                };
                let pillar_frame = frame.compose(pillar.offset, Quat::IDENTITY);
                let r = reach + pillar.hull.bounding_radius();
                if position.distance_squared(pillar_frame.position) >= r * r {
                    continue;
                }
                if test(&pillar.hull, pillar_frame, sink) {
                    if sink.just_test() {
                        return true;
                    }
                    found = true;
                }
            }
        }
    }
    found
}

pub fn sphere_heightfield(
    radius: f32,
    frame_a: Transform,
    field: &Heightfield,
    frame_b: Transform,
    sink: &mut ContactSink,
) -> bool {
    let local = frame_b.point_to_local(frame_a.position);
    let bounds = Aabb::from_center_half_extents(local, Vec3::splat(radius));
    each_pillar(field, frame_b, bounds, frame_a.position, radius, sink, |hull, frame, sink| {
        sphere_convex(radius, frame_a, hull, frame, sink)
    })
}

pub fn convex_heightfield(
    hull: &ConvexPolyhedron,
    frame_a: Transform,
    field: &Heightfield,
    frame_b: Transform,
    sink: &mut ContactSink,
) -> bool {
    let bounds = hull.world_aabb(relative_frame(frame_a, frame_b));
    each_pillar(field, frame_b, bounds, frame_a.position, hull.bounding_radius(), sink, |pillar, frame, sink| {
        convex_convex(hull, frame_a, pillar, frame, sink)
    })
}

/// Runs `test` against the flat hull of every mesh triangle overlapping
/// the local bounds.
fn each_triangle(
    mesh: &Trimesh,
    frame: Transform,
    local_bounds: Aabb,
    sink: &mut ContactSink,
    mut test: impl FnMut(&ConvexPolyhedron, Transform, &mut ContactSink) -> bool,
) -> bool {
    let mut candidates = Vec::new();
    mesh.triangles_in_aabb(local_bounds, &mut candidates);
    candidates.sort_unstable();

    let mut found = false;
    for index in candidates {
        let Some((hull, centroid)) = mesh.triangle_hull(index) else {
            continue;
        };
        if test(&hull, frame.compose(centroid, Quat::IDENTITY), sink) {
            if sink.just_test() {
                return true;
            }
            found = true;
        }
    }
    found
}

pub fn sphere_trimesh(radius: f32, frame_a: Transform, mesh: &Trimesh, frame_b: Transform, sink: &mut ContactSink) -> bool {
    let local = frame_b.point_to_local(frame_a.position);
    let bounds = Aabb::from_center_half_extents(local, Vec3::splat(radius));
    each_triangle(mesh, frame_b, bounds, sink, |hull, frame, sink| {
        sphere_convex(radius, frame_a, hull, frame, sink)
    })
}

pub fn convex_trimesh(
    hull: &ConvexPolyhedron,
    frame_a: Transform,
    mesh: &Trimesh,
    frame_b: Transform,
    sink: &mut ContactSink,
) -> bool {
    let bounds = hull.world_aabb(relative_frame(frame_a, frame_b));
    each_triangle(mesh, frame_b, bounds, sink, |triangle, frame, sink| {
        convex_convex(hull, frame_a, triangle, frame, sink)
    })
}
