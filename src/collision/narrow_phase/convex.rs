//! Hull against hull via separating axes and face clipping

use smallvec::SmallVec;

use crate::collision::contact::ContactSink;
use crate::geometry::{ClipPoint, ConvexPolyhedron};
use crate::math::Transform;

const CLIP_MIN_DISTANCE: f32 = -100.0;
const CLIP_MAX_DISTANCE: f32 = 100.0;

pub fn convex_convex(
    hull_a: &ConvexPolyhedron,
    frame_a: Transform,
    hull_b: &ConvexPolyhedron,
    frame_b: Transform,
    sink: &mut ContactSink,
) -> bool {
    let reach = hull_a.bounding_radius() + hull_b.bounding_radius();
    if frame_a.position.distance_squared(frame_b.position) > reach * reach {
        return false;
    }
    let Some(separating) = hull_a.find_separating_axis(frame_a, hull_b, frame_b) else {
        return false;
    };

    let mut clipped: SmallVec<[ClipPoint; 8]> = SmallVec::new();
    hull_a.clip_against_hull(
        frame_a,
        hull_b,
        frame_b,
        separating,
        CLIP_MIN_DISTANCE,
        CLIP_MAX_DISTANCE,
        &mut clipped,
    );
    if clipped.is_empty() {
        return false;
    }
    if sink.just_test() {
        return true;
    }

    for clip in clipped {
        sink.push(clip.point - clip.normal * clip.depth, clip.point, -separating);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Quat, Vec3};
    use approx::assert_abs_diff_eq;

    fn unit_box() -> ConvexPolyhedron {
        ConvexPolyhedron::cuboid(Vec3::splat(0.5)).unwrap()
    }

    #[test]
    fn test_stacked_boxes_give_four_points() {
        let hull = unit_box();
        let top = Transform::new(Vec3::new(0.0, 0.0, 0.9), Quat::IDENTITY);
        let mut sink = ContactSink::new(false);

        assert!(convex_convex(&hull, Transform::IDENTITY, &hull, top, &mut sink));
        assert_eq!(sink.len(), 4);
        for p in sink.points() {
            assert!(p.normal.almost_equals(Vec3::Z, 1e-6));
            assert_abs_diff_eq!(p.depth(), 0.1, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_corner_on_face_gives_one_point() {
        let hull = unit_box();
        let corner_down = Quat::from_rotation_arc(Vec3::ONE.normalize(), -Vec3::Z);
        let half_diagonal = 0.5 * 3f32.sqrt();
        let top = Transform::new(Vec3::new(0.0, 0.0, 0.5 + half_diagonal - 0.1), corner_down);
        let mut sink = ContactSink::new(false);

        assert!(convex_convex(&hull, Transform::IDENTITY, &hull, top, &mut sink));
        assert_eq!(sink.len(), 1);
        let p = sink.points()[0];
        assert!(p.normal.almost_equals(Vec3::Z, 1e-4));
        assert_abs_diff_eq!(p.depth(), 0.1, epsilon = 1e-4);
    }

    #[test]
    fn test_separated_boxes() {
        let hull = unit_box();
        let apart = Transform::new(Vec3::new(1.2, 0.0, 0.0), Quat::IDENTITY);
        assert!(!convex_convex(&hull, Transform::IDENTITY, &hull, apart, &mut ContactSink::new(false)));
    }

    #[test]
    fn test_reversed_order_flips_normal() {
        let hull = unit_box();
        let below = Transform::new(Vec3::new(0.0, 0.0, -0.9), Quat::IDENTITY);
        let mut sink = ContactSink::new(false);
        assert!(convex_convex(&hull, Transform::IDENTITY, &hull, below, &mut sink));
        assert!(sink.points().iter().all(|p| p.normal.almost_equals(-Vec3::Z, 1e-6)));
    }

    fn cylinder() -> ConvexPolyhedron {
        ConvexPolyhedron::cylinder(0.5, 0.5, 1.0, 8).unwrap()
    }

    #[test]
    fn test_cylinder_stands_on_box_and_cylinder() {
        let top = Transform::new(Vec3::new(0.0, 0.9, 0.0), Quat::IDENTITY);
        for base in [unit_box(), cylinder()] {
            let mut sink = ContactSink::new(false);
            assert!(convex_convex(&base, Transform::IDENTITY, &cylinder(), top, &mut sink));
            assert!(sink.len() >= 3);
            for p in sink.points() {
                assert!(p.normal.almost_equals(Vec3::Y, 1e-5));
                assert_abs_diff_eq!(p.depth(), 0.1, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_penetrating_hulls_report_depth_and_unit_normal() {
        let rotations = [
            Quat::IDENTITY,
            Quat::from_axis_angle(Vec3::X, 0.6),
            Quat::from_axis_angle(Vec3::Z, 1.2),
            Quat::from_axis_angle(Vec3::ONE.normalize(), 1.1),
        ];
        let directions = [
            Vec3::X,
            Vec3::Y,
            -Vec3::Z,
            Vec3::new(1.0, 1.0, 0.0).normalize(),
            Vec3::new(1.0, -1.0, 1.0).normalize(),
            Vec3::new(-0.3, 0.8, 0.5).normalize(),
        ];
        // Closer than the sum of inscribed radii, so every pose overlaps
        let distance = 0.8;

        for hull_a in [unit_box(), cylinder()] {
            for &rotation in &rotations {
                for &direction in &directions {
                    let frame_b = Transform::new(direction * distance, rotation);
                    let mut sink = ContactSink::new(false);
                    assert!(
                        convex_convex(&hull_a, Transform::IDENTITY, &cylinder(), frame_b, &mut sink),
                        "missed overlap along {direction:?}"
                    );
                    let mut deepest = f32::MIN;
                    for p in sink.points() {
                        assert_abs_diff_eq!(p.normal.length(), 1.0, epsilon = 1e-4);
                        assert!(p.depth() > -1e-4);
                        deepest = deepest.max(p.depth());
                    }
                    assert!(deepest > 0.0);
                }
            }
        }
    }
}
