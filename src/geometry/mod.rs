mod aabb;
mod bvh;
mod convex;
mod heightfield;
mod shape;
mod trimesh;

pub use aabb::Aabb;
pub use bvh::Bvh;
pub use convex::{box_inertia, clip_polygon_against_plane, point_in_polygon, ClipPoint, ConvexPolyhedron, Face, Polygon};
pub use heightfield::{Heightfield, Pillar};
pub use shape::{BoxShape, Cylinder, Shape, ShapeKind, ShapeType, Sphere, DEFAULT_CYLINDER_SEGMENTS};
pub use trimesh::Trimesh;
