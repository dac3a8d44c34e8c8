//! # Tumble
//!
//! A 3D rigid body physics engine with SPOOK-stabilized Gauss-Seidel
//! constraint solving.
//!
//! ## Features
//!
//! - **Rigid Body Dynamics**: dynamic, static and kinematic bodies with
//!   compound shapes, damping, sleeping and per-axis motion factors
//! - **Collision Shapes**: sphere, plane, box, convex polyhedron, cylinder,
//!   particle, heightfield and triangle mesh
//! - **Broad Phase**: naive all-pairs, bounding-sphere or AABB, or a BVH
//! - **Narrow Phase**: per shape-pair contact generation with material
//!   lookup and friction equations
//! - **Constraint Solver**: Gauss-Seidel over SPOOK-parameterized equations
//! - **Events**: collide, begin/end contact, sleep transitions and step hooks
//! - **Ray Casting**: closest, any or all hits with collision filtering
//!
//! ## Quick Start
//!
//! ```rust
//! use tumble::prelude::*;
//!
//! let mut world = World::new(WorldConfig::default().with_gravity(Vec3::new(0.0, -9.81, 0.0)));
//!
//! // Static ground plane facing +Y
//! world.add_body(
//!     Body::fixed()
//!         .with_shape(Shape::plane())
//!         .with_rotation(Quat::from_axis_angle(Vec3::X, -std::f32::consts::FRAC_PI_2)),
//! );
//!
//! let ball = world.add_body(
//!     Body::new(1.0)
//!         .with_shape(Shape::sphere(0.5).unwrap())
//!         .with_position(Vec3::new(0.0, 5.0, 0.0)),
//! );
//!
//! for _ in 0..600 {
//!     world.step(1.0 / 60.0);
//! }
//! let y = world.body(ball).unwrap().position().y;
//! assert!((y - 0.5).abs() < 0.05);
//! ```

pub mod collision;
pub mod constraints;
pub mod dynamics;
pub mod error;
pub mod geometry;
pub mod math;
pub mod solver;
pub mod world;

pub use error::{PhysicsError, Result};
pub use world::{World, WorldConfig, WorldEvent};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::constraints::{Constraint, ConstraintId, Spring};
    pub use crate::dynamics::{Body, BodyId, BodyType, ContactMaterial, Material, MaterialId, SleepState};
    pub use crate::error::{PhysicsError, Result};
    pub use crate::geometry::{Aabb, Shape, ShapeType};
    pub use crate::math::{Mat3, Quat, Transform, Vec3};
    pub use crate::solver::{GsSolver, Solver, SolverConfig};
    pub use crate::world::{
        BroadphaseKind, ContactInfo, Ray, RayMode, RaycastOptions, RaycastResult, Subsystem, World, WorldConfig,
        WorldEvent, WorldEventHandler,
    };
}
