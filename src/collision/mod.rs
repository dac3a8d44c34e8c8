pub mod broad_phase;
pub mod collision_matrix;
pub mod contact;
pub mod narrow_phase;
pub mod overlap_keeper;

pub use broad_phase::{BroadPhase, BvhBroadphase, NaiveBroadphase, NaiveMode};
pub use collision_matrix::CollisionMatrix;
pub use contact::{ContactPoint, ContactSink};
pub use narrow_phase::{collide, Narrowphase, NarrowphaseInput, NarrowphaseOutput, PairForce, ShapeOverlap, ShapePose};
pub use overlap_keeper::OverlapKeeper;
