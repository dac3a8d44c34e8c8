mod integrator;
mod material;
mod rigid_body;

pub use integrator::{apply_damping, integrate, QuatNormalization};
pub use material::{ContactMaterial, Material, MaterialId, MaterialTable};
pub use rigid_body::{Body, BodyId, BodyType, SleepState, SleepTransition};
