mod mat3;
mod quat;
mod transform;
mod vec3;

pub use mat3::Mat3;
pub use quat::Quat;
pub use transform::Transform;
pub use vec3::Vec3;

/// Common math constants
pub mod consts {
    /// Tolerance used by geometric degeneracy checks
    pub const EPSILON: f32 = 1e-6;
}
