use serde::{Deserialize, Serialize};

use super::rigid_body::{Body, SleepState};

/// How orientations are renormalized after integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuatNormalization {
    /// Leave the quaternion as integrated
    Skip,
    /// Exact renormalization
    #[default]
    Full,
    /// First-order approximation, cheaper and accurate near unit length
    Fast,
}

/// Scales velocities by `(1 - damping)^dt`. Only dynamic bodies are damped.
pub fn apply_damping(body: &mut Body, dt: f32) {
    if !body.is_dynamic() {
        return;
    }
    body.velocity *= (1.0 - body.linear_damping).powf(dt);
    body.angular_velocity *= (1.0 - body.angular_damping).powf(dt);
}

/// Semi-implicit Euler step: forces update velocities, then the new
/// velocities move the body.
///
/// The previous pose is recorded first so the world can interpolate.
/// Static and sleeping bodies do not move; kinematic bodies move with
/// their velocity and ignore forces since their inverse mass is zero.
pub fn integrate(body: &mut Body, dt: f32, normalization: QuatNormalization) {
    body.previous_position = body.position;
    body.previous_quaternion = body.quaternion;

    if body.is_static() || body.sleep_state() == SleepState::Sleeping {
        return;
    }

    let inv_mass_dt = body.inv_mass() * dt;
    body.velocity += body.force.component_mul(body.linear_factor) * inv_mass_dt;

    let torque = body.torque.component_mul(body.angular_factor);
    body.angular_velocity += body.inv_inertia_world() * torque * dt;

    body.position += body.velocity.component_mul(body.linear_factor) * dt;
    let q = body.quaternion.integrate(body.angular_velocity, dt, body.angular_factor);
    body.quaternion = match normalization {
        QuatNormalization::Skip => q,
        QuatNormalization::Full => q.normalize(),
        QuatNormalization::Fast => q.normalize_fast(),
    };

    body.aabb_needs_update = true;
    body.update_inertia_world();
}
