use serde::{Deserialize, Serialize};

use crate::collision::{BroadPhase, BvhBroadphase, NaiveBroadphase, NaiveMode};
use crate::dynamics::{ContactMaterial, QuatNormalization};
use crate::math::Vec3;
use crate::solver::SolverConfig;

/// Broadphase strategy a world is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BroadphaseKind {
    /// All pairs, compared by bounding sphere
    #[default]
    Naive,
    /// All pairs, compared by world AABB
    NaiveAabb,
    /// Dynamic AABB tree
    Bvh,
}

impl BroadphaseKind {
    pub(crate) fn build(self) -> Box<dyn BroadPhase> {
        match self {
            Self::Naive => Box::new(NaiveBroadphase::new(NaiveMode::BoundingSphere)),
            Self::NaiveAabb => Box::new(NaiveBroadphase::new(NaiveMode::Aabb)),
            Self::Bvh => Box::new(BvhBroadphase::new()),
        }
    }
}

/// Configuration for the physics world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Acceleration applied to every dynamic body
    pub gravity: Vec3,
    /// Gravity used to estimate friction for pairs without contact history.
    /// Falls back to `gravity` when unset.
    pub friction_gravity: Option<Vec3>,
    /// Lets bodies fall asleep when they come to rest
    pub allow_sleep: bool,
    /// Number of steps between quaternion renormalizations
    pub quat_normalize_skip: u32,
    /// Use the first-order renormalization
    pub quat_normalize_fast: bool,
    pub broadphase: BroadphaseKind,
    pub solver: SolverConfig,
    /// Contact parameters for material pairs with no registered entry
    pub default_contact_material: ContactMaterial,
    /// One averaged friction pair per touching body pair
    pub friction_reduction: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            friction_gravity: None,
            allow_sleep: false,
            quat_normalize_skip: 0,
            quat_normalize_fast: false,
            broadphase: BroadphaseKind::default(),
            solver: SolverConfig::default(),
            default_contact_material: ContactMaterial::default(),
            friction_reduction: false,
        }
    }
}

impl WorldConfig {
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_broadphase(mut self, broadphase: BroadphaseKind) -> Self {
        self.broadphase = broadphase;
        self
    }

    pub fn with_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Renormalization mode for the given step count
    pub(crate) fn quat_normalization(&self, step: u64) -> QuatNormalization {
        let skip = u64::from(self.quat_normalize_skip);
        if skip > 0 && step % (skip + 1) != 0 {
            QuatNormalization::Skip
        } else if self.quat_normalize_fast {
            QuatNormalization::Fast
        } else {
            QuatNormalization::Full
        }
    }

    pub(crate) fn friction_gravity_magnitude(&self) -> f32 {
        self.friction_gravity.unwrap_or(self.gravity).length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_schedule() {
        let mut config = WorldConfig::default();
        assert_eq!(config.quat_normalization(3), QuatNormalization::Full);

        config.quat_normalize_skip = 2;
        config.quat_normalize_fast = true;
        let modes: Vec<_> = (0..4).map(|step| config.quat_normalization(step)).collect();
        assert_eq!(
            modes,
            [
                QuatNormalization::Fast,
                QuatNormalization::Skip,
                QuatNormalization::Skip,
                QuatNormalization::Fast
            ]
        );
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: WorldConfig = serde_json::from_str(r#"{"allow_sleep": true, "broadphase": "Bvh"}"#).unwrap();
        assert!(config.allow_sleep);
        assert_eq!(config.broadphase, BroadphaseKind::Bvh);
        assert_eq!(config.solver, SolverConfig::default());
    }

    #[test]
    fn test_friction_gravity_fallback() {
        let config = WorldConfig::default().with_gravity(Vec3::new(0.0, -9.8, 0.0));
        approx::assert_abs_diff_eq!(config.friction_gravity_magnitude(), 9.8, epsilon = 1e-6);
    }
}
