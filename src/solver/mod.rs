mod gs;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::constraints::Equation;
use crate::dynamics::Body;

pub use gs::GsSolver;

/// Configuration for the constraint solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of Gauss-Seidel sweeps per step
    pub iterations: usize,
    /// Sweeps stop once the summed impulse change falls below this
    pub tolerance: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            tolerance: 1e-7,
        }
    }
}

/// Resolves a set of velocity equations over the world's bodies
pub trait Solver: Debug {
    /// Solves `equations` for one step of length `dt` and folds the result
    /// into body velocities. Returns the number of sweeps performed.
    fn solve(&mut self, dt: f32, bodies: &mut [Body], equations: &mut [Equation]) -> usize;

    fn config(&self) -> &SolverConfig;

    fn set_config(&mut self, config: SolverConfig);
}
