use crate::constraints::Equation;
use crate::dynamics::Body;

use super::{Solver, SolverConfig};

/// Gauss-Seidel solver over SPOOK equations.
///
/// Each sweep visits every enabled equation in order and immediately
/// applies its impulse change to the bodies' correction velocities, so
/// later equations in the same sweep see the update.
#[derive(Debug, Default)]
pub struct GsSolver {
    config: SolverConfig,
    lambda: Vec<f32>,
    b: Vec<f32>,
    inv_c: Vec<f32>,
    residuals: Vec<f32>,
}

impl GsSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Summed absolute impulse change of each sweep in the last solve
    pub fn residuals(&self) -> &[f32] {
        &self.residuals
    }
}

impl Solver for GsSolver {
    fn solve(&mut self, h: f32, bodies: &mut [Body], equations: &mut [Equation]) -> usize {
        self.residuals.clear();
        if equations.is_empty() {
            return 0;
        }

        for body in bodies.iter_mut() {
            body.update_solve_mass_properties();
        }

        self.lambda.clear();
        self.b.clear();
        self.inv_c.clear();
        for eq in equations.iter() {
            self.lambda.push(0.0);
            self.b.push(eq.compute_b(bodies, h));
            let c = eq.compute_c(bodies);
            self.inv_c.push(if c > 0.0 { 1.0 / c } else { 0.0 });
        }

        for body in bodies.iter_mut() {
            body.vlambda = Default::default();
            body.wlambda = Default::default();
        }

        let tolerance_squared = self.config.tolerance * self.config.tolerance;
        let mut iterations = 0;
        while iterations < self.config.iterations {
            iterations += 1;
            let mut delta_total = 0.0;
            for (j, eq) in equations.iter().enumerate() {
                if !eq.enabled {
                    continue;
                }
                let lambda = self.lambda[j];
                let gw_lambda = eq.compute_gw_lambda(bodies);
                let mut delta = self.inv_c[j] * (self.b[j] - gw_lambda - eq.spook.eps * lambda);

                let (min, max) = (eq.min_force * h, eq.max_force * h);
                if lambda + delta < min {
                    delta = min - lambda;
                } else if lambda + delta > max {
                    delta = max - lambda;
                }
                self.lambda[j] += delta;
                delta_total += delta.abs();
                eq.add_to_wlambda(bodies, delta);
            }
            self.residuals.push(delta_total);
            if delta_total * delta_total < tolerance_squared {
                break;
            }
        }

        for body in bodies.iter_mut() {
            body.velocity += body.vlambda.component_mul(body.linear_factor);
            body.angular_velocity += body.wlambda.component_mul(body.angular_factor);
        }

        let inv_h = 1.0 / h;
        for (eq, lambda) in equations.iter_mut().zip(&self.lambda) {
            eq.multiplier = lambda * inv_h;
        }
        log::trace!(
            "solved {} equations in {} sweeps, residual {:?}",
            equations.len(),
            iterations,
            self.residuals.last()
        );
        iterations
    }

    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }
}
