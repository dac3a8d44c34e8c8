//! Velocity-level equations and the joints built from them

mod constraint;
mod equation;
mod spring;

pub use constraint::{Constraint, ConstraintId, ConstraintKind};
pub use equation::{
    ContactEquation, Equation, EquationKind, FrictionEquation, JacobianElement, SpookParams, DEFAULT_MAX_FORCE,
};
pub use spring::Spring;
