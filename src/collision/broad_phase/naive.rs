use serde::{Deserialize, Serialize};

use crate::dynamics::Body;
use crate::geometry::Aabb;

use super::{need_broadphase_collision, BroadPhase};

/// Overlap test used by [`NaiveBroadphase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NaiveMode {
    /// Compare bounding spheres around the body origins
    #[default]
    BoundingSphere,
    /// Compare world AABBs
    Aabb,
}

/// Tests every pair of bodies. Quadratic, but has no state to maintain.
#[derive(Debug, Clone, Default)]
pub struct NaiveBroadphase {
    pub mode: NaiveMode,
}

impl NaiveBroadphase {
    pub fn new(mode: NaiveMode) -> Self {
        Self { mode }
    }

    fn overlapping(&self, a: &mut Body, b: &mut Body) -> bool {
        match self.mode {
            NaiveMode::BoundingSphere => {
                let r = a.bounding_radius() + b.bounding_radius();
                a.position().distance_squared(b.position()) < r * r
            }
            NaiveMode::Aabb => a.aabb().overlaps(b.aabb()),
        }
    }
}

impl BroadPhase for NaiveBroadphase {
    fn collision_pairs(&mut self, bodies: &mut [Body], pairs: &mut Vec<(usize, usize)>) {
        for j in 1..bodies.len() {
            let (head, tail) = bodies.split_at_mut(j);
            let b = &mut tail[0];
            for (i, a) in head.iter_mut().enumerate() {
                if need_broadphase_collision(a, b) && self.overlapping(a, b) {
                    pairs.push((i, j));
                }
            }
        }
    }

    fn aabb_query(&mut self, bodies: &mut [Body], aabb: Aabb, result: &mut Vec<usize>) {
        for (i, body) in bodies.iter_mut().enumerate() {
            if body.aabb().overlaps(aabb) {
                result.push(i);
            }
        }
    }
}
