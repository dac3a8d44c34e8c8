use std::collections::{HashMap, HashSet};

use crate::dynamics::Body;
use crate::geometry::{Aabb, Bvh};

use super::{need_broadphase_collision, BroadPhase};

/// Dynamic AABB tree over body bounds.
///
/// Leaves are keyed by body id and refitted each step; fat margins keep
/// most slowly moving bodies from touching the tree at all.
#[derive(Debug, Default)]
pub struct BvhBroadphase {
    tree: Bvh,
    index_of: HashMap<u32, usize>,
    candidates: Vec<(u32, u32)>,
}

impl BvhBroadphase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_margin(margin: f32) -> Self {
        Self {
            tree: Bvh::with_margin(margin),
            ..Self::default()
        }
    }

    fn sync(&mut self, bodies: &mut [Body]) {
        let mut stale: HashSet<u32> = self.index_of.keys().copied().collect();
        self.index_of.clear();

        for (index, body) in bodies.iter_mut().enumerate() {
            let Some(id) = body.id() else {
                continue;
            };
            stale.remove(&id.0);
            self.index_of.insert(id.0, index);
            let aabb = body.aabb();
            if aabb.is_empty() {
                self.tree.remove(id.0);
            } else {
                self.tree.update(id.0, aabb);
            }
        }

        for id in stale {
            self.tree.remove(id);
        }
    }
}

impl BroadPhase for BvhBroadphase {
    fn collision_pairs(&mut self, bodies: &mut [Body], pairs: &mut Vec<(usize, usize)>) {
        self.sync(bodies);

        self.candidates.clear();
        self.tree.query_pairs(&mut self.candidates);

        let start = pairs.len();
        for &(a, b) in &self.candidates {
            let (Some(&i), Some(&j)) = (self.index_of.get(&a), self.index_of.get(&b)) else {
                continue;
            };
            let (i, j) = if i < j { (i, j) } else { (j, i) };
            if need_broadphase_collision(&bodies[i], &bodies[j])
                && bodies[i].aabb().overlaps(bodies[j].aabb())
            {
                pairs.push((i, j));
            }
        }
        // Tree order depends on insertion history
        pairs[start..].sort_unstable();
    }

    fn aabb_query(&mut self, bodies: &mut [Body], aabb: Aabb, result: &mut Vec<usize>) {
        self.sync(bodies);
        let start = result.len();
        let index_of = &self.index_of;
        self.tree.query_aabb(aabb, |id| {
            if let Some(&index) = index_of.get(&id) {
                if bodies[index].aabb().overlaps(aabb) {
                    result.push(index);
                }
            }
        });
        result[start..].sort_unstable();
    }

    fn body_removed(&mut self, body: &Body) {
        if let Some(id) = body.id() {
            self.tree.remove(id.0);
            self.index_of.remove(&id.0);
        }
    }
}
