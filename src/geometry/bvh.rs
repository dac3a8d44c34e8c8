use std::collections::HashMap;

use crate::math::Vec3;

use super::aabb::Aabb;

const NULL: u32 = u32::MAX;

/// A node in the tree. Leaves keep their payload id in `left`.
#[derive(Debug, Clone)]
struct BvhNode {
    aabb: Aabb,
    left: u32,
    /// `NULL` marks a leaf
    right: u32,
    parent: u32,
    height: i32,
}

impl BvhNode {
    fn is_leaf(&self) -> bool {
        self.right == NULL
    }
}

/// A dynamic AABB tree keyed by caller-chosen `u32` ids.
///
/// Triangle meshes store one leaf per triangle; the tree broad-phase stores
/// one leaf per body id. Leaves are "fat" by `margin` so small motions do
/// not force a reinsert.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: u32,
    leaves: HashMap<u32, u32>,
    free_list: Vec<u32>,
    margin: f32,
}

impl Default for Bvh {
    fn default() -> Self {
        Self::new()
    }
}

impl Bvh {
    /// Creates an empty tree with a 0.1 fattening margin
    pub fn new() -> Self {
        Self::with_margin(0.1)
    }

    pub fn with_margin(margin: f32) -> Self {
        Self {
            nodes: Vec::new(),
            root: NULL,
            leaves: HashMap::new(),
            free_list: Vec::new(),
            margin,
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.leaves.contains_key(&id)
    }

    /// Inserts `id`; an id already present is moved to the new box
    pub fn insert(&mut self, id: u32, aabb: Aabb) {
        if self.leaves.contains_key(&id) {
            self.remove(id);
        }

        let leaf = self.allocate(BvhNode {
            aabb: aabb.expand(self.margin),
            left: id,
            right: NULL,
            parent: NULL,
            height: 0,
        });
        self.leaves.insert(id, leaf);

        if self.root == NULL {
            self.root = leaf;
            return;
        }

        let sibling = self.find_best_sibling(leaf);
        let old_parent = self.nodes[sibling as usize].parent;
        let combined = self.nodes[leaf as usize]
            .aabb
            .union(self.nodes[sibling as usize].aabb);
        let new_parent = self.allocate(BvhNode {
            aabb: combined,
            left: sibling,
            right: leaf,
            parent: old_parent,
            height: 0,
        });

        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        if old_parent == NULL {
            self.root = new_parent;
        } else {
            let node = &mut self.nodes[old_parent as usize];
            if node.left == sibling {
                node.left = new_parent;
            } else {
                node.right = new_parent;
            }
        }

        self.refit(new_parent);
    }

    /// Removes `id`; unknown ids are ignored
    pub fn remove(&mut self, id: u32) {
        let leaf = match self.leaves.remove(&id) {
            Some(leaf) => leaf,
            None => return,
        };

        if leaf == self.root {
            self.root = NULL;
            self.free_list.push(leaf);
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grandparent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == leaf {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        if grandparent == NULL {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL;
        } else {
            let node = &mut self.nodes[grandparent as usize];
            if node.left == parent {
                node.left = sibling;
            } else {
                node.right = sibling;
            }
            self.nodes[sibling as usize].parent = grandparent;
            self.refit(grandparent);
        }

        self.free_list.push(leaf);
        self.free_list.push(parent);
    }

    /// Moves a leaf when its box escaped the fat box. Returns true when the
    /// tree changed.
    pub fn update(&mut self, id: u32, aabb: Aabb) -> bool {
        match self.leaves.get(&id) {
            Some(&leaf) if self.nodes[leaf as usize].aabb.contains_aabb(aabb) => false,
            _ => {
                self.insert(id, aabb);
                true
            }
        }
    }

    /// Every pair of leaves whose fat boxes overlap, smaller id first
    pub fn query_pairs(&self, pairs: &mut Vec<(u32, u32)>) {
        for (&id, &leaf) in &self.leaves {
            let aabb = self.nodes[leaf as usize].aabb;
            self.query_aabb(aabb, |other| {
                if id < other {
                    pairs.push((id, other));
                }
            });
        }
    }

    /// Calls `callback` with every leaf id whose box overlaps `aabb`
    pub fn query_aabb(&self, aabb: Aabb, mut callback: impl FnMut(u32)) {
        self.traverse(|node| node.aabb.overlaps(aabb), &mut callback);
    }

    /// Calls `callback` with every leaf id whose box the segment touches
    pub fn query_segment(&self, from: Vec3, to: Vec3, mut callback: impl FnMut(u32)) {
        self.traverse(
            |node| node.aabb.segment_intersection(from, to).is_some(),
            &mut callback,
        );
    }

    fn traverse(&self, mut accept: impl FnMut(&BvhNode) -> bool, callback: &mut impl FnMut(u32)) {
        if self.root == NULL {
            return;
        }

        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current as usize];
            if !accept(node) {
                continue;
            }
            if node.is_leaf() {
                callback(node.left);
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    fn allocate(&mut self, node: BvhNode) -> u32 {
        if let Some(index) = self.free_list.pop() {
            self.nodes[index as usize] = node;
            index
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as u32
        }
    }

    /// Surface-area heuristic descent
    fn find_best_sibling(&self, leaf: u32) -> u32 {
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut best = self.root;
        let mut best_cost = leaf_aabb.union(self.nodes[best as usize].aabb).surface_area();

        let mut stack = vec![self.root];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current as usize];
            let combined_cost = leaf_aabb.union(node.aabb).surface_area();

            if combined_cost < best_cost {
                best = current;
                best_cost = combined_cost;
            }

            if !node.is_leaf() {
                let inherited = combined_cost - node.aabb.surface_area();
                let left_cost =
                    leaf_aabb.union(self.nodes[node.left as usize].aabb).surface_area() + inherited;
                let right_cost =
                    leaf_aabb.union(self.nodes[node.right as usize].aabb).surface_area() + inherited;

                if left_cost < best_cost || right_cost < best_cost {
                    stack.push(node.left);
                    stack.push(node.right);
                }
            }
        }

        best
    }

    fn refit(&mut self, start: u32) {
        let mut current = start;

        while current != NULL {
            let node = &self.nodes[current as usize];
            if !node.is_leaf() {
                let left = &self.nodes[node.left as usize];
                let right = &self.nodes[node.right as usize];
                let aabb = left.aabb.union(right.aabb);
                let height = 1 + left.height.max(right.height);
                let node = &mut self.nodes[current as usize];
                node.aabb = aabb;
                node.height = height;
            }
            current = self.nodes[current as usize].parent;
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = NULL;
        self.leaves.clear();
        self.free_list.clear();
    }
}
