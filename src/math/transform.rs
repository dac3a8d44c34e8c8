use serde::{Deserialize, Serialize};

use super::quat::Quat;
use super::vec3::Vec3;

/// A rigid frame: position plus orientation.
///
/// Bodies store their pose this way and shapes are placed inside a body
/// with a local offset and orientation composed on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    #[inline]
    pub fn point_to_world(self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    #[inline]
    pub fn point_to_local(self, world: Vec3) -> Vec3 {
        self.rotation.inverse_rotate_vec(world - self.position)
    }

    #[inline]
    pub fn vector_to_world(self, local: Vec3) -> Vec3 {
        self.rotation * local
    }

    #[inline]
    pub fn vector_to_local(self, world: Vec3) -> Vec3 {
        self.rotation.inverse_rotate_vec(world)
    }

    /// Places a child frame given in this frame's coordinates into the
    /// parent space of `self`.
    #[inline]
    pub fn compose(self, offset: Vec3, orientation: Quat) -> Self {
        Self {
            position: self.point_to_world(offset),
            rotation: self.rotation * orientation,
        }
    }
}
