//! Error types for shape construction and world bookkeeping

use thiserror::Error;

use crate::dynamics::BodyId;

/// Errors reported by constructors that cannot repair bad input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// A constraint or query referenced a body that is not in the world
    #[error("body not found in world: {0:?}")]
    BodyNotFound(BodyId),

    /// Convex hull data does not describe a closed outward-facing polyhedron
    #[error("invalid convex polyhedron: {0}")]
    InvalidConvex(String),

    /// A face references a vertex index past the end of the vertex list
    #[error("face {face} references vertex {index} but only {len} vertices exist")]
    FaceIndexOutOfRange { face: usize, index: usize, len: usize },

    /// Heightfield sample grid is unusable
    #[error("invalid heightfield: {0}")]
    InvalidHeightfield(String),

    /// Triangle mesh buffers are inconsistent
    #[error("invalid trimesh: {0}")]
    InvalidTrimesh(String),

    /// Primitive dimensions out of range
    #[error("invalid shape dimensions: {0}")]
    InvalidDimensions(String),
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
