use crate::dynamics::BodyId;
use crate::math::Vec3;

/// A shape addressed by its body and its index within that body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKey {
    pub body: BodyId,
    pub shape: usize,
}

/// First contact point of a newly resolved collision, seen from `body`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideContact {
    /// World contact point on `body`
    pub point: Vec3,
    /// Unit normal pointing from `body` towards `other`
    pub normal: Vec3,
    /// Approach speed along the normal
    pub impact_velocity: f32,
}

/// Something that happened during a step, queued in order of occurrence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldEvent {
    /// Forces are about to be integrated
    PreStep,
    /// Integration finished
    PostStep,
    /// A contact-producing pair was found; emitted once for each side
    Collide {
        body: BodyId,
        other: BodyId,
        contact: CollideContact,
    },
    BeginContact { body_a: BodyId, body_b: BodyId },
    EndContact { body_a: BodyId, body_b: BodyId },
    BeginShapeContact { shape_a: ShapeKey, shape_b: ShapeKey },
    EndShapeContact { shape_a: ShapeKey, shape_b: ShapeKey },
    WakeUp { body: BodyId },
    Sleepy { body: BodyId },
    Sleep { body: BodyId },
}

/// Receives queued world events
pub trait WorldEventHandler {
    fn handle(&mut self, event: &WorldEvent);
}

impl<F: FnMut(&WorldEvent)> WorldEventHandler for F {
    fn handle(&mut self, event: &WorldEvent) {
        self(event)
    }
}
