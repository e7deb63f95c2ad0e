//! Render-side notifications.
//!
//! The sync core never touches rendering directly. It queues lifecycle
//! events here and the host drains them once per frame.

use crate::{entity::EntityId, math::Vec3};

/// Something the rendering collaborator should react to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderEvent {
    /// A visual representation should be created at `position`.
    Spawned { entity: EntityId, position: Vec3 },
    /// The visual representation of `entity` should be disposed.
    Disposed { entity: EntityId },
}

/// FIFO queue of render events.
#[derive(Debug, Default)]
pub struct RenderEvents {
    queue: Vec<RenderEvent>,
}

impl RenderEvents {
    pub fn push(&mut self, e: RenderEvent) {
        self.queue.push(e);
    }

    /// Drains all queued events in arrival order.
    pub fn drain(&mut self) -> Vec<RenderEvent> {
        std::mem::take(&mut self.queue)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_in_order() {
        let mut events = RenderEvents::default();
        events.push(RenderEvent::Spawned {
            entity: EntityId(1),
            position: Vec3::ZERO,
        });
        events.push(RenderEvent::Disposed { entity: EntityId(1) });
        let drained = events.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[1], RenderEvent::Disposed { .. }));
        assert!(events.is_empty());
    }
}
