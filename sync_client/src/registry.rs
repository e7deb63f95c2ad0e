//! Entity registry.
//!
//! Owns every synchronized entity keyed by id. Mutation is expected to happen
//! on the tick loop only; inbound messages are queued and applied there.

use std::{collections::HashMap, time::Instant};

use sync_shared::{
    entity::EntityId,
    event::{RenderEvent, RenderEvents},
    math::Vec3,
};
use tracing::debug;

use crate::interp::RemoteEntity;

#[derive(Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, RemoteEntity>,
    render: RenderEvents,
}

impl EntityRegistry {
    /// Inserts an idle entity at `position`.
    ///
    /// Returns `false` without touching anything if `id` already exists, so a
    /// late duplicate create cannot rewind an entity that has since moved.
    pub fn create(&mut self, id: EntityId, position: Vec3) -> bool {
        if self.entities.contains_key(&id) {
            debug!(entity = %id, "Duplicate create ignored");
            return false;
        }
        self.entities.insert(id, RemoteEntity::new(id, position));
        self.render.push(RenderEvent::Spawned {
            entity: id,
            position,
        });
        debug!(entity = %id, ?position, "Entity created");
        true
    }

    /// Deletes `id` and queues its disposal. Returns `false` if absent.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if self.entities.remove(&id).is_none() {
            return false;
        }
        self.render.push(RenderEvent::Disposed { entity: id });
        debug!(entity = %id, "Entity removed");
        true
    }

    pub fn try_get(&self, id: EntityId) -> Option<&RemoteEntity> {
        self.entities.get(&id)
    }

    pub fn try_get_mut(&mut self, id: EntityId) -> Option<&mut RemoteEntity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Advances interpolation of every entity except `skip`.
    ///
    /// The locally driven entity is skipped: it is snapped by input and would
    /// otherwise lose its moving flag every frame.
    pub fn advance_all(&mut self, now: Instant, skip: Option<EntityId>) {
        for (id, entity) in self.entities.iter_mut() {
            if Some(*id) == skip {
                continue;
            }
            entity.advance(now);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Hands queued spawn/dispose notifications to the renderer.
    pub fn drain_render_events(&mut self) -> Vec<RenderEvent> {
        self.render.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent() {
        let mut reg = EntityRegistry::default();
        assert!(reg.create(EntityId(1), Vec3::planar(1.0, 0.0)));
        assert!(!reg.create(EntityId(1), Vec3::planar(9.0, 9.0)));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.try_get(EntityId(1)).unwrap().position(),
            Vec3::planar(1.0, 0.0)
        );
    }

    #[test]
    fn duplicate_create_does_not_rewind_moved_entity() {
        let mut reg = EntityRegistry::default();
        reg.create(EntityId(1), Vec3::ZERO);
        reg.try_get_mut(EntityId(1))
            .unwrap()
            .snap_to(Vec3::planar(6.0, 0.0));
        reg.create(EntityId(1), Vec3::ZERO);
        assert_eq!(
            reg.try_get(EntityId(1)).unwrap().position(),
            Vec3::planar(6.0, 0.0)
        );
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut reg = EntityRegistry::default();
        assert!(!reg.remove(EntityId(42)));
        assert!(reg.is_empty());
        assert!(reg.drain_render_events().is_empty());
    }

    #[test]
    fn lifecycle_emits_render_events() {
        let mut reg = EntityRegistry::default();
        reg.create(EntityId(3), Vec3::ZERO);
        reg.create(EntityId(3), Vec3::ZERO);
        reg.remove(EntityId(3));
        let events = reg.drain_render_events();
        assert_eq!(
            events,
            vec![
                RenderEvent::Spawned {
                    entity: EntityId(3),
                    position: Vec3::ZERO
                },
                RenderEvent::Disposed {
                    entity: EntityId(3)
                },
            ]
        );
        assert!(reg.try_get(EntityId(3)).is_none());
    }

    #[test]
    fn advance_all_skips_local_entity() {
        let t0 = Instant::now();
        let mut reg = EntityRegistry::default();
        reg.create(EntityId(1), Vec3::ZERO);
        reg.create(EntityId(2), Vec3::ZERO);
        reg.try_get_mut(EntityId(1))
            .unwrap()
            .snap_to(Vec3::planar(1.0, 0.0));
        reg.try_get_mut(EntityId(2))
            .unwrap()
            .set_target(Vec3::planar(1.0, 0.0), t0);

        reg.advance_all(t0, Some(EntityId(1)));

        assert!(reg.try_get(EntityId(1)).unwrap().is_moving());
        assert_eq!(
            reg.try_get(EntityId(2)).unwrap().position(),
            Vec3::planar(1.0, 0.0)
        );
    }
}
