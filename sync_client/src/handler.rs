//! Inbound protocol handling.
//!
//! Every message is handled on its own; nothing here waits for a follow-up.
//! Stale moves, moves or logins for unknown entities, and duplicate creates
//! are expected under unordered delivery and are absorbed, not reported as
//! errors. The returned [`Applied`] says which case was hit.

use std::{collections::HashMap, time::Instant};

use sync_shared::{entity::EntityId, math::Vec3, net::ClientId, net::SyncMsg};
use tracing::{debug, info};

use crate::{registry::EntityRegistry, session::PlayerSession, staleness::StalenessFilter};

/// Outcome of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// State changed.
    Applied,
    /// Move older than the last accepted one from the same source.
    Stale,
    /// Referenced entity does not exist.
    UnknownEntity,
    /// Create for an id that already exists.
    Duplicate,
    /// Not a sync message.
    Ignored,
}

#[derive(Default)]
pub struct SyncProtocolHandler {
    registry: EntityRegistry,
    filter: StalenessFilter,
    sessions: HashMap<ClientId, PlayerSession>,
}

impl SyncProtocolHandler {
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    pub fn staleness(&self) -> &StalenessFilter {
        &self.filter
    }

    pub fn session(&self, source: ClientId) -> Option<&PlayerSession> {
        self.sessions.get(&source)
    }

    /// Entity bound to `source`, if any.
    pub fn entity_of(&self, source: ClientId) -> Option<EntityId> {
        self.session(source).and_then(PlayerSession::entity)
    }

    /// Dispatches one message. `now` stamps the interpolation window of moves.
    pub fn handle(&mut self, msg: SyncMsg, now: Instant) -> Applied {
        match msg {
            SyncMsg::Move {
                source,
                entity,
                position,
                timestamp,
            } => self.on_move(source, entity, position, timestamp, now),
            SyncMsg::Create { entity, position } => self.on_create(entity, position),
            SyncMsg::Remove { entity } => self.on_remove(entity),
            SyncMsg::Login { source, entity } => self.on_login(source, entity),
            other => {
                debug!(?other, "Not a sync message");
                Applied::Ignored
            }
        }
    }

    pub fn on_move(
        &mut self,
        source: ClientId,
        entity: EntityId,
        position: Vec3,
        timestamp: i64,
        now: Instant,
    ) -> Applied {
        if !self.filter.accept(source, timestamp) {
            debug!(source = ?source, entity = %entity, timestamp, "Stale move dropped");
            return Applied::Stale;
        }
        let Some(remote) = self.registry.try_get_mut(entity) else {
            debug!(source = ?source, entity = %entity, "Move for unknown entity dropped");
            return Applied::UnknownEntity;
        };
        remote.set_target(position, now);
        Applied::Applied
    }

    pub fn on_create(&mut self, entity: EntityId, position: Vec3) -> Applied {
        if self.registry.create(entity, position) {
            Applied::Applied
        } else {
            Applied::Duplicate
        }
    }

    pub fn on_remove(&mut self, entity: EntityId) -> Applied {
        if !self.registry.remove(entity) {
            return Applied::UnknownEntity;
        }
        // Sessions never outlive the entity they point at.
        self.sessions.retain(|source, session| {
            let keep = session.entity() != Some(entity);
            if !keep {
                debug!(source = ?source, entity = %entity, "Session dropped with its entity");
            }
            keep
        });
        Applied::Applied
    }

    pub fn on_login(&mut self, source: ClientId, entity: EntityId) -> Applied {
        if !self.registry.contains(entity) {
            info!(source = ?source, entity = %entity, "Login for unknown entity ignored");
            return Applied::UnknownEntity;
        }
        self.sessions
            .entry(source)
            .or_insert_with(|| PlayerSession::new(source))
            .bind(entity);
        Applied::Applied
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const A: ClientId = ClientId(1);

    #[test]
    fn move_and_remove_on_empty_registry_are_noops() {
        let mut h = SyncProtocolHandler::default();
        let now = Instant::now();
        assert_eq!(h.on_remove(EntityId(42)), Applied::UnknownEntity);
        assert_eq!(
            h.on_move(A, EntityId(42), Vec3::planar(1.0, 1.0), 5, now),
            Applied::UnknownEntity
        );
        assert!(h.registry().is_empty());
    }

    #[test]
    fn stale_move_is_dropped_before_lookup() {
        let mut h = SyncProtocolHandler::default();
        let now = Instant::now();
        h.on_create(EntityId(1), Vec3::ZERO);
        assert_eq!(
            h.on_move(A, EntityId(1), Vec3::planar(3.0, 0.0), 100, now),
            Applied::Applied
        );
        assert_eq!(
            h.on_move(A, EntityId(1), Vec3::planar(1.0, 0.0), 90, now),
            Applied::Stale
        );
        assert_eq!(
            h.registry().try_get(EntityId(1)).unwrap().target(),
            Vec3::planar(3.0, 0.0)
        );
    }

    #[test]
    fn move_to_unknown_entity_still_advances_watermark() {
        let mut h = SyncProtocolHandler::default();
        let now = Instant::now();
        h.on_move(A, EntityId(7), Vec3::ZERO, 10, now);
        assert_eq!(h.staleness().last_accepted(A), Some(10));
    }

    #[test]
    fn duplicate_create_reports_duplicate() {
        let mut h = SyncProtocolHandler::default();
        assert_eq!(h.on_create(EntityId(1), Vec3::ZERO), Applied::Applied);
        assert_eq!(
            h.on_create(EntityId(1), Vec3::planar(1.0, 0.0)),
            Applied::Duplicate
        );
    }

    #[test]
    fn login_binds_only_known_entities() {
        let mut h = SyncProtocolHandler::default();
        assert_eq!(h.on_login(A, EntityId(5)), Applied::UnknownEntity);
        assert!(h.session(A).is_none());

        h.on_create(EntityId(5), Vec3::ZERO);
        assert_eq!(h.on_login(A, EntityId(5)), Applied::Applied);
        assert_eq!(h.entity_of(A), Some(EntityId(5)));
    }

    #[test]
    fn remove_drops_sessions_bound_to_the_entity() {
        let peer = ClientId(2);
        let mut h = SyncProtocolHandler::default();
        let now = Instant::now();
        h.on_create(EntityId(5), Vec3::ZERO);
        h.on_create(EntityId(6), Vec3::ZERO);
        h.on_login(peer, EntityId(5));
        h.on_login(A, EntityId(6));
        h.on_move(peer, EntityId(5), Vec3::planar(1.0, 0.0), 10, now);

        assert_eq!(h.on_remove(EntityId(5)), Applied::Applied);
        assert!(!h.registry().contains(EntityId(5)));
        assert_eq!(h.entity_of(peer), None);
        assert!(h.session(peer).is_none());
        // Unrelated sessions stay bound.
        assert_eq!(h.entity_of(A), Some(EntityId(6)));
        // The watermark is per source and survives the entity.
        assert_eq!(h.staleness().last_accepted(peer), Some(10));
    }

    #[test]
    fn handle_dispatches_by_variant() {
        let mut h = SyncProtocolHandler::default();
        let t0 = Instant::now();
        let create = SyncMsg::Create {
            entity: EntityId(2),
            position: Vec3::ZERO,
        };
        assert_eq!(h.handle(create, t0), Applied::Applied);
        let mv = SyncMsg::Move {
            source: A,
            entity: EntityId(2),
            position: Vec3::planar(2.0, 0.0),
            timestamp: 1,
        };
        assert_eq!(h.handle(mv, t0), Applied::Applied);
        h.registry_mut().advance_all(t0 + Duration::from_millis(1), None);
        assert_eq!(
            h.registry().try_get(EntityId(2)).unwrap().position(),
            Vec3::planar(2.0, 0.0)
        );
        let welcome = SyncMsg::Welcome { client_id: A };
        assert_eq!(h.handle(welcome, t0), Applied::Ignored);
    }
}
