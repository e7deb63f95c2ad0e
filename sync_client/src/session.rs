//! Player session: which entity belongs to a given source.

use sync_shared::{entity::EntityId, net::ClientId};
use tracing::info;

#[derive(Debug, Clone)]
pub struct PlayerSession {
    source: ClientId,
    entity: Option<EntityId>,
}

impl PlayerSession {
    /// An unbound session for `source`.
    pub fn new(source: ClientId) -> Self {
        Self {
            source,
            entity: None,
        }
    }

    pub fn source(&self) -> ClientId {
        self.source
    }

    /// The bound entity, if a login acknowledgment has arrived.
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    pub fn is_bound(&self) -> bool {
        self.entity.is_some()
    }

    /// Binds to `entity`. A later acknowledgment replaces the binding.
    pub fn bind(&mut self, entity: EntityId) {
        if let Some(prev) = self.entity.replace(entity) {
            info!(source = ?self.source, from = %prev, to = %entity, "Session rebound");
        } else {
            info!(source = ?self.source, entity = %entity, "Session bound");
        }
    }
}
