//! Transport-agnostic client core.
//!
//! [`SyncClient`] is driven by an explicit [`tick`](SyncClient::tick) call.
//! Transport readers only ever push into its inbox; all registry, filter and
//! entity mutation happens inside `tick`, on the caller's thread.

use std::time::Instant;

use anyhow::Context;
use sync_shared::{config::SyncConfig, entity::EntityId, net::ClientId, net::SyncMsg};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    handler::{Applied, SyncProtocolHandler},
    input::InputState,
    movement::LocalMovementController,
    outbound::Outbound,
};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub applied: usize,
    pub dropped: usize,
    pub broadcast: bool,
}

/// Collects the collaborators a [`SyncClient`] cannot run without.
pub struct SyncClientBuilder {
    cfg: SyncConfig,
    local_id: Option<ClientId>,
    outbound: Option<Outbound>,
}

impl SyncClientBuilder {
    pub fn new(cfg: SyncConfig) -> Self {
        Self {
            cfg,
            local_id: None,
            outbound: None,
        }
    }

    pub fn local_id(mut self, id: ClientId) -> Self {
        self.local_id = Some(id);
        self
    }

    pub fn outbound(mut self, outbound: Outbound) -> Self {
        self.outbound = Some(outbound);
        self
    }

    /// Fails if a required collaborator was never supplied.
    pub fn build(self) -> anyhow::Result<SyncClient> {
        let local_id = self.local_id.context("local client id not resolved")?;
        let outbound = self.outbound.context("outbound sender not configured")?;
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        Ok(SyncClient {
            local_id,
            handler: SyncProtocolHandler::default(),
            movement: LocalMovementController::new(local_id, &self.cfg, outbound),
            inbox,
            inbox_tx,
            disconnect_reason: None,
        })
    }
}

pub struct SyncClient {
    local_id: ClientId,
    handler: SyncProtocolHandler,
    movement: LocalMovementController,
    inbox: mpsc::UnboundedReceiver<SyncMsg>,
    inbox_tx: mpsc::UnboundedSender<SyncMsg>,
    disconnect_reason: Option<String>,
}

impl SyncClient {
    pub fn local_id(&self) -> ClientId {
        self.local_id
    }

    /// Sender that transport readers push inbound messages into.
    pub fn inbox(&self) -> mpsc::UnboundedSender<SyncMsg> {
        self.inbox_tx.clone()
    }

    pub fn handler(&self) -> &SyncProtocolHandler {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut SyncProtocolHandler {
        &mut self.handler
    }

    /// The entity this client drives, once the server has acknowledged login.
    pub fn local_entity(&self) -> Option<EntityId> {
        self.handler.entity_of(self.local_id)
    }

    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnect_reason.as_deref()
    }

    /// One frame: apply queued inbound messages, run local movement, then
    /// advance interpolation of every remote entity.
    pub fn tick(&mut self, dt: f32, input: InputState, now: Instant) -> TickSummary {
        let mut summary = TickSummary::default();

        while let Ok(msg) = self.inbox.try_recv() {
            if let SyncMsg::Disconnect { reason } = &msg {
                info!(reason = %reason, "Disconnected by server");
                self.disconnect_reason = Some(reason.clone());
                continue;
            }
            match self.handler.handle(msg, now) {
                Applied::Applied => summary.applied += 1,
                outcome => {
                    debug!(?outcome, "Inbound message absorbed");
                    summary.dropped += 1;
                }
            }
        }

        let local = self.local_entity();
        if let Some(entity) = local.and_then(|id| self.handler.registry_mut().try_get_mut(id)) {
            summary.broadcast = self.movement.step(dt, input, entity);
        }

        self.handler.registry_mut().advance_all(now, local);
        summary
    }
}
