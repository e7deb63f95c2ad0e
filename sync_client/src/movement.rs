//! Local movement.
//!
//! Input is applied to the locally owned entity immediately (optimistic local
//! simulation) and the resulting position is broadcast at most once per
//! `sync_interval`, and only while the player is actually moving.

use sync_shared::{config::SyncConfig, net::ClientId, net::SyncMsg};
use tracing::trace;

use crate::{input::InputState, interp::RemoteEntity, outbound::Outbound};

pub struct LocalMovementController {
    client_id: ClientId,
    speed: f32,
    sync_interval: f32,
    timer: f32,
    outbound: Outbound,
}

impl LocalMovementController {
    pub fn new(client_id: ClientId, cfg: &SyncConfig, outbound: Outbound) -> Self {
        Self {
            client_id,
            speed: cfg.speed,
            sync_interval: cfg.sync_interval,
            timer: 0.0,
            outbound,
        }
    }

    /// Advances one simulated step of `dt` seconds for `entity`.
    ///
    /// Returns `true` if a position broadcast was queued this step.
    pub fn step(&mut self, dt: f32, input: InputState, entity: &mut RemoteEntity) -> bool {
        let displacement = input.direction() * (self.speed * dt);
        let position = entity.position() + displacement;
        entity.snap_to(position);

        self.timer += dt;
        if self.timer < self.sync_interval || input.is_idle() {
            return false;
        }
        self.timer = 0.0;
        trace!(entity = %entity.id(), ?position, "Queue position broadcast");
        self.outbound.send(SyncMsg::UnitMovement {
            client_id: self.client_id,
            position,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use sync_shared::{entity::EntityId, math::Vec3};
    use tokio::sync::mpsc;

    use super::*;

    fn controller(speed: f32) -> (LocalMovementController, mpsc::UnboundedReceiver<SyncMsg>) {
        let cfg = SyncConfig {
            speed,
            sync_interval: 0.1,
            ..SyncConfig::default()
        };
        let (out, rx) = Outbound::channel();
        (LocalMovementController::new(ClientId(1), &cfg, out), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SyncMsg>) -> Vec<SyncMsg> {
        let mut got = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            got.push(msg);
        }
        got
    }

    #[test]
    fn input_moves_entity_immediately() {
        let (mut ctl, _rx) = controller(2.0);
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        ctl.step(0.5, InputState::new(1.0, -1.0), &mut e);
        assert_eq!(e.position(), Vec3::planar(1.0, -1.0));
        assert_eq!(e.target(), e.position());
        assert!(e.is_moving());
    }

    #[test]
    fn broadcasts_are_rate_limited() {
        let (mut ctl, mut rx) = controller(1.0);
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        let mut queued = 0;
        // 62 samples at 16ms is just under a second of continuous input.
        for _ in 0..62 {
            if ctl.step(0.016, InputState::new(1.0, 0.0), &mut e) {
                queued += 1;
            }
        }
        assert_eq!(queued, 8);
        assert_eq!(drain(&mut rx).len(), 8);
    }

    #[test]
    fn broadcast_carries_latest_position() {
        let (mut ctl, mut rx) = controller(1.0);
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        assert!(ctl.step(0.2, InputState::new(1.0, 0.0), &mut e));
        let got = drain(&mut rx);
        assert_eq!(
            got,
            vec![SyncMsg::UnitMovement {
                client_id: ClientId(1),
                position: e.position(),
            }]
        );
    }

    #[test]
    fn stationary_player_sends_nothing() {
        let (mut ctl, mut rx) = controller(1.0);
        let mut e = RemoteEntity::new(EntityId(1), Vec3::planar(3.0, 3.0));
        for _ in 0..100 {
            assert!(!ctl.step(0.016, InputState::IDLE, &mut e));
        }
        assert!(drain(&mut rx).is_empty());
        assert!(!e.is_moving());
        assert_eq!(e.position(), Vec3::planar(3.0, 3.0));
    }

    #[test]
    fn first_move_after_idle_is_sent_at_once() {
        let (mut ctl, mut rx) = controller(1.0);
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        for _ in 0..20 {
            ctl.step(0.016, InputState::IDLE, &mut e);
        }
        assert!(ctl.step(0.016, InputState::new(0.0, 1.0), &mut e));
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
