//! Interpolation.
//!
//! The server relays discrete position updates at whatever cadence the
//! sending client moves. The client renders at its own rate and eases each
//! remote entity toward its latest target. The easing window is the wall time
//! between the last two updates, so motion tracks the true update cadence
//! instead of a fixed constant.

use std::time::{Duration, Instant};

use sync_shared::{entity::EntityId, math::Vec3};

/// Horizontal facing used to flip the sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn sign(self) -> i8 {
        match self {
            Facing::Left => -1,
            Facing::Right => 1,
        }
    }
}

/// Visual state of one synchronized entity.
#[derive(Debug, Clone)]
pub struct RemoteEntity {
    id: EntityId,
    current: Vec3,
    target: Vec3,
    interp_start: Option<Instant>,
    interp_duration: Duration,
    last_update: Option<Instant>,
    facing: Facing,
    moving: bool,
}

impl RemoteEntity {
    /// Creates an idle entity resting at `position`.
    pub fn new(id: EntityId, position: Vec3) -> Self {
        Self {
            id,
            current: position,
            target: position,
            interp_start: None,
            interp_duration: Duration::ZERO,
            last_update: None,
            facing: Facing::default(),
            moving: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Currently displayed position.
    pub fn position(&self) -> Vec3 {
        self.current
    }

    /// Last accepted destination.
    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Animation signal: true while the last advance still had distance to cover.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn is_interpolating(&self) -> bool {
        self.current != self.target
    }

    pub fn interp_duration(&self) -> Duration {
        self.interp_duration
    }

    /// Accepts a new destination observed at `now`.
    ///
    /// The first update after creation gets a zero window, which makes the
    /// next [`advance`](Self::advance) snap straight to it.
    pub fn set_target(&mut self, position: Vec3, now: Instant) {
        self.interp_duration = self
            .last_update
            .map(|prev| now.saturating_duration_since(prev))
            .unwrap_or(Duration::ZERO);
        self.target = position;
        self.interp_start = Some(now);
        self.last_update = Some(now);
    }

    /// Moves the displayed position toward the target.
    ///
    /// Each call re-bases on the current position rather than the point where
    /// the window started, so the entity closes in on the target and lands on
    /// it exactly once the window has elapsed.
    pub fn advance(&mut self, now: Instant) {
        self.update_facing(self.target);
        self.moving = self.current != self.target;
        if !self.moving {
            return;
        }
        let t = self.progress(now);
        self.current = self.current.lerp(self.target, t);
    }

    /// Places the entity at `position` with no easing.
    pub fn snap_to(&mut self, position: Vec3) {
        self.update_facing(position);
        self.moving = self.current != position;
        self.current = position;
        self.target = position;
        self.interp_start = None;
    }

    fn update_facing(&mut self, toward: Vec3) {
        if toward.x > self.current.x {
            self.facing = Facing::Right;
        } else if toward.x < self.current.x {
            self.facing = Facing::Left;
        }
    }

    fn progress(&self, now: Instant) -> f32 {
        let Some(start) = self.interp_start else {
            return 1.0;
        };
        if self.interp_duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(start).as_secs_f32();
        (elapsed / self.interp_duration.as_secs_f32()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_update_snaps() {
        let t0 = Instant::now();
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        e.set_target(Vec3::planar(4.0, 0.0), t0);
        assert_eq!(e.interp_duration(), Duration::ZERO);
        e.advance(t0);
        assert_eq!(e.position(), Vec3::planar(4.0, 0.0));
        assert!(!e.is_interpolating());
    }

    #[test]
    fn converges_exactly_after_window() {
        let t0 = Instant::now();
        let d = ms(100);
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        e.set_target(Vec3::ZERO, t0);
        e.advance(t0);

        e.set_target(Vec3::planar(10.0, 0.0), t0 + d);
        assert_eq!(e.interp_duration(), d);

        e.advance(t0 + d + d / 2);
        let mid = e.position();
        assert!(mid.x > 0.0 && mid.x < 10.0, "mid = {mid:?}");
        assert!(e.is_moving());

        e.advance(t0 + d + d);
        assert_eq!(e.position(), Vec3::planar(10.0, 0.0));
        assert!(!e.is_interpolating());
    }

    #[test]
    fn advance_rebases_on_current_position() {
        let t0 = Instant::now();
        let d = ms(100);
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        e.set_target(Vec3::ZERO, t0);
        e.set_target(Vec3::planar(8.0, 0.0), t0 + d);

        // Two quarter-window advances: 0 -> 2 (t=.25), then 2 -> 5 (t=.5).
        e.advance(t0 + d + d / 4);
        assert!((e.position().x - 2.0).abs() < 1e-4);
        e.advance(t0 + d + d / 2);
        assert!((e.position().x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn facing_follows_target_side() {
        let t0 = Instant::now();
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        e.snap_to(Vec3::planar(-1.0, 0.0));
        assert_eq!(e.facing(), Facing::Left);

        e.set_target(Vec3::planar(5.0, 0.0), t0);
        e.advance(t0);
        assert_eq!(e.facing(), Facing::Right);
        assert_eq!(e.facing().sign(), 1);

        e.set_target(Vec3::planar(-5.0, 0.0), t0 + ms(50));
        e.advance(t0 + ms(50));
        assert_eq!(e.facing(), Facing::Left);
        assert_eq!(e.facing().sign(), -1);
    }

    #[test]
    fn vertical_motion_keeps_facing() {
        let t0 = Instant::now();
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        e.snap_to(Vec3::planar(-1.0, 0.0));
        assert_eq!(e.facing(), Facing::Left);
        e.set_target(Vec3::planar(-1.0, 3.0), t0);
        e.advance(t0);
        assert_eq!(e.facing(), Facing::Left);
    }

    #[test]
    fn idle_entity_reports_not_moving() {
        let t0 = Instant::now();
        let mut e = RemoteEntity::new(EntityId(1), Vec3::planar(1.0, 1.0));
        e.advance(t0);
        assert!(!e.is_moving());
        assert_eq!(e.position(), e.target());
    }

    #[test]
    fn snap_sets_current_and_target() {
        let mut e = RemoteEntity::new(EntityId(1), Vec3::ZERO);
        e.snap_to(Vec3::planar(2.0, 3.0));
        assert_eq!(e.position(), Vec3::planar(2.0, 3.0));
        assert_eq!(e.target(), Vec3::planar(2.0, 3.0));
        assert!(e.is_moving());
        e.snap_to(Vec3::planar(2.0, 3.0));
        assert!(!e.is_moving());
    }
}
