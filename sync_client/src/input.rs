//! Input handling.
//!
//! In a real client this would integrate with windowing and keyboard/gamepad
//! sampling. Here input is a pair of axes, optionally produced by a looping
//! script for headless demo clients.

use sync_shared::math::Vec3;

/// Directional input at a moment in time. Axes are clamped to `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    pub x: f32,
    pub y: f32,
}

impl InputState {
    pub const IDLE: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(-1.0, 1.0),
            y: y.clamp(-1.0, 1.0),
        }
    }

    pub fn direction(self) -> Vec3 {
        Vec3::planar(self.x.clamp(-1.0, 1.0), self.y.clamp(-1.0, 1.0))
    }

    pub fn is_idle(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// A looping sequence of `(seconds, input)` segments.
#[derive(Debug, Clone)]
pub struct InputScript {
    segments: Vec<(f32, InputState)>,
    period: f32,
}

impl InputScript {
    pub fn new(segments: Vec<(f32, InputState)>) -> Self {
        let period = segments.iter().map(|(d, _)| d.max(0.0)).sum();
        Self { segments, period }
    }

    /// Walks right, pauses, walks left, pauses.
    pub fn patrol() -> Self {
        Self::new(vec![
            (1.0, InputState::new(1.0, 0.0)),
            (0.5, InputState::IDLE),
            (1.0, InputState::new(-1.0, 0.0)),
            (0.5, InputState::IDLE),
        ])
    }

    /// Input active `elapsed` seconds into the script.
    pub fn sample(&self, elapsed: f32) -> InputState {
        if self.period <= 0.0 {
            return InputState::IDLE;
        }
        let mut t = elapsed.rem_euclid(self.period);
        for (duration, input) in &self.segments {
            let duration = duration.max(0.0);
            if t < duration {
                return *input;
            }
            t -= duration;
        }
        self.segments
            .last()
            .map(|(_, input)| *input)
            .unwrap_or(InputState::IDLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes_are_clamped() {
        let input = InputState::new(3.0, -7.0);
        assert_eq!(input.direction(), Vec3::planar(1.0, -1.0));
        assert!(!input.is_idle());
        assert!(InputState::IDLE.is_idle());
    }

    #[test]
    fn script_loops() {
        let script = InputScript::patrol();
        assert_eq!(script.sample(0.2), InputState::new(1.0, 0.0));
        assert!(script.sample(1.2).is_idle());
        assert_eq!(script.sample(2.0), InputState::new(-1.0, 0.0));
        assert_eq!(script.sample(3.2), InputState::new(1.0, 0.0));
    }

    #[test]
    fn empty_script_is_idle() {
        assert!(InputScript::new(Vec::new()).sample(1.0).is_idle());
    }
}
