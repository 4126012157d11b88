//! Emergency stop.
//!
//! Triggering a stop pre-empts everything else and plays a short throttle
//! sequence, one step per output tick:
//!
//! ```text
//! Start ──► NegOne ──► PosOne ──► NegTwo ──(throttle ramps +0.05/tick)──► Idle
//! -scale     +0.01     -scale      -scale+0.05 ... 0.0
//! ```
//!
//! The reverse pulse brakes an ESC that needs reverse-neutral-reverse to
//! engage its brake, the ramp releases it without a jolt.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::control_scaler::{ControllerState, DriveMode};

/// Throttle emitted in the neutral step between the two reverse pulses
pub const ESTOP_NEUTRAL_PULSE: f32 = 0.01;
/// Throttle increase per tick while releasing the brake
pub const ESTOP_RAMP_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EStopState {
    #[default]
    Idle,
    Start,
    NegOne,
    PosOne,
    NegTwo,
}

impl EStopState {
    pub fn is_active(&self) -> bool {
        *self != EStopState::Idle
    }

    /// Advance one tick.
    ///
    /// Returns the `(angle, throttle)` to emit, or `None` when idle. `throttle`
    /// is the controller throttle, rewritten by the release ramp.
    pub fn advance(&mut self, throttle: &mut f32, throttle_scale: f32) -> Option<(f32, f32)> {
        let emitted = match *self {
            EStopState::Idle => return None,
            EStopState::Start => {
                *self = EStopState::NegOne;
                -throttle_scale
            }
            EStopState::NegOne => {
                *self = EStopState::PosOne;
                ESTOP_NEUTRAL_PULSE
            }
            EStopState::PosOne => {
                *self = EStopState::NegTwo;
                *throttle = -throttle_scale;
                *throttle
            }
            EStopState::NegTwo => {
                *throttle += ESTOP_RAMP_STEP;
                if *throttle >= 0.0 {
                    *throttle = 0.0;
                    *self = EStopState::Idle;
                    debug!("E-Stop sequence complete");
                }
                *throttle
            }
        };
        Some((0.0, emitted))
    }
}

impl ControllerState {
    /// Start (or restart) the stop sequence and drop into a safe manual state.
    pub fn emergency_stop(&mut self) {
        warn!("E-Stop!!!");
        self.mode = DriveMode::User;
        self.recording = false;
        self.constant_throttle = false;
        self.estop_state = EStopState::Start;
        self.throttle = 0.0;
    }

    /// Run one E-Stop step, `None` when no stop is in progress.
    pub fn advance_estop(&mut self) -> Option<(f32, f32)> {
        let scale = self.throttle_scale;
        self.estop_state.advance(&mut self.throttle, scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_emits_nothing() {
        let mut state = EStopState::Idle;
        let mut throttle = 0.3;
        assert_eq!(state.advance(&mut throttle, 1.0), None);
        assert_eq!(throttle, 0.3);
    }

    #[test]
    fn test_full_sequence_at_full_scale() {
        let mut state = ControllerState::default();
        state.emergency_stop();

        assert_eq!(state.advance_estop(), Some((0.0, -1.0)));
        assert_eq!(state.advance_estop(), Some((0.0, 0.01)));
        assert_eq!(state.advance_estop(), Some((0.0, -1.0)));
        let (angle, throttle) = state.advance_estop().unwrap();
        assert_eq!(angle, 0.0);
        assert!((throttle + 0.95).abs() < 1e-6);

        let mut last = throttle;
        let mut ticks = 0;
        while state.estop_state.is_active() {
            let (_, throttle) = state.advance_estop().unwrap();
            assert!(throttle > last);
            last = throttle;
            ticks += 1;
            assert!(ticks <= 25, "ramp never finished");
        }
        assert_eq!(last, 0.0);
        assert_eq!(state.throttle, 0.0);
        assert_eq!(state.advance_estop(), None);
    }

    #[test]
    fn test_pulses_follow_throttle_scale() {
        let mut state = ControllerState::default();
        state.throttle_scale = 0.5;
        state.emergency_stop();
        assert_eq!(state.advance_estop(), Some((0.0, -0.5)));
        assert_eq!(state.advance_estop(), Some((0.0, 0.01)));
        assert_eq!(state.advance_estop(), Some((0.0, -0.5)));
    }

    #[test]
    fn test_emergency_stop_resets_controls() {
        let mut state = ControllerState::default();
        state.toggle_mode();
        state.toggle_constant_throttle();
        state.recording = true;

        state.emergency_stop();
        assert_eq!(state.mode, DriveMode::User);
        assert!(!state.recording);
        assert!(!state.constant_throttle);
        assert_eq!(state.throttle, 0.0);
        assert_eq!(state.estop_state, EStopState::Start);
    }

    #[test]
    fn test_retrigger_restarts_sequence() {
        let mut state = ControllerState::default();
        state.emergency_stop();
        state.advance_estop();
        state.advance_estop();
        state.advance_estop();
        assert_eq!(state.estop_state, EStopState::NegTwo);

        state.emergency_stop();
        assert_eq!(state.advance_estop(), Some((0.0, -1.0)));
    }
}
