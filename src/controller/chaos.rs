//! Chaos monkey: a forced steering value for robustness testing of the
//! autopilot. While set it replaces the stick angle and suppresses recording.

use tracing::info;

use super::control_scaler::ControllerState;

pub const CHAOS_ANGLE: f32 = 0.2;

impl ControllerState {
    pub fn chaos_monkey_on_left(&mut self) {
        self.chaos_angle = Some(-CHAOS_ANGLE);
        info!("chaos monkey: steering {}", -CHAOS_ANGLE);
    }

    pub fn chaos_monkey_on_right(&mut self) {
        self.chaos_angle = Some(CHAOS_ANGLE);
        info!("chaos monkey: steering {}", CHAOS_ANGLE);
    }

    pub fn chaos_monkey_off(&mut self) {
        if self.chaos_angle.take().is_some() {
            info!("chaos monkey off");
        }
    }
}
