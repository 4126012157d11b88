//! Control Scaler - turns normalized stick values into drive commands
//!
//! Owns [`ControllerState`], the single piece of shared state of the
//! subsystem, and the operations bound to controls: steering/throttle
//! scaling, the throttle limit, constant throttle, drive mode and the
//! recording policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use super::estop::EStopState;

/// Step applied to the throttle limit by one button press
pub const THROTTLE_SCALE_STEP: f32 = 0.01;

/// Who is in charge of the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Human steering and throttle
    #[default]
    User,
    /// Autopilot steering, human throttle
    LocalAngle,
    /// Autopilot steering and throttle
    Local,
}

impl DriveMode {
    pub fn next(self) -> Self {
        match self {
            DriveMode::User => DriveMode::LocalAngle,
            DriveMode::LocalAngle => DriveMode::Local,
            DriveMode::Local => DriveMode::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriveMode::User => "user",
            DriveMode::LocalAngle => "local_angle",
            DriveMode::Local => "local",
        }
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scaling and recording parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSettings {
    /// Throttle limit in [0, 1]
    pub throttle_scale: f32,
    /// Steering multiplier; negative values reverse steering
    pub steering_scale: f32,
    /// +1.0 keeps the stick direction, -1.0 flips it
    pub throttle_dir: f32,
    /// Minimum |throttle| that starts auto recording
    pub dead_zone: f32,
    pub auto_record_on_throttle: bool,
}

impl Default for ScaleSettings {
    fn default() -> Self {
        Self {
            throttle_scale: 1.0,
            steering_scale: 1.0,
            throttle_dir: -1.0,
            dead_zone: 0.0,
            auto_record_on_throttle: true,
        }
    }
}

/// Complete controller state shared between the poller and the tick consumer
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub angle: f32,
    pub throttle: f32,
    pub mode: DriveMode,
    pub recording: bool,
    pub estop_state: EStopState,
    pub constant_throttle: bool,
    pub chaos_angle: Option<f32>,
    pub throttle_scale: f32,
    pub steering_scale: f32,
    pub dead_zone: f32,
    pub throttle_dir: f32,
    pub auto_record_on_throttle: bool,
    pub last_raw_throttle_axis: f32,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new(&ScaleSettings::default())
    }
}

impl ControllerState {
    pub fn new(settings: &ScaleSettings) -> Self {
        Self {
            angle: 0.0,
            throttle: 0.0,
            mode: DriveMode::User,
            recording: false,
            estop_state: EStopState::Idle,
            constant_throttle: false,
            chaos_angle: None,
            throttle_scale: settings.throttle_scale.clamp(0.0, 1.0),
            steering_scale: settings.steering_scale,
            dead_zone: settings.dead_zone,
            throttle_dir: settings.throttle_dir,
            auto_record_on_throttle: settings.auto_record_on_throttle,
            last_raw_throttle_axis: 0.0,
        }
    }

    pub fn set_steering(&mut self, value: f32) {
        self.angle = self.steering_scale * value;
    }

    pub fn set_throttle(&mut self, value: f32) {
        self.last_raw_throttle_axis = value;
        self.throttle = self.axis_throttle();
        self.on_throttle_changes();
    }

    pub fn set_deadzone(&mut self, value: f32) {
        self.dead_zone = value;
    }

    pub fn increase_max_throttle(&mut self) {
        self.set_throttle_scale(self.throttle_scale + THROTTLE_SCALE_STEP);
    }

    pub fn decrease_max_throttle(&mut self) {
        self.set_throttle_scale(self.throttle_scale - THROTTLE_SCALE_STEP);
    }

    /// Constant throttle, when on, wins over the stick: the new limit becomes
    /// the throttle itself.
    fn set_throttle_scale(&mut self, scale: f32) {
        self.throttle_scale = round2(scale.clamp(0.0, 1.0));
        self.throttle = if self.constant_throttle {
            self.throttle_scale
        } else {
            self.axis_throttle()
        };
        self.on_throttle_changes();
        info!("throttle_scale: {}", self.throttle_scale);
    }

    pub fn toggle_constant_throttle(&mut self) {
        self.constant_throttle = !self.constant_throttle;
        self.throttle = if self.constant_throttle {
            self.throttle_scale
        } else {
            0.0
        };
        self.on_throttle_changes();
        info!("constant_throttle: {}", self.constant_throttle);
    }

    pub fn toggle_manual_recording(&mut self) {
        if self.auto_record_on_throttle {
            info!("auto record on throttle is enabled.");
        } else {
            self.recording = !self.recording;
        }
        info!("recording: {}", self.recording);
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.next();
        info!("new mode: {}", self.mode);
    }

    fn axis_throttle(&self) -> f32 {
        self.throttle_dir * self.last_raw_throttle_axis * self.throttle_scale
    }

    /// Recording follows the throttle. Without auto recording any throttle
    /// change clears a manually started recording.
    fn on_throttle_changes(&mut self) {
        self.recording = self.auto_record_on_throttle
            && self.throttle.abs() > self.dead_zone
            && self.mode == DriveMode::User;
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
