//! Device profiles: semantic control names and their default trigger bindings.
//!
//! A profile is a plain value handed to the controller at construction. It
//! replaces per-device driver variants: the generic poller is parameterized
//! by the name tables and bindings in here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::trigger_dispatch::{AxisAction, ButtonAction, TriggerBindings};

/// Semantic identifier of a physical control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlId {
    // Axes
    LeftStickHorz,
    LeftStickVert,
    RightStickHorz,
    RightStickVert,
    LeftTriggerAxis,
    RightTriggerAxis,
    DpadLeftright,
    DpadUpdown,
    TiltA,
    TiltB,
    TiltC,
    MotionA,
    MotionB,
    MotionC,

    // Buttons
    Square,
    Cross,
    Circle,
    Triangle,
    #[serde(rename = "L1")]
    L1,
    #[serde(rename = "R1")]
    R1,
    #[serde(rename = "L2")]
    L2,
    #[serde(rename = "R2")]
    R2,
    #[serde(rename = "L3")]
    L3,
    #[serde(rename = "R3")]
    R3,
    Pad,
    Share,
    Options,
    #[serde(rename = "PS")]
    Ps,
}

impl ControlId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlId::LeftStickHorz => "left_stick_horz",
            ControlId::LeftStickVert => "left_stick_vert",
            ControlId::RightStickHorz => "right_stick_horz",
            ControlId::RightStickVert => "right_stick_vert",
            ControlId::LeftTriggerAxis => "left_trigger_axis",
            ControlId::RightTriggerAxis => "right_trigger_axis",
            ControlId::DpadLeftright => "dpad_leftright",
            ControlId::DpadUpdown => "dpad_updown",
            ControlId::TiltA => "tilt_a",
            ControlId::TiltB => "tilt_b",
            ControlId::TiltC => "tilt_c",
            ControlId::MotionA => "motion_a",
            ControlId::MotionB => "motion_b",
            ControlId::MotionC => "motion_c",
            ControlId::Square => "square",
            ControlId::Cross => "cross",
            ControlId::Circle => "circle",
            ControlId::Triangle => "triangle",
            ControlId::L1 => "L1",
            ControlId::R1 => "R1",
            ControlId::L2 => "L2",
            ControlId::R2 => "R2",
            ControlId::L3 => "L3",
            ControlId::R3 => "R3",
            ControlId::Pad => "pad",
            ControlId::Share => "share",
            ControlId::Options => "options",
            ControlId::Ps => "PS",
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which built-in profile a configuration starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    #[default]
    Ps4,
}

/// Name tables and trigger bindings for one kind of gamepad
#[derive(Debug, Clone, Default)]
pub struct DeviceProfile {
    pub name: String,
    /// Raw axis code -> semantic name
    pub axis_names: HashMap<u8, ControlId>,
    /// Raw button code -> semantic name
    pub button_names: HashMap<u16, ControlId>,
    pub bindings: TriggerBindings,
}

impl DeviceProfile {
    pub fn from_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Ps4 => Self::ps4(),
        }
    }

    /// Sony DualShock 4 as exposed by the Linux joystick driver.
    pub fn ps4() -> Self {
        let axis_names = HashMap::from([
            (0x00, ControlId::LeftStickHorz),
            (0x01, ControlId::LeftStickVert),
            (0x02, ControlId::RightStickHorz),
            (0x05, ControlId::RightStickVert),
            (0x03, ControlId::LeftTriggerAxis),
            (0x04, ControlId::RightTriggerAxis),
            (0x10, ControlId::DpadLeftright),
            (0x11, ControlId::DpadUpdown),
            (0x19, ControlId::TiltA),
            (0x1a, ControlId::TiltB),
            (0x1b, ControlId::TiltC),
            (0x06, ControlId::MotionA),
            (0x07, ControlId::MotionB),
            (0x08, ControlId::MotionC),
        ]);

        let button_names = HashMap::from([
            (0x130, ControlId::Square),
            (0x131, ControlId::Cross),
            (0x132, ControlId::Circle),
            (0x133, ControlId::Triangle),
            (0x134, ControlId::L1),
            (0x135, ControlId::R1),
            (0x136, ControlId::L2),
            (0x137, ControlId::R2),
            (0x13a, ControlId::L3),
            (0x13b, ControlId::R3),
            (0x13d, ControlId::Pad),
            (0x138, ControlId::Share),
            (0x139, ControlId::Options),
            (0x13c, ControlId::Ps),
        ]);

        let mut bindings = TriggerBindings::default();
        bindings
            .button_down
            .insert(ControlId::Share, ButtonAction::ToggleMode);
        bindings
            .button_down
            .insert(ControlId::Circle, ButtonAction::ToggleManualRecording);
        bindings
            .button_down
            .insert(ControlId::Triangle, ButtonAction::EraseLastRecords);
        bindings
            .button_down
            .insert(ControlId::Cross, ButtonAction::EmergencyStop);
        bindings
            .button_down
            .insert(ControlId::L1, ButtonAction::IncreaseMaxThrottle);
        bindings
            .button_down
            .insert(ControlId::R1, ButtonAction::DecreaseMaxThrottle);
        bindings
            .button_down
            .insert(ControlId::Options, ButtonAction::ToggleConstantThrottle);
        bindings
            .axis
            .insert(ControlId::LeftStickHorz, AxisAction::SetSteering);
        bindings
            .axis
            .insert(ControlId::RightStickVert, AxisAction::SetThrottle);

        Self {
            name: "ps4".to_string(),
            axis_names,
            button_names,
            bindings,
        }
    }
}
