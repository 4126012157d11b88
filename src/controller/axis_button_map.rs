use std::collections::HashMap;
use std::fmt;

use super::device_channel::{ControlKind, DeviceInfo};
use super::profile::{ControlId, DeviceProfile};

/// Full scale of a raw axis reading
pub const AXIS_FULL_SCALE: f32 = 32767.0;

/// Name of a device channel: a profile identifier or a placeholder for raw
/// codes the profile does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlName {
    Known(ControlId),
    Unmapped { kind: ControlKind, code: u16 },
}

impl ControlName {
    pub fn id(&self) -> Option<ControlId> {
        match self {
            ControlName::Known(id) => Some(*id),
            ControlName::Unmapped { .. } => None,
        }
    }
}

impl fmt::Display for ControlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlName::Known(id) => write!(f, "{}", id),
            ControlName::Unmapped {
                kind: ControlKind::Axis,
                code,
            } => write!(f, "unknown(0x{:02x})", code),
            ControlName::Unmapped {
                kind: ControlKind::Button,
                code,
            } => write!(f, "unknown(0x{:03x})", code),
        }
    }
}

/// Edge derived from a button record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEdge {
    /// Press or autorepeat (state >= 1)
    Down,
    /// Release of a button that was down
    Up,
}

/// Index -> name tables of an opened device plus the last-known value of
/// every channel. Mutated only by the input poller.
#[derive(Debug, Clone, Default)]
pub struct AxisButtonMap {
    axis_map: Vec<ControlName>,
    button_map: Vec<ControlName>,
    axis_states: HashMap<ControlName, f32>,
    button_states: HashMap<ControlName, i16>,
}

impl AxisButtonMap {
    pub fn build(profile: &DeviceProfile, info: &DeviceInfo) -> Self {
        let mut map = Self::default();

        for code in &info.axis_codes {
            let name = profile
                .axis_names
                .get(code)
                .map(|id| ControlName::Known(*id))
                .unwrap_or(ControlName::Unmapped {
                    kind: ControlKind::Axis,
                    code: u16::from(*code),
                });
            map.axis_map.push(name);
            map.axis_states.insert(name, 0.0);
        }

        for code in &info.button_codes {
            let name = profile
                .button_names
                .get(code)
                .map(|id| ControlName::Known(*id))
                .unwrap_or(ControlName::Unmapped {
                    kind: ControlKind::Button,
                    code: *code,
                });
            map.button_map.push(name);
            map.button_states.insert(name, 0);
        }

        map
    }

    /// Name of a device-local index; `None` when the device never reported it.
    pub fn name_of(&self, kind: ControlKind, index: u8) -> Option<ControlName> {
        let table = match kind {
            ControlKind::Axis => &self.axis_map,
            ControlKind::Button => &self.button_map,
        };
        table.get(index as usize).copied()
    }

    /// Store a raw axis reading, returning the channel name and its value in [-1, 1].
    pub fn update_axis(&mut self, index: u8, raw: i16) -> Option<(ControlName, f32)> {
        let name = self.name_of(ControlKind::Axis, index)?;
        let value = normalize_axis(raw);
        self.axis_states.insert(name, value);
        Some((name, value))
    }

    /// Store a raw button state.
    ///
    /// Returns `Up` only if the button was previously seen down, so the
    /// first record seen for a button can never be a release.
    pub fn update_button(&mut self, index: u8, state: i16) -> Option<(ControlName, ButtonEdge)> {
        let name = self.name_of(ControlKind::Button, index)?;
        let previous = self.button_states.insert(name, state).unwrap_or(0);

        if state >= 1 {
            Some((name, ButtonEdge::Down))
        } else if state == 0 && previous >= 1 {
            Some((name, ButtonEdge::Up))
        } else {
            None
        }
    }

    pub fn axis_value(&self, name: &ControlName) -> Option<f32> {
        self.axis_states.get(name).copied()
    }

    pub fn button_state(&self, name: &ControlName) -> Option<i16> {
        self.button_states.get(name).copied()
    }

    pub fn axis_names(&self) -> &[ControlName] {
        &self.axis_map
    }

    pub fn button_names(&self) -> &[ControlName] {
        &self.button_map
    }
}

pub fn normalize_axis(raw: i16) -> f32 {
    (f32::from(raw) / AXIS_FULL_SCALE).clamp(-1.0, 1.0)
}
