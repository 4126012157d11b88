//! Trigger Dispatch - routing named controls to controller actions
//!
//! Three independent tables (axis, button down, button up) map a
//! [`ControlId`] to a closed set of actions. The tables are built once from
//! the profile and never change afterwards. A control without an entry is
//! simply ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use super::axis_button_map::{ButtonEdge, ControlName};
use super::profile::ControlId;

/// Action bound to an axis; receives the normalized value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisAction {
    SetSteering,
    SetThrottle,
    /// Explicitly unbinds an axis (e.g. when swapping sticks)
    Ignore,
}

/// Action bound to a button edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    ToggleMode,
    ToggleManualRecording,
    EraseLastRecords,
    EmergencyStop,
    IncreaseMaxThrottle,
    DecreaseMaxThrottle,
    ToggleConstantThrottle,
    ChaosMonkeyLeft,
    ChaosMonkeyRight,
    ChaosMonkeyOff,
}

/// Receiver of dispatched actions.
///
/// Handlers run inline on the polling thread, so implementations must not
/// block.
pub trait TriggerTarget: Send + Sync + fmt::Debug {
    fn on_axis(&self, action: AxisAction, value: f32);
    fn on_button(&self, action: ButtonAction);
}

/// Profile-supplied binding tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerBindings {
    pub axis: HashMap<ControlId, AxisAction>,
    pub button_down: HashMap<ControlId, ButtonAction>,
    pub button_up: HashMap<ControlId, ButtonAction>,
}

/// Immutable dispatch tables used by the poller
#[derive(Debug, Clone, Default)]
pub struct TriggerDispatch {
    axis_handlers: HashMap<ControlId, AxisAction>,
    button_down_handlers: HashMap<ControlId, ButtonAction>,
    button_up_handlers: HashMap<ControlId, ButtonAction>,
}

impl TriggerDispatch {
    pub fn from_bindings(bindings: &TriggerBindings) -> Self {
        Self {
            axis_handlers: bindings.axis.clone(),
            button_down_handlers: bindings.button_down.clone(),
            button_up_handlers: bindings.button_up.clone(),
        }
    }

    pub fn axis_handler(&self, id: ControlId) -> Option<AxisAction> {
        self.axis_handlers.get(&id).copied()
    }

    pub fn button_handler(&self, id: ControlId, edge: ButtonEdge) -> Option<ButtonAction> {
        match edge {
            ButtonEdge::Down => self.button_down_handlers.get(&id).copied(),
            ButtonEdge::Up => self.button_up_handlers.get(&id).copied(),
        }
    }

    /// Invoke the axis handler of `name`, if any. Returns whether one ran.
    pub fn dispatch_axis(&self, name: ControlName, value: f32, target: &dyn TriggerTarget) -> bool {
        let Some(action) = name.id().and_then(|id| self.axis_handler(id)) else {
            return false;
        };
        if action == AxisAction::Ignore {
            return false;
        }
        debug!("Axis {} -> {:?}({:.4})", name, action, value);
        target.on_axis(action, value);
        true
    }

    /// Invoke the handler bound to this button edge, if any. Returns whether one ran.
    pub fn dispatch_button(&self, name: ControlName, edge: ButtonEdge, target: &dyn TriggerTarget) -> bool {
        let Some(action) = name.id().and_then(|id| self.button_handler(id, edge)) else {
            return false;
        };
        debug!("Button {} {:?} -> {:?}", name, edge, action);
        target.on_button(action);
        true
    }
}
