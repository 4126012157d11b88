//! Joystick subsystem: from raw device records to drive commands
//!
//! Leaf-first:
//!
//! 1. [`device_channel`] - decoding of the 8-byte event records
//! 2. [`axis_button_map`] - device indices to semantic names, last-known values
//! 3. [`input_poller`] - background worker reading the device and dispatching
//! 4. [`trigger_dispatch`] - control name to action tables
//! 5. [`estop`], [`control_scaler`], [`chaos`] - the state operations
//! 6. [`controller_core`] - lifecycle and per-tick output
//!
//! # Architecture
//!
//! ```text
//! /dev/input/js0 ──► DeviceChannel ──► InputPoller ──► TriggerDispatch ──► ControllerState
//!                                      (AxisButtonMap)                         │
//!                                                   ControllerCore::tick() ◄───┘
//!                                                   (steering, throttle, mode, recording)
//! ```

pub mod axis_button_map;
pub mod chaos;
pub mod control_scaler;
pub mod controller_core;
pub mod device_channel;
pub mod error;
pub mod estop;
pub mod input_poller;
pub mod js_device;
pub mod profile;
pub mod record_store;
pub mod trigger_dispatch;

pub use axis_button_map::{AxisButtonMap, ButtonEdge, ControlName};
pub use control_scaler::{ControllerState, DriveMode, ScaleSettings};
pub use controller_core::{ControlOutput, ControllerCore, ControllerSettings, SharedController};
pub use device_channel::{
    ControlKind, DeviceChannel, DeviceEvent, DeviceInfo, DeviceOpener, OpenedDevice,
};
pub use error::{ControllerError, DeviceError, RecordStoreError};
pub use estop::EStopState;
pub use input_poller::{Connecting, InputPoller, PollerHandle, PollerSettings, Polling};
pub use js_device::JsDeviceOpener;
pub use profile::{ControlId, DeviceProfile, ProfileKind};
pub use record_store::RecordStore;
pub use trigger_dispatch::{AxisAction, ButtonAction, TriggerBindings, TriggerDispatch, TriggerTarget};
