//! drivestick - joystick input for a small self-driving car
//!
//! Reads a gamepad through the Linux joystick interface, maps its controls to
//! driving actions and produces one `(steering, throttle, mode, recording)`
//! output per scheduling tick, with an emergency stop that pre-empts
//! everything else.

pub mod config;
pub mod controller;
pub mod drive_loop;
pub mod logging;

pub use config::{ConfigError, DriveConfig};
pub use controller::{ControlOutput, ControllerCore, ControllerSettings, DriveMode};
