//! Device Channel - decoding of the joystick event stream
//!
//! The joystick device delivers a stream of fixed 8-byte records:
//!
//! ```text
//! offset  size  field
//! 0       4     timestamp (ms, little-endian u32)
//! 4       2     value     (little-endian i16)
//! 6       1     type bits (0x01 button, 0x02 axis, 0x80 init-sync)
//! 7       1     index     (device-local axis or button number)
//! ```
//!
//! Records flagged with the init-sync bit are synthetic state replays the
//! driver emits right after open. They are dropped here so downstream code
//! only ever sees real transitions.

use std::fmt;
use std::io::{self, Read};
use tracing::debug;

use super::error::DeviceError;

/// Size of one record on the wire
pub const EVENT_SIZE: usize = 8;

pub const TYPE_BUTTON: u8 = 0x01;
pub const TYPE_AXIS: u8 = 0x02;
pub const TYPE_INIT: u8 = 0x80;

/// Category of a device channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Axis,
    Button,
}

/// One decoded record of the device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEvent {
    pub timestamp: u32,
    pub value: i16,
    pub type_bits: u8,
    pub index: u8,
}

impl DeviceEvent {
    pub fn decode(buf: &[u8; EVENT_SIZE]) -> Self {
        Self {
            timestamp: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            value: i16::from_le_bytes([buf[4], buf[5]]),
            type_bits: buf[6],
            index: buf[7],
        }
    }

    /// Inverse of [`DeviceEvent::decode`], used by in-memory devices.
    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let ts = self.timestamp.to_le_bytes();
        let value = self.value.to_le_bytes();
        [
            ts[0],
            ts[1],
            ts[2],
            ts[3],
            value[0],
            value[1],
            self.type_bits,
            self.index,
        ]
    }

    pub fn button(timestamp: u32, index: u8, value: i16) -> Self {
        Self {
            timestamp,
            value,
            type_bits: TYPE_BUTTON,
            index,
        }
    }

    pub fn axis(timestamp: u32, index: u8, value: i16) -> Self {
        Self {
            timestamp,
            value,
            type_bits: TYPE_AXIS,
            index,
        }
    }

    pub fn is_init(&self) -> bool {
        self.type_bits & TYPE_INIT != 0
    }

    /// Channel category, `None` for records carrying neither bit.
    ///
    /// The button bit wins if a record carries both.
    pub fn kind(&self) -> Option<ControlKind> {
        if self.type_bits & TYPE_BUTTON != 0 {
            Some(ControlKind::Button)
        } else if self.type_bits & TYPE_AXIS != 0 {
            Some(ControlKind::Axis)
        } else {
            None
        }
    }
}

/// Identity and layout reported by a device when it is opened
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    /// Raw axis code for each device-local axis index
    pub axis_codes: Vec<u8>,
    /// Raw button code for each device-local button index
    pub button_codes: Vec<u16>,
}

impl DeviceInfo {
    pub fn axis_count(&self) -> usize {
        self.axis_codes.len()
    }

    pub fn button_count(&self) -> usize {
        self.button_codes.len()
    }
}

/// Blocking reader of decoded device events.
///
/// Owns the byte stream exclusively. Whatever timeout the underlying reader
/// applies surfaces as [`DeviceError::Timeout`].
pub struct DeviceChannel {
    reader: Box<dyn Read + Send>,
    source: String,
}

impl fmt::Debug for DeviceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceChannel")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl DeviceChannel {
    pub fn from_reader(reader: impl Read + Send + 'static, source: impl Into<String>) -> Self {
        Self {
            reader: Box::new(reader),
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Read the next real event, skipping init-sync records.
    ///
    /// The poller uses this form to tell a timeout from a lost device.
    pub fn try_read_event(&mut self) -> Result<DeviceEvent, DeviceError> {
        loop {
            let mut buf = [0u8; EVENT_SIZE];
            self.reader
                .read_exact(&mut buf)
                .map_err(|e| map_read_error(&self.source, e))?;

            let event = DeviceEvent::decode(&buf);
            if event.is_init() {
                debug!("Dropping init-sync event from {}: {:?}", self.source, event);
                continue;
            }
            return Ok(event);
        }
    }

    /// Blocking read of the next real event. Every failure folds into
    /// `None`, meaning "device not ready".
    pub fn read_event(&mut self) -> Option<DeviceEvent> {
        match self.try_read_event() {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("No event from {}: {}", self.source, e);
                None
            }
        }
    }
}

fn map_read_error(source: &str, e: io::Error) -> DeviceError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => DeviceError::Disconnected(source.to_string()),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => DeviceError::Timeout,
        _ => DeviceError::Read(format!("{}: {}", source, e)),
    }
}

/// A successfully opened device: its layout plus the event stream
#[derive(Debug)]
pub struct OpenedDevice {
    pub info: DeviceInfo,
    pub channel: DeviceChannel,
}

/// Strategy used by the poller to (re)open its device.
///
/// Called again after every disconnect, so implementations must be able to
/// open repeatedly.
pub trait DeviceOpener: Send + fmt::Debug {
    fn open(&mut self) -> Result<OpenedDevice, DeviceError>;

    /// Human-readable description for log lines (usually the device path)
    fn describe(&self) -> String;
}
