//! Error types for the joystick subsystem.
//!
//! None of these are fatal to the host process. Device errors drive the
//! poller back into its connect phase, record store errors are logged at the
//! erase site and swallowed.

/// Errors raised while opening or reading the joystick device
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    /// The device node is missing or could not be opened
    #[error("Device unavailable: {0}")]
    Unavailable(String),

    /// A read failed for a reason other than a timeout
    #[error("Failed to read device: {0}")]
    Read(String),

    /// The stream ended (device unplugged)
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// No record arrived within the read timeout
    #[error("Device read timed out")]
    Timeout,

    /// The joystick API is not available on this target
    #[error("Joystick devices are not supported on this platform")]
    UnsupportedPlatform,
}

impl DeviceError {
    /// Whether the poller has to reconnect after this error.
    pub fn requires_reconnect(&self) -> bool {
        !matches!(self, DeviceError::Timeout)
    }
}

/// Errors surfaced by a record store while erasing records
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Failed to delete records: {0}")]
    DeleteFailed(String),
}

/// Errors of the controller lifecycle
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// `start` was called twice, or after the device opener was consumed
    #[error("Controller already started")]
    AlreadyStarted,

    /// The polling worker could not be spawned
    #[error("Failed to spawn input poller: {0}")]
    ThreadSpawn(String),
}
