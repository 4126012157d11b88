//! Linux joystick (`/dev/input/jsN`) backend.
//!
//! Opens the character device, queries its name and axis/button code maps
//! through the joystick ioctls and hands out a [`DeviceChannel`] whose reads
//! give up after the configured timeout so the worker can observe shutdown.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::device_channel::{DeviceOpener, OpenedDevice};
use super::error::DeviceError;

/// Opens a Linux joystick device node
#[derive(Debug, Clone)]
pub struct JsDeviceOpener {
    path: PathBuf,
    read_timeout: Duration,
}

impl JsDeviceOpener {
    pub fn new(path: impl Into<PathBuf>, read_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            read_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceOpener for JsDeviceOpener {
    fn open(&mut self) -> Result<OpenedDevice, DeviceError> {
        if !self.path.exists() {
            return Err(DeviceError::Unavailable(format!(
                "{} is missing",
                self.path.display()
            )));
        }

        info!("Opening {}...", self.path.display());
        let opened = platform::open(&self.path, self.read_timeout)?;
        info!("Device name: {}", opened.info.name);
        debug!(
            "Device reports {} axes and {} buttons",
            opened.info.axis_count(),
            opened.info.button_count()
        );
        Ok(opened)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use std::fs::File;
    use std::io::{self, Read};
    use std::os::unix::io::AsRawFd;
    use std::path::Path;
    use std::time::Duration;

    use super::super::device_channel::{DeviceChannel, DeviceInfo, OpenedDevice};
    use super::super::error::DeviceError;

    // _IOR('j', ...) request codes of the joystick API
    const JSIOCGAXES: u64 = 0x8001_6a11;
    const JSIOCGBUTTONS: u64 = 0x8001_6a12;
    const JSIOCGNAME_BASE: u64 = 0x8000_6a13;
    const JSIOCGAXMAP: u64 = 0x8040_6a32;
    const JSIOCGBTNMAP: u64 = 0x8040_6a34;

    const NAME_LEN: usize = 64;
    const AXMAP_LEN: usize = 0x40;
    const BTNMAP_LEN: usize = 200;

    pub(super) fn open(path: &Path, read_timeout: Duration) -> Result<OpenedDevice, DeviceError> {
        let file = File::open(path)
            .map_err(|e| DeviceError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let fd = file.as_raw_fd();

        let mut name = [0u8; NAME_LEN];
        query(fd, JSIOCGNAME_BASE + 0x10000 * NAME_LEN as u64, name.as_mut_ptr())?;
        let name_end = name.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
        let name = String::from_utf8_lossy(&name[..name_end]).into_owned();

        let mut num_axes = 0u8;
        query(fd, JSIOCGAXES, &mut num_axes as *mut u8)?;
        let mut num_buttons = 0u8;
        query(fd, JSIOCGBUTTONS, &mut num_buttons as *mut u8)?;

        let mut axis_map = [0u8; AXMAP_LEN];
        query(fd, JSIOCGAXMAP, axis_map.as_mut_ptr())?;
        let mut button_map = [0u16; BTNMAP_LEN];
        query(fd, JSIOCGBTNMAP, button_map.as_mut_ptr())?;

        let info = DeviceInfo {
            name,
            axis_codes: axis_map[..(num_axes as usize).min(AXMAP_LEN)].to_vec(),
            button_codes: button_map[..(num_buttons as usize).min(BTNMAP_LEN)].to_vec(),
        };

        let reader = TimedReader {
            file,
            timeout: read_timeout,
        };
        Ok(OpenedDevice {
            info,
            channel: DeviceChannel::from_reader(reader, path.display().to_string()),
        })
    }

    fn query<T>(fd: i32, request: u64, buf: *mut T) -> Result<(), DeviceError> {
        // SAFETY: every request code reads at most the size encoded in it,
        // and each caller passes a buffer at least that large.
        let rc = unsafe { libc::ioctl(fd, request as _, buf) };
        if rc < 0 {
            return Err(DeviceError::Unavailable(format!(
                "ioctl 0x{:08x} failed: {}",
                request,
                io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    /// Blocking reader that gives up with `TimedOut` when no data arrives in time
    struct TimedReader {
        file: File,
        timeout: Duration,
    }

    impl Read for TimedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut pollfd = libc::pollfd {
                fd: self.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let timeout_ms = self.timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
            // SAFETY: pollfd is a valid single-element array for the call.
            let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
            if rc == 0 {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no joystick event"));
            }
            if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0
                && pollfd.revents & libc::POLLIN == 0
            {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "joystick device hung up",
                ));
            }
            self.file.read(buf)
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use std::path::Path;
    use std::time::Duration;

    use super::super::device_channel::OpenedDevice;
    use super::super::error::DeviceError;

    pub(super) fn open(_path: &Path, _read_timeout: Duration) -> Result<OpenedDevice, DeviceError> {
        Err(DeviceError::UnsupportedPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_unavailable() {
        let mut opener = JsDeviceOpener::new("/nonexistent/js9", Duration::from_millis(10));
        assert!(matches!(opener.open(), Err(DeviceError::Unavailable(_))));
        assert_eq!(opener.describe(), "/nonexistent/js9");
    }
}
