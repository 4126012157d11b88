//! Input Poller - the background worker that owns the joystick device
//!
//! The poller is a two-state machine:
//!
//! ```text
//!            open ok                      read error / unplug
//! Connecting ───────► Polling ──────────────────────────────┐
//!     ▲  │ open failed: sleep retry_interval, try again     │
//!     │  └──────┘                                           │
//!     └─────────────────────────────────────────────────────┘
//! ```
//!
//! Both states check the shared `running` flag and leave the loop once it is
//! cleared. Trigger handlers run synchronously on this thread, so the next
//! read waits for the handler to finish.

use chrono::Local;
use statum::{machine, state};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::axis_button_map::AxisButtonMap;
use super::device_channel::{ControlKind, DeviceChannel, DeviceEvent, DeviceOpener, OpenedDevice};
use super::error::{ControllerError, DeviceError};
use super::profile::DeviceProfile;
use super::trigger_dispatch::{TriggerDispatch, TriggerTarget};

/// Granularity of interruptible sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, PartialEq)]
pub struct PollerSettings {
    /// Pause after each handled event; zero relies on the blocking read for pacing
    pub poll_delay: Duration,
    /// Wait between two attempts to open the device
    pub retry_interval: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_delay: Duration::ZERO,
            retry_interval: Duration::from_secs(3),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum PollerState {
    Connecting,
    Polling,
}

#[machine]
#[derive(Debug)]
pub struct InputPoller<S: PollerState> {
    // Strategy used to (re)open the device
    opener: Box<dyn DeviceOpener>,

    // Name tables, used to rebuild the control map on every connect
    profile: DeviceProfile,

    dispatch: TriggerDispatch,

    // Receiver of dispatched actions
    target: Arc<dyn TriggerTarget>,

    settings: PollerSettings,

    // Cleared by the owner to request shutdown
    running: Arc<AtomicBool>,

    // Open event stream, only present while polling
    channel: Option<DeviceChannel>,

    // Names and last-known values of the connected device
    controls: AxisButtonMap,
}

impl<S: PollerState> InputPoller<S> {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn controls(&self) -> &AxisButtonMap {
        &self.controls
    }

    /// Log the axes and buttons found on the connected device
    fn show_map(&self) {
        let axes: Vec<String> = self.controls.axis_names().iter().map(|n| n.to_string()).collect();
        let buttons: Vec<String> = self
            .controls
            .button_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        info!("{} axes found: {}", axes.len(), axes.join(", "));
        info!("{} buttons found: {}", buttons.len(), buttons.join(", "));
    }
}

impl InputPoller<Connecting> {
    pub fn create(
        opener: Box<dyn DeviceOpener>,
        profile: DeviceProfile,
        target: Arc<dyn TriggerTarget>,
        settings: PollerSettings,
        running: Arc<AtomicBool>,
    ) -> Self {
        let dispatch = TriggerDispatch::from_bindings(&profile.bindings);
        debug!(
            "Creating input poller for {} with profile '{}' and settings {:?}",
            opener.describe(),
            profile.name,
            settings
        );
        Self::new(
            opener,
            profile,
            dispatch,
            target,
            settings,
            running,
            None,
            AxisButtonMap::default(),
        )
    }

    /// Open the device, retrying every `retry_interval` until it works.
    ///
    /// Returns `None` only when shutdown was requested first.
    pub fn connect(mut self) -> Option<InputPoller<Polling>> {
        let mut attempts: u64 = 0;

        while self.is_running() {
            attempts += 1;
            match self.opener.open() {
                Ok(OpenedDevice { info, channel }) => {
                    info!(
                        "Connected to '{}' on {} after {} attempt(s)",
                        info.name,
                        channel.source(),
                        attempts
                    );
                    self.controls = AxisButtonMap::build(&self.profile, &info);
                    self.channel = Some(channel);
                    self.show_map();
                    return Some(self.transition());
                }
                Err(e) => {
                    // One warning per outage, the rest at debug
                    if attempts == 1 {
                        warn!(
                            "Device {} not ready ({}), retrying every {:?}",
                            self.opener.describe(),
                            e,
                            self.settings.retry_interval
                        );
                    } else {
                        debug!("Device still not ready (attempt {}): {}", attempts, e);
                    }
                    sleep_while_running(&self.running, self.settings.retry_interval);
                }
            }
        }

        debug!("Shutdown requested while connecting");
        None
    }
}

impl InputPoller<Polling> {
    /// Read and handle one event.
    pub fn poll_once(&mut self) -> Result<(), DeviceError> {
        let event = match self.channel.as_mut() {
            Some(channel) => channel.try_read_event()?,
            None => return Err(DeviceError::Disconnected("no open device".to_string())),
        };
        self.handle_event(event);
        Ok(())
    }

    fn handle_event(&mut self, event: DeviceEvent) {
        match event.kind() {
            Some(ControlKind::Axis) => {
                if let Some((name, value)) = self.controls.update_axis(event.index, event.value) {
                    debug!("axis: {} val: {:.4}", name, value);
                    self.dispatch.dispatch_axis(name, value, self.target.as_ref());
                } else {
                    debug!("Axis index {} not reported by device", event.index);
                }
            }
            Some(ControlKind::Button) => {
                match self.controls.update_button(event.index, event.value) {
                    Some((name, edge)) => {
                        info!(
                            "button: {} state: {} at {}",
                            name,
                            event.value,
                            Local::now().format("%H:%M:%S.%3f")
                        );
                        self.dispatch.dispatch_button(name, edge, self.target.as_ref());
                    }
                    None => debug!(
                        "Button index {} state {} produced no edge",
                        event.index, event.value
                    ),
                }
            }
            None => debug!("Ignoring event without type bits: {:?}", event),
        }
    }

    /// Handle events until the device goes away or shutdown is requested.
    ///
    /// Returns the poller in `Connecting` state after a device failure, or
    /// `None` on shutdown.
    pub fn run_until_disconnect(mut self) -> Option<InputPoller<Connecting>> {
        while self.is_running() {
            match self.poll_once() {
                Ok(()) => {
                    if !self.settings.poll_delay.is_zero() {
                        thread::sleep(self.settings.poll_delay);
                    }
                }
                Err(e) if !e.requires_reconnect() => {}
                Err(e) => {
                    warn!("Lost joystick: {}, reinitializing", e);
                    self.channel = None;
                    return Some(self.transition());
                }
            }
        }

        debug!("Shutdown requested while polling");
        None
    }
}

/// Drive the poller until shutdown, reconnecting after every device failure.
pub fn run_poller(poller: InputPoller<Connecting>) {
    info!("Input poller started");
    let mut connecting = poller;
    loop {
        let Some(polling) = connecting.connect() else {
            break;
        };
        match polling.run_until_disconnect() {
            Some(next) => connecting = next,
            None => break,
        }
    }
    info!("Input poller stopped");
}

fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

/// Owner side of the polling worker
#[derive(Debug)]
pub struct PollerHandle {
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Spawn the worker thread. `running` must be the flag the poller was created with.
    pub fn spawn(
        poller: InputPoller<Connecting>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, ControllerError> {
        running.store(true, Ordering::SeqCst);
        let worker = thread::Builder::new()
            .name("input-poller".to_string())
            .spawn(move || run_poller(poller))
            .map_err(|e| {
                running.store(false, Ordering::SeqCst);
                ControllerError::ThreadSpawn(e.to_string())
            })?;

        Ok(Self {
            running,
            worker: Some(worker),
        })
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map(|w| !w.is_finished())
            .unwrap_or(false)
    }

    /// Request shutdown and wait up to `grace` for the worker to exit.
    ///
    /// Returns whether the worker was joined. A worker still blocked after
    /// the grace period is detached.
    pub fn stop(&mut self, grace: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return true;
        };

        let deadline = Instant::now() + grace;
        while !worker.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        if worker.is_finished() {
            if worker.join().is_err() {
                error!("Input poller thread panicked");
            }
            true
        } else {
            warn!("Input poller did not exit within {:?}, detaching", grace);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::device_channel::DeviceInfo;
    use crate::controller::trigger_dispatch::{AxisAction, ButtonAction};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io::Cursor;

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl TriggerTarget for Recorder {
        fn on_axis(&self, action: AxisAction, value: f32) {
            self.calls.lock().push(format!("{:?}({:.2})", action, value));
        }

        fn on_button(&self, action: ButtonAction) {
            self.calls.lock().push(format!("{:?}", action));
        }
    }

    #[derive(Debug)]
    struct ScriptedOpener {
        sessions: VecDeque<Vec<DeviceEvent>>,
        opens: Arc<Mutex<u32>>,
    }

    impl DeviceOpener for ScriptedOpener {
        fn open(&mut self) -> Result<OpenedDevice, DeviceError> {
            let events = self
                .sessions
                .pop_front()
                .ok_or_else(|| DeviceError::Unavailable("script exhausted".to_string()))?;
            *self.opens.lock() += 1;
            let bytes: Vec<u8> = events.iter().flat_map(|e| e.encode()).collect();
            Ok(OpenedDevice {
                info: DeviceInfo {
                    name: "scripted".to_string(),
                    axis_codes: vec![0x00, 0x05],
                    button_codes: vec![0x130, 0x131],
                },
                channel: DeviceChannel::from_reader(Cursor::new(bytes), "scripted"),
            })
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn poller(sessions: Vec<Vec<DeviceEvent>>) -> (InputPoller<Connecting>, Arc<Recorder>, Arc<Mutex<u32>>) {
        let recorder = Arc::new(Recorder::default());
        let opens = Arc::new(Mutex::new(0));
        let opener = ScriptedOpener {
            sessions: sessions.into(),
            opens: opens.clone(),
        };
        let settings = PollerSettings {
            poll_delay: Duration::ZERO,
            retry_interval: Duration::from_millis(1),
        };
        let poller = InputPoller::create(
            Box::new(opener),
            DeviceProfile::ps4(),
            recorder.clone(),
            settings,
            Arc::new(AtomicBool::new(true)),
        );
        (poller, recorder, opens)
    }

    #[test]
    fn test_events_are_dispatched_in_order() {
        let (poller, recorder, _) = poller(vec![vec![
            DeviceEvent::axis(1, 0, 32767),
            DeviceEvent::button(2, 1, 1),
            DeviceEvent::button(3, 1, 0),
            DeviceEvent::axis(4, 1, -32767),
        ]]);

        let polling = poller.connect().unwrap();
        let connecting = polling.run_until_disconnect().unwrap();
        assert!(connecting.is_running());

        assert_eq!(
            *recorder.calls.lock(),
            vec![
                "SetSteering(1.00)".to_string(),
                "EmergencyStop".to_string(),
                "SetThrottle(-1.00)".to_string(),
            ]
        );
    }

    #[test]
    fn test_disconnect_returns_to_connecting_and_reconnects() {
        let (poller, recorder, opens) = poller(vec![
            vec![DeviceEvent::axis(1, 0, 0)],
            vec![DeviceEvent::button(2, 1, 1)],
        ]);

        let connecting = poller.connect().unwrap().run_until_disconnect().unwrap();
        let connecting = connecting.connect().unwrap().run_until_disconnect().unwrap();
        assert_eq!(*opens.lock(), 2);
        assert_eq!(recorder.calls.lock().len(), 2);

        // Script exhausted: connect keeps retrying until shutdown
        connecting.running.store(false, Ordering::SeqCst);
        assert!(connecting.connect().is_none());
    }

    #[test]
    fn test_connect_builds_control_map() {
        let (poller, _, _) = poller(vec![vec![DeviceEvent::button(1, 0, 1)]]);
        let polling = poller.connect().unwrap();
        assert_eq!(polling.controls().button_names().len(), 2);
    }

    #[test]
    fn test_stop_joins_idle_worker() {
        let (poller, _, _) = poller(Vec::new());
        let running = poller.running.clone();
        let mut handle = PollerHandle::spawn(poller, running.clone()).unwrap();
        assert!(running.load(Ordering::SeqCst));

        assert!(handle.stop(Duration::from_secs(2)));
        assert!(!handle.is_running());
        assert!(!running.load(Ordering::SeqCst));
    }
}
