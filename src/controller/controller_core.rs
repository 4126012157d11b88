//! Controller Core - lifecycle and per-tick output of the joystick subsystem
//!
//! Owns the shared [`ControllerState`] and the polling worker.
//!
//! # Threading Model
//!
//! ```text
//! input-poller thread ──[trigger handlers]──► Mutex<ControllerState> ◄──[tick()]── consumer
//! ```
//!
//! Every handler and every tick takes the same lock, so derived fields
//! (throttle and recording) are always observed together. The consumer gets a
//! copied [`ControlOutput`] and never holds the lock while using it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::control_scaler::{ControllerState, DriveMode, ScaleSettings};
use super::device_channel::DeviceOpener;
use super::error::ControllerError;
use super::input_poller::{InputPoller, PollerHandle, PollerSettings};
use super::profile::DeviceProfile;
use super::record_store::RecordStore;
use super::trigger_dispatch::{AxisAction, ButtonAction, TriggerTarget};

/// Settings for the complete subsystem, split up for its parts on start
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerSettings {
    pub scale: ScaleSettings,
    pub poller: PollerSettings,
    /// Records dropped by one press of the erase button
    pub num_records_to_erase: usize,
    /// How long `stop` waits for the worker before detaching it
    pub shutdown_grace: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            scale: ScaleSettings::default(),
            poller: PollerSettings::default(),
            num_records_to_erase: 100,
            shutdown_grace: Duration::from_millis(500),
        }
    }
}

/// Output of one scheduling tick, consumed by drivetrain and recorder
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlOutput {
    pub steering: f32,
    pub throttle: f32,
    pub mode: DriveMode,
    pub recording: bool,
}

impl ControlOutput {
    pub fn as_tuple(&self) -> (f32, f32, DriveMode, bool) {
        (self.steering, self.throttle, self.mode, self.recording)
    }
}

impl ControllerState {
    /// Produce the output of one tick.
    ///
    /// Priority: an active E-Stop, then the chaos angle, then the stick.
    pub fn tick(&mut self) -> ControlOutput {
        if let Some((steering, throttle)) = self.advance_estop() {
            return ControlOutput {
                steering,
                throttle,
                mode: self.mode,
                recording: false,
            };
        }

        if let Some(chaos_angle) = self.chaos_angle {
            return ControlOutput {
                steering: chaos_angle,
                throttle: self.throttle,
                mode: self.mode,
                recording: false,
            };
        }

        ControlOutput {
            steering: self.angle,
            throttle: self.throttle,
            mode: self.mode,
            recording: self.recording,
        }
    }
}

/// State shared between the poller thread and the tick consumer
#[derive(Debug)]
pub struct SharedController {
    state: Mutex<ControllerState>,
    record_store: Mutex<Option<Arc<dyn RecordStore>>>,
    num_records_to_erase: usize,
}

impl SharedController {
    pub fn new(state: ControllerState, num_records_to_erase: usize) -> Self {
        Self {
            state: Mutex::new(state),
            record_store: Mutex::new(None),
            num_records_to_erase,
        }
    }

    /// Run `f` with the state lock held
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ControllerState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut *state)
    }

    pub fn snapshot(&self) -> ControllerState {
        self.state.lock().clone()
    }

    pub fn set_record_store(&self, store: Arc<dyn RecordStore>) {
        *self.record_store.lock() = Some(store);
    }

    /// Failures are logged here and never reach the polling loop.
    pub fn erase_last_records(&self) {
        let store = self.record_store.lock().clone();
        let Some(store) = store else {
            warn!("No record store attached, nothing to erase");
            return;
        };

        match store.delete_last_n_records(self.num_records_to_erase) {
            Ok(()) => info!("deleted last {} records.", self.num_records_to_erase),
            Err(e) => error!("failed to erase: {}", e),
        }
    }
}

impl TriggerTarget for SharedController {
    fn on_axis(&self, action: AxisAction, value: f32) {
        match action {
            AxisAction::SetSteering => self.with_state(|s| s.set_steering(value)),
            AxisAction::SetThrottle => self.with_state(|s| s.set_throttle(value)),
            AxisAction::Ignore => {}
        }
    }

    fn on_button(&self, action: ButtonAction) {
        match action {
            ButtonAction::ToggleMode => self.with_state(ControllerState::toggle_mode),
            ButtonAction::ToggleManualRecording => {
                self.with_state(ControllerState::toggle_manual_recording)
            }
            ButtonAction::EraseLastRecords => self.erase_last_records(),
            ButtonAction::EmergencyStop => self.with_state(ControllerState::emergency_stop),
            ButtonAction::IncreaseMaxThrottle => {
                self.with_state(ControllerState::increase_max_throttle)
            }
            ButtonAction::DecreaseMaxThrottle => {
                self.with_state(ControllerState::decrease_max_throttle)
            }
            ButtonAction::ToggleConstantThrottle => {
                self.with_state(ControllerState::toggle_constant_throttle)
            }
            ButtonAction::ChaosMonkeyLeft => self.with_state(ControllerState::chaos_monkey_on_left),
            ButtonAction::ChaosMonkeyRight => {
                self.with_state(ControllerState::chaos_monkey_on_right)
            }
            ButtonAction::ChaosMonkeyOff => self.with_state(ControllerState::chaos_monkey_off),
        }
    }
}

/// Joystick controller: owns the state, the device strategy and the worker.
///
/// Created idle; [`start`](Self::start) spawns the poller, [`stop`](Self::stop)
/// (or drop) shuts it down.
#[derive(Debug)]
pub struct ControllerCore {
    shared: Arc<SharedController>,
    settings: ControllerSettings,
    profile: DeviceProfile,
    opener: Option<Box<dyn DeviceOpener>>,
    poller: Option<PollerHandle>,
}

impl ControllerCore {
    pub fn new(
        settings: ControllerSettings,
        profile: DeviceProfile,
        opener: Box<dyn DeviceOpener>,
    ) -> Self {
        info!(
            "Initializing controller for {} with profile '{}'",
            opener.describe(),
            profile.name
        );
        let state = ControllerState::new(&settings.scale);
        let shared = Arc::new(SharedController::new(state, settings.num_records_to_erase));
        Self {
            shared,
            settings,
            profile,
            opener: Some(opener),
            poller: None,
        }
    }

    /// Spawn the polling worker. Device absence is not an error here: the
    /// worker keeps retrying in the background.
    pub fn start(&mut self) -> Result<(), ControllerError> {
        let opener = self.opener.take().ok_or(ControllerError::AlreadyStarted)?;
        let running = Arc::new(AtomicBool::new(true));
        let poller = InputPoller::create(
            opener,
            self.profile.clone(),
            self.shared.clone(),
            self.settings.poller.clone(),
            running.clone(),
        );
        self.poller = Some(PollerHandle::spawn(poller, running)?);
        info!("Controller started");
        Ok(())
    }

    /// Stop the worker, waiting at most the configured grace period.
    pub fn stop(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            info!("Stopping controller");
            if !poller.stop(self.settings.shutdown_grace) {
                warn!("Controller stopped with the poller still blocked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.poller.as_ref().map(PollerHandle::is_running).unwrap_or(false)
    }

    /// Output for the current scheduling tick
    pub fn tick(&self) -> ControlOutput {
        let output = self.shared.with_state(ControllerState::tick);
        debug!(
            "tick: steering={:.3} throttle={:.3} mode={} recording={}",
            output.steering, output.throttle, output.mode, output.recording
        );
        output
    }

    pub fn snapshot(&self) -> ControllerState {
        self.shared.snapshot()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Handle to the shared state, e.g. for dispatching from another source
    pub fn shared(&self) -> Arc<SharedController> {
        self.shared.clone()
    }

    pub fn set_record_store(&self, store: Arc<dyn RecordStore>) {
        self.shared.set_record_store(store);
    }

    pub fn set_deadzone(&self, value: f32) {
        self.shared.with_state(|s| s.set_deadzone(value));
    }

    pub fn apply_axis(&self, action: AxisAction, value: f32) {
        self.shared.on_axis(action, value);
    }

    pub fn apply_button(&self, action: ButtonAction) {
        self.shared.on_button(action);
    }

    pub fn emergency_stop(&self) {
        self.apply_button(ButtonAction::EmergencyStop);
    }

    pub fn chaos_monkey_on_left(&self) {
        self.apply_button(ButtonAction::ChaosMonkeyLeft);
    }

    pub fn chaos_monkey_on_right(&self) {
        self.apply_button(ButtonAction::ChaosMonkeyRight);
    }

    pub fn chaos_monkey_off(&self) {
        self.apply_button(ButtonAction::ChaosMonkeyOff);
    }
}

impl Drop for ControllerCore {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::device_channel::OpenedDevice;
    use crate::controller::error::{DeviceError, RecordStoreError};
    use crate::controller::estop::EStopState;

    #[derive(Debug)]
    struct AbsentDevice;

    impl DeviceOpener for AbsentDevice {
        fn open(&mut self) -> Result<OpenedDevice, DeviceError> {
            Err(DeviceError::Unavailable("absent".to_string()))
        }

        fn describe(&self) -> String {
            "absent".to_string()
        }
    }

    #[derive(Debug, Default)]
    struct CountingStore {
        erased: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl RecordStore for CountingStore {
        fn delete_last_n_records(&self, n: usize) -> Result<(), RecordStoreError> {
            if self.fail {
                return Err(RecordStoreError::DeleteFailed("disk full".to_string()));
            }
            self.erased.lock().push(n);
            Ok(())
        }
    }

    fn core() -> ControllerCore {
        ControllerCore::new(
            ControllerSettings::default(),
            DeviceProfile::ps4(),
            Box::new(AbsentDevice),
        )
    }

    #[test]
    fn test_default_output_is_idle() {
        let core = core();
        assert_eq!(core.tick().as_tuple(), (0.0, 0.0, DriveMode::User, false));
    }

    #[test]
    fn test_normal_path_reports_stick_values() {
        let core = core();
        core.apply_axis(AxisAction::SetSteering, 0.5);
        core.apply_axis(AxisAction::SetThrottle, -0.5);
        let output = core.tick();
        assert_eq!(output.steering, 0.5);
        assert_eq!(output.throttle, 0.5);
        assert!(output.recording);
    }

    #[test]
    fn test_chaos_overrides_steering_and_recording_only() {
        let core = core();
        core.apply_axis(AxisAction::SetSteering, 0.7);
        core.apply_axis(AxisAction::SetThrottle, -0.4);
        core.apply_button(ButtonAction::ToggleMode);
        core.chaos_monkey_on_right();

        let output = core.tick();
        assert_eq!(output.steering, 0.2);
        assert_eq!(output.throttle, 0.4);
        assert_eq!(output.mode, DriveMode::LocalAngle);
        assert!(!output.recording);

        core.chaos_monkey_off();
        assert_eq!(core.tick().steering, 0.7);
    }

    #[test]
    fn test_estop_takes_priority_over_chaos() {
        let core = core();
        core.apply_axis(AxisAction::SetThrottle, -0.6);
        core.chaos_monkey_on_left();
        core.emergency_stop();

        assert_eq!(core.tick().as_tuple(), (0.0, -1.0, DriveMode::User, false));
        assert_eq!(core.tick().as_tuple(), (0.0, 0.01, DriveMode::User, false));

        for _ in 0..30 {
            if core.snapshot().estop_state == EStopState::Idle {
                break;
            }
            core.tick();
        }
        assert_eq!(core.snapshot().estop_state, EStopState::Idle);
        // Chaos is still set and takes over again once the stop is done
        assert_eq!(core.tick().steering, -0.2);
    }

    #[test]
    fn test_estop_output_keeps_mode_but_never_records() {
        let core = core();
        core.apply_axis(AxisAction::SetThrottle, -1.0);
        core.emergency_stop();
        core.apply_button(ButtonAction::ToggleMode);
        let output = core.tick();
        assert_eq!(output.mode, DriveMode::LocalAngle);
        assert!(!output.recording);
    }

    #[test]
    fn test_erase_delegates_to_record_store() {
        let core = core();
        let store = Arc::new(CountingStore::default());
        core.set_record_store(store.clone());
        core.apply_button(ButtonAction::EraseLastRecords);
        assert_eq!(*store.erased.lock(), vec![100]);
    }

    #[test]
    fn test_erase_failures_are_swallowed() {
        let core = core();
        // Without a store
        core.apply_button(ButtonAction::EraseLastRecords);

        core.set_record_store(Arc::new(CountingStore {
            fail: true,
            ..Default::default()
        }));
        core.apply_button(ButtonAction::EraseLastRecords);
        assert_eq!(core.tick().throttle, 0.0);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut core = core();
        core.start().unwrap();
        assert!(matches!(core.start(), Err(ControllerError::AlreadyStarted)));
        core.stop();
        assert!(!core.is_running());
    }
}
