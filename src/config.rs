//! Configuration
//!
//! Everything the subsystem needs at construction time lives in one TOML
//! file. Every field has a default, so an empty or missing file yields a
//! usable PS4 setup on `/dev/input/js0`.
//!
//! ```toml
//! [device]
//! path = "/dev/input/js0"
//! retry_interval_ms = 3000
//!
//! [controller]
//! throttle_scale = 0.7
//! auto_record_on_throttle = false
//!
//! [profile]
//! base = "ps4"
//!
//! [[profile.button_down]]
//! control = "square"
//! action = "chaos_monkey_left"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::controller::{
    AxisAction, ButtonAction, ControlId, ControllerSettings, DeviceProfile, JsDeviceOpener,
    PollerSettings, ProfileKind, ScaleSettings,
};
use crate::logging;

/// Fastest supported drive loop
pub const MAX_TICK_HZ: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Device access and poller timing
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub path: PathBuf,
    pub poll_delay_ms: u64,
    pub retry_interval_ms: u64,
    /// Upper bound for one blocking read, bounds how long shutdown takes to be noticed
    pub read_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/input/js0"),
            poll_delay_ms: 0,
            retry_interval_ms: 3000,
            read_timeout_ms: 100,
            shutdown_grace_ms: 500,
        }
    }
}

/// Scaling and recording behaviour
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    pub throttle_scale: f32,
    pub steering_scale: f32,
    pub throttle_dir: f32,
    pub dead_zone: f32,
    pub auto_record_on_throttle: bool,
    pub num_records_to_erase: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let scale = ScaleSettings::default();
        Self {
            throttle_scale: scale.throttle_scale,
            steering_scale: scale.steering_scale,
            throttle_dir: scale.throttle_dir,
            dead_zone: scale.dead_zone,
            auto_record_on_throttle: scale.auto_record_on_throttle,
            num_records_to_erase: 100,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AxisBinding {
    pub control: ControlId,
    pub action: AxisAction,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ButtonBinding {
    pub control: ControlId,
    pub action: ButtonAction,
}

/// Built-in profile plus binding overrides
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ProfileConfig {
    pub base: ProfileKind,
    pub axis: Vec<AxisBinding>,
    pub button_down: Vec<ButtonBinding>,
    pub button_up: Vec<ButtonBinding>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Output ticks per second of the drive loop
    pub tick_hz: u32,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_hz: 20,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct DriveConfig {
    pub device: DeviceConfig,
    pub controller: ControlConfig,
    pub profile: ProfileConfig,
    pub runtime: RuntimeConfig,
}

impl DriveConfig {
    /// `<config dir>/drivestick/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("drivestick").join("config.toml"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load `path`, or the default location when `None`. A missing file is
    /// not an error and yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.controller;
        if !(0.0..=1.0).contains(&c.throttle_scale) {
            return Err(ConfigError::Invalid(format!(
                "throttle_scale must be within [0, 1], got {}",
                c.throttle_scale
            )));
        }
        if c.throttle_dir != 1.0 && c.throttle_dir != -1.0 {
            return Err(ConfigError::Invalid(format!(
                "throttle_dir must be 1.0 or -1.0, got {}",
                c.throttle_dir
            )));
        }
        if !c.steering_scale.is_finite() {
            return Err(ConfigError::Invalid("steering_scale must be finite".to_string()));
        }
        if !(c.dead_zone >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "dead_zone must not be negative, got {}",
                c.dead_zone
            )));
        }
        if self.runtime.tick_hz == 0 || self.runtime.tick_hz > MAX_TICK_HZ {
            return Err(ConfigError::Invalid(format!(
                "tick_hz must be within [1, {}], got {}",
                MAX_TICK_HZ, self.runtime.tick_hz
            )));
        }
        if self.device.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read_timeout_ms must be positive".to_string()));
        }
        if logging::parse_level(&self.runtime.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.runtime.log_level
            )));
        }
        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            scale: ScaleSettings {
                throttle_scale: self.controller.throttle_scale,
                steering_scale: self.controller.steering_scale,
                throttle_dir: self.controller.throttle_dir,
                dead_zone: self.controller.dead_zone,
                auto_record_on_throttle: self.controller.auto_record_on_throttle,
            },
            poller: PollerSettings {
                poll_delay: Duration::from_millis(self.device.poll_delay_ms),
                retry_interval: Duration::from_millis(self.device.retry_interval_ms),
            },
            num_records_to_erase: self.controller.num_records_to_erase,
            shutdown_grace: Duration::from_millis(self.device.shutdown_grace_ms),
        }
    }

    /// Base profile with the configured bindings layered on top
    pub fn device_profile(&self) -> DeviceProfile {
        let mut profile = DeviceProfile::from_kind(self.profile.base);
        for binding in &self.profile.axis {
            profile.bindings.axis.insert(binding.control, binding.action);
        }
        for binding in &self.profile.button_down {
            profile
                .bindings
                .button_down
                .insert(binding.control, binding.action);
        }
        for binding in &self.profile.button_up {
            profile
                .bindings
                .button_up
                .insert(binding.control, binding.action);
        }
        profile
    }

    pub fn device_opener(&self) -> JsDeviceOpener {
        JsDeviceOpener::new(
            self.device.path.clone(),
            Duration::from_millis(self.device.read_timeout_ms),
        )
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.runtime.tick_hz.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DriveConfig::default();
        assert_eq!(config.device.path, PathBuf::from("/dev/input/js0"));
        assert_eq!(config.device.retry_interval_ms, 3000);
        assert_eq!(config.controller.throttle_dir, -1.0);
        assert_eq!(config.controller.num_records_to_erase, 100);
        assert_eq!(config.runtime.tick_hz, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        assert_eq!(DriveConfig::from_toml_str("").unwrap(), DriveConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = DriveConfig::default();
        config.controller.throttle_scale = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.controller.throttle_scale = 0.7;
        config.controller.throttle_dir = 0.5;
        assert!(config.validate().is_err());

        config.controller.throttle_dir = 1.0;
        config.controller.dead_zone = -0.1;
        assert!(config.validate().is_err());

        config.controller.dead_zone = 0.1;
        config.runtime.log_level = "chatty".to_string();
        assert!(config.validate().is_err());

        config.runtime.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_binding_overrides() {
        let config = DriveConfig::from_toml_str(
            r#"
            [profile]
            base = "ps4"

            [[profile.axis]]
            control = "left_stick_horz"
            action = "ignore"

            [[profile.axis]]
            control = "right_stick_horz"
            action = "set_steering"

            [[profile.button_down]]
            control = "square"
            action = "chaos_monkey_left"

            [[profile.button_up]]
            control = "square"
            action = "chaos_monkey_off"
            "#,
        )
        .unwrap();

        let profile = config.device_profile();
        assert_eq!(
            profile.bindings.axis.get(&ControlId::LeftStickHorz),
            Some(&AxisAction::Ignore)
        );
        assert_eq!(
            profile.bindings.axis.get(&ControlId::RightStickHorz),
            Some(&AxisAction::SetSteering)
        );
        assert_eq!(
            profile.bindings.button_down.get(&ControlId::Square),
            Some(&ButtonAction::ChaosMonkeyLeft)
        );
        assert_eq!(
            profile.bindings.button_up.get(&ControlId::Square),
            Some(&ButtonAction::ChaosMonkeyOff)
        );
        // Untouched defaults stay
        assert_eq!(
            profile.bindings.button_down.get(&ControlId::Cross),
            Some(&ButtonAction::EmergencyStop)
        );
    }

    #[test]
    fn test_unknown_action_is_a_parse_error() {
        let result = DriveConfig::from_toml_str(
            r#"
            [[profile.button_down]]
            control = "square"
            action = "self_destruct"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[controller]\nthrottle_scale = 0.7\nsteering_scale = -1.0\n\n[device]\npath = \"/dev/input/js1\""
        )
        .unwrap();

        let config = DriveConfig::load(file.path()).unwrap();
        assert_eq!(config.controller.throttle_scale, 0.7);
        assert_eq!(config.device.path, PathBuf::from("/dev/input/js1"));

        let settings = config.controller_settings();
        assert_eq!(settings.scale.steering_scale, -1.0);
        assert_eq!(settings.poller.retry_interval, Duration::from_secs(3));
        assert_eq!(config.device_opener().path(), Path::new("/dev/input/js1"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert_eq!(
            DriveConfig::load_or_default(Some(&path)).unwrap(),
            DriveConfig::default()
        );
        assert!(matches!(DriveConfig::load(&path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = DriveConfig::default();
        config.profile.button_down.push(ButtonBinding {
            control: ControlId::L2,
            action: ButtonAction::ChaosMonkeyRight,
        });
        let text = config.to_toml_string().unwrap();
        assert_eq!(DriveConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_tick_rate_bounds() {
        let mut config = DriveConfig::default();
        config.runtime.tick_hz = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.runtime.tick_hz = 2_000_000_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.runtime.tick_hz = MAX_TICK_HZ;
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_millis(1));

        let parsed = DriveConfig::from_toml_str("[runtime]\ntick_hz = 4000000000\n");
        assert!(matches!(parsed, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_tick_interval() {
        let config = DriveConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
    }
}
