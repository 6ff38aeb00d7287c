//! Shared vehicle state.
//!
//! [`VehicleState`] is one record subdivided into field groups. Each group is
//! a `Copy` value behind its own blocking mutex: reads return a snapshot and
//! writes replace or update the whole group inside one critical section, so
//! no reader can observe a half-written group. There is no ordering across
//! groups; the last writer of a group wins.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use mavlink_proto::{ChannelMapping, DEFAULT_CHANNEL_MAPPING};

use crate::expo::ResponseCurve;
use crate::output::OutputError;

/// One field group behind its own lock.
pub struct Group<T: Copy> {
    inner: Mutex<CriticalSectionRawMutex, Cell<T>>,
}

impl<T: Copy> Group<T> {
    /// Create a group holding `value`.
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Cell::new(value)),
        }
    }

    /// Snapshot of the whole group.
    #[inline]
    pub fn load(&self) -> T {
        self.inner.lock(Cell::get)
    }

    /// Replace the whole group.
    #[inline]
    pub fn store(&self, value: T) {
        self.inner.lock(|cell| cell.set(value));
    }

    /// Read-modify-write the group in a single critical section.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.inner.lock(|cell| {
            let mut value = cell.get();
            let result = f(&mut value);
            cell.set(value);
            result
        })
    }
}

/// Source currently holding control authority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum ActiveSource {
    /// Nobody; all actuator outputs are forced to zero.
    #[default]
    None = 0,
    /// The meta controller.
    Autonomous = 1,
    /// The touch app plus joystick.
    Manual = 2,
}

impl ActiveSource {
    /// Decode the wire value used by the touch app.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Autonomous),
            2 => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Vehicle identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Identity {
    pub vehicle_id: i32,
}

impl Identity {
    pub const DEFAULT: Self = Self { vehicle_id: 13 };
}

impl Default for Identity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Command values a source has staged for the arbiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StagedCommand {
    /// Camera selector (1 and 2 are translated to canonical PWM).
    pub camera: i32,
    /// Deploy 1 value.
    pub command1: i32,
    /// Deploy 2 value.
    pub command2: i32,
}

impl StagedCommand {
    pub const ZERO: Self = Self {
        camera: 0,
        command1: 0,
        command2: 0,
    };
}

/// Payload flags set by the ground station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlFlags {
    pub smart_deploy: i32,
    pub neural_net: i32,
}

impl ControlFlags {
    pub const DEFAULT: Self = Self {
        smart_deploy: 0,
        neural_net: 0,
    };
}

/// Control authority and the values staged by each source.
///
/// Both sources start with zeroed staged values, so selecting a source that
/// has not sent a command yet dispatches zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlAuthority {
    pub active: ActiveSource,
    /// Source seen on the previous arbiter tick.
    pub previous: ActiveSource,
    pub autonomous: StagedCommand,
    pub manual: StagedCommand,
    pub flags: ControlFlags,
}

impl ControlAuthority {
    pub const DEFAULT: Self = Self {
        active: ActiveSource::None,
        previous: ActiveSource::None,
        autonomous: StagedCommand::ZERO,
        manual: StagedCommand::ZERO,
        flags: ControlFlags::DEFAULT,
    };
}

/// Gimbal neutrals, gain and PWM limits.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GimbalConfig {
    pub neutral_pitch: i32,
    pub neutral_yaw: i32,
    /// PWM counts per unit of joystick deflection per tick.
    pub gain: f32,
    pub pitch_min: i32,
    pub pitch_max: i32,
    pub yaw_min: i32,
    pub yaw_max: i32,
}

impl GimbalConfig {
    pub const DEFAULT: Self = Self {
        neutral_pitch: 1825,
        neutral_yaw: 1675,
        gain: 25.1,
        pitch_min: 1010,
        pitch_max: 2018,
        yaw_min: 1010,
        yaw_max: 2018,
    };
}

impl Default for GimbalConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Current and last-dispatched actuator values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GimbalSetpoint {
    pub pitch: i32,
    pub yaw: i32,
    pub deploy1: i32,
    pub deploy2: i32,
    /// Camera value after translation to canonical PWM.
    pub camera: i32,
    pub previous_pitch: i32,
    pub previous_yaw: i32,
    pub previous_deploy1: i32,
    pub previous_deploy2: i32,
}

impl GimbalSetpoint {
    pub const ZERO: Self = Self {
        pitch: 0,
        yaw: 0,
        deploy1: 0,
        deploy2: 0,
        camera: 0,
        previous_pitch: 0,
        previous_yaw: 0,
        previous_deploy1: 0,
        previous_deploy2: 0,
    };
}

/// Channel values echoed back by the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcMirror {
    pub deploy1: i32,
    pub deploy2: i32,
    pub safety: i32,
    pub camera: i32,
}

impl RcMirror {
    pub const ZERO: Self = Self {
        deploy1: 0,
        deploy2: 0,
        safety: 0,
        camera: 0,
    };
}

/// Vehicle attitude, position and speeds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    /// Radians.
    pub roll: f32,
    /// Radians.
    pub pitch: f32,
    /// Degrees.
    pub heading: f32,
    /// Degrees.
    pub latitude: f32,
    /// Degrees.
    pub longitude: f32,
    /// Meters.
    pub altitude: f32,
    /// m/s.
    pub groundspeed: f32,
    /// m/s, positive up.
    pub vertical_speed: f32,
    /// m/s², body z axis.
    pub accel_z: f32,
}

impl Telemetry {
    pub const ZERO: Self = Self {
        roll: 0.0,
        pitch: 0.0,
        heading: 0.0,
        latitude: 0.0,
        longitude: 0.0,
        altitude: 0.0,
        groundspeed: 0.0,
        vertical_speed: 0.0,
        accel_z: 0.0,
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Battery {
    /// Volts.
    pub voltage: f32,
    /// Amperes.
    pub current: f32,
    /// Percent, -1 if unknown.
    pub remaining: f32,
}

impl Battery {
    pub const ZERO: Self = Self {
        voltage: 0.0,
        current: 0.0,
        remaining: 0.0,
    };
}

/// Latest normalized joystick sample and sensor temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoystickSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// 1 while the re-center button is held.
    pub button: i32,
    pub previous_button: i32,
    /// Degrees Celsius.
    pub temperature: f32,
}

impl JoystickSample {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        button: 0,
        previous_button: 0,
        temperature: 0.0,
    };
}

/// A run of failed link transmissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkFault {
    pub consecutive_failures: u32,
    pub last_error: OutputError,
}

/// Vehicle link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStatus {
    /// Target for outgoing commands, learned from the vehicle's HEARTBEAT.
    pub target_system: u8,
    pub target_component: u8,
    pub heartbeat_seen: bool,
    /// `Some` while transmissions are failing.
    pub fault: Option<LinkFault>,
}

impl LinkStatus {
    pub const DEFAULT: Self = Self {
        target_system: 1,
        target_component: 1,
        heartbeat_seen: false,
        fault: None,
    };
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The shared vehicle, payload and control record.
pub struct VehicleState {
    pub identity: Group<Identity>,
    pub authority: Group<ControlAuthority>,
    pub gimbal_config: Group<GimbalConfig>,
    pub setpoint: Group<GimbalSetpoint>,
    pub rc_mirror: Group<RcMirror>,
    pub channel_map: Group<ChannelMapping>,
    pub telemetry: Group<Telemetry>,
    pub battery: Group<Battery>,
    pub joystick: Group<JoystickSample>,
    pub curve: Group<ResponseCurve>,
    pub link: Group<LinkStatus>,
}

/// The configurable part of [`VehicleState`], applied at startup and on reload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateConfig {
    pub identity: Identity,
    pub gimbal: GimbalConfig,
    pub channels: ChannelMapping,
    pub curve: ResponseCurve,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            identity: Identity::DEFAULT,
            gimbal: GimbalConfig::DEFAULT,
            channels: DEFAULT_CHANNEL_MAPPING,
            curve: ResponseCurve::DEFAULT,
        }
    }
}

impl VehicleState {
    /// State with the built-in defaults and no control authority.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            identity: Group::new(Identity::DEFAULT),
            authority: Group::new(ControlAuthority::DEFAULT),
            gimbal_config: Group::new(GimbalConfig::DEFAULT),
            setpoint: Group::new(GimbalSetpoint::ZERO),
            rc_mirror: Group::new(RcMirror::ZERO),
            channel_map: Group::new(DEFAULT_CHANNEL_MAPPING),
            telemetry: Group::new(Telemetry::ZERO),
            battery: Group::new(Battery::ZERO),
            joystick: Group::new(JoystickSample::ZERO),
            curve: Group::new(ResponseCurve::DEFAULT),
            link: Group::new(LinkStatus::DEFAULT),
        }
    }

    /// Build state from configuration.
    #[must_use]
    pub fn with_config(config: &StateConfig) -> Self {
        let state = Self::new();
        state.apply_config(config);
        state
    }

    /// Re-apply configuration groups.
    ///
    /// Setpoints, staged commands and telemetry are left untouched.
    pub fn apply_config(&self, config: &StateConfig) {
        self.identity.store(config.identity);
        self.gimbal_config.store(config.gimbal);
        self.channel_map.store(config.channels);
        self.curve.store(config.curve);
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    #[test]
    fn test_defaults() {
        let state = VehicleState::new();
        assert_eq!(state.identity.load().vehicle_id, 13);
        let gimbal = state.gimbal_config.load();
        assert_eq!(gimbal.neutral_pitch, 1825);
        assert_eq!(gimbal.neutral_yaw, 1675);
        assert_eq!((gimbal.pitch_min, gimbal.pitch_max), (1010, 2018));
        assert_eq!((gimbal.yaw_min, gimbal.yaw_max), (1010, 2018));
        assert!((gimbal.gain - 25.1).abs() < f32::EPSILON);
        assert_eq!(state.authority.load().active, ActiveSource::None);
        assert_eq!(state.authority.load().autonomous, StagedCommand::default());
        assert_eq!(state.authority.load().manual, StagedCommand::default());
        assert_eq!(state.curve.load(), ResponseCurve::DEFAULT);
    }

    #[test]
    fn test_active_source_raw() {
        assert_eq!(ActiveSource::from_raw(2), Some(ActiveSource::Manual));
        assert_eq!(ActiveSource::from_raw(3), None);
        assert_eq!(ActiveSource::from_raw(-1), None);
        assert_eq!(ActiveSource::from_raw(1), Some(ActiveSource::Autonomous));
    }

    #[test]
    fn test_apply_config_keeps_setpoint() {
        let state = VehicleState::new();
        state.setpoint.update(|sp| sp.pitch = 1900);
        let config = StateConfig {
            identity: Identity { vehicle_id: 7 },
            gimbal: GimbalConfig {
                pitch_max: 1500,
                ..GimbalConfig::DEFAULT
            },
            ..StateConfig::default()
        };
        state.apply_config(&config);
        assert_eq!(state.identity.load().vehicle_id, 7);
        assert_eq!(state.gimbal_config.load().pitch_max, 1500);
        assert_eq!(state.setpoint.load().pitch, 1900);
    }

    #[test]
    fn test_group_updates_are_not_torn() {
        // Writers always keep pitch == yaw; readers must never see them differ.
        let state = Arc::new(VehicleState::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let state = state.clone();
            handles.push(thread::spawn(move || {
                for i in 0..10_000 {
                    state.setpoint.update(|sp| {
                        sp.pitch = i;
                        sp.yaw = i;
                    });
                }
            }));
        }
        for _ in 0..10_000 {
            let sp = state.setpoint.load();
            assert_eq!(sp.pitch, sp.yaw);
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
