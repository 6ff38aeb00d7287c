//! Relay configuration file.
//!
//! A JSON document whose every field has a default, so a partial file (or
//! `{}`) is valid. The vehicle-facing parts ([`RelayConfig::state_config`])
//! can be re-applied while the relay is running; addresses and the joystick
//! mode only take effect on restart.

use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use embassy_time::Duration;
use mavlink_proto::{ChannelMapping, RC_CHANNEL_COUNT};
use relay_core::{ControlTiming, GimbalConfig, Identity, ResponseCurve, StateConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JoystickMode {
    /// Samples arrive as UDP datagrams from a joystick host.
    Network,
    /// A local `/dev/input/js*` device.
    Usb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the inbound peer ports are bound on.
    pub bind_ip: IpAddr,
    /// Meta device address.
    pub meta_ip: IpAddr,
    /// Video application address.
    pub video_ip: IpAddr,
    /// Local address of the vehicle link.
    pub link_bind: SocketAddr,
    /// Fixed vehicle address. When absent, replies go to the last sender.
    pub link_peer: Option<SocketAddr>,
    pub touch_port: u16,
    pub joystick_port: u16,
    pub temperature_port: u16,
    pub meta_receive_port: u16,
    pub meta_send_port: u16,
    pub video_port: u16,
    pub receive_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            meta_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            video_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            link_bind: SocketAddr::from(([0, 0, 0, 0], 14550)),
            link_peer: None,
            touch_port: 5001,
            joystick_port: 5002,
            temperature_port: 5003,
            meta_receive_port: 5004,
            meta_send_port: 5005,
            video_port: 5006,
            receive_timeout_ms: 100,
        }
    }
}

impl NetworkConfig {
    pub fn bind_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_ip, port)
    }

    pub fn meta_target(&self) -> SocketAddr {
        SocketAddr::new(self.meta_ip, self.meta_send_port)
    }

    pub fn video_target(&self) -> SocketAddr {
        SocketAddr::new(self.video_ip, self.video_port)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoystickConfig {
    pub mode: JoystickMode,
    /// Device node used in [`JoystickMode::Usb`].
    pub device: PathBuf,
    pub exponent: f32,
    pub dead_zone: f32,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            mode: JoystickMode::Network,
            device: PathBuf::from("/dev/input/js0"),
            exponent: ResponseCurve::DEFAULT.exponent,
            dead_zone: ResponseCurve::DEFAULT.dead_zone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GimbalSettings {
    pub gain: f32,
    pub pitch_neutral: i32,
    pub yaw_neutral: i32,
    pub pitch_min: i32,
    pub pitch_max: i32,
    pub yaw_min: i32,
    pub yaw_max: i32,
}

impl Default for GimbalSettings {
    fn default() -> Self {
        let g = GimbalConfig::DEFAULT;
        Self {
            gain: g.gain,
            pitch_neutral: g.neutral_pitch,
            yaw_neutral: g.neutral_yaw,
            pitch_min: g.pitch_min,
            pitch_max: g.pitch_max,
            yaw_min: g.yaw_min,
            yaw_max: g.yaw_max,
        }
    }
}

/// 1-based RC channel numbers; 0 disables a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub deploy1: u8,
    pub deploy2: u8,
    pub safety: u8,
    pub pitch: u8,
    pub yaw: u8,
    pub camera: u8,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        let m = mavlink_proto::DEFAULT_CHANNEL_MAPPING;
        Self {
            deploy1: m.deploy1,
            deploy2: m.deploy2,
            safety: m.safety,
            pitch: m.pitch,
            yaw: m.yaw,
            camera: m.camera,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tick_ms: u64,
    pub dispatch_interval_ms: u64,
    pub overlay_period_ms: u64,
    pub meta_period_ms: u64,
    /// How often the config file is checked for changes; 0 disables reload.
    pub reload_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: ControlTiming::DEFAULT.tick.as_millis(),
            dispatch_interval_ms: ControlTiming::DEFAULT.dispatch_interval.as_millis(),
            overlay_period_ms: relay_core::OVERLAY_PERIOD.as_millis(),
            meta_period_ms: relay_core::META_PERIOD.as_millis(),
            reload_poll_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn control(&self) -> ControlTiming {
        ControlTiming {
            tick: Duration::from_millis(self.tick_ms),
            dispatch_interval: Duration::from_millis(self.dispatch_interval_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub vehicle_id: i32,
    pub network: NetworkConfig,
    pub joystick: JoystickConfig,
    pub gimbal: GimbalSettings,
    pub channels: ChannelSettings,
    pub timing: TimingConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            vehicle_id: Identity::DEFAULT.vehicle_id,
            network: NetworkConfig::default(),
            joystick: JoystickConfig::default(),
            gimbal: GimbalSettings::default(),
            channels: ChannelSettings::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid JSON or does not pass
    /// [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the relay cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let channels = [
            ("deploy1", self.channels.deploy1),
            ("deploy2", self.channels.deploy2),
            ("safety", self.channels.safety),
            ("pitch", self.channels.pitch),
            ("yaw", self.channels.yaw),
            ("camera", self.channels.camera),
        ];
        for (name, channel) in channels {
            if usize::from(channel) > RC_CHANNEL_COUNT {
                return invalid(format!(
                    "channels.{name} = {channel}, must be at most {RC_CHANNEL_COUNT}"
                ));
            }
        }
        let j = &self.joystick;
        if !(j.exponent.is_finite() && j.exponent > 0.0) {
            return invalid(format!("joystick.exponent = {}, must be > 0", j.exponent));
        }
        if !(0.0..1.0).contains(&j.dead_zone) {
            return invalid(format!(
                "joystick.dead_zone = {}, must be in [0, 1)",
                j.dead_zone
            ));
        }
        if !self.gimbal.gain.is_finite() {
            return invalid("gimbal.gain must be finite".into());
        }
        let t = &self.timing;
        if t.tick_ms == 0 || t.overlay_period_ms == 0 || t.meta_period_ms == 0 {
            return invalid("timing periods must be non-zero".into());
        }
        if self.network.receive_timeout_ms == 0 {
            return invalid("network.receive_timeout_ms must be non-zero".into());
        }
        Ok(())
    }

    /// The part of the configuration held in vehicle state.
    pub fn state_config(&self) -> StateConfig {
        let g = &self.gimbal;
        let c = &self.channels;
        StateConfig {
            identity: Identity {
                vehicle_id: self.vehicle_id,
            },
            gimbal: GimbalConfig {
                neutral_pitch: g.pitch_neutral,
                neutral_yaw: g.yaw_neutral,
                gain: g.gain,
                pitch_min: g.pitch_min,
                pitch_max: g.pitch_max,
                yaw_min: g.yaw_min,
                yaw_max: g.yaw_max,
            },
            channels: ChannelMapping {
                deploy1: c.deploy1,
                deploy2: c.deploy2,
                safety: c.safety,
                pitch: c.pitch,
                yaw: c.yaw,
                camera: c.camera,
            },
            curve: ResponseCurve {
                exponent: self.joystick.exponent,
                dead_zone: self.joystick.dead_zone,
            },
        }
    }
}
