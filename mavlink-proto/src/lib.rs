//! Minimal MAVLink framing for the payload relay's vehicle link.
//!
//! This crate covers exactly the messages the relay consumes and produces.
//! It does not depend on a generated MAVLink dialect crate, which keeps it
//! `no_std`, allocation-free and fully testable on the host.
//!
//! # Features
//!
//! - Byte-at-a-time v1/v2 parser with resync, signature skipping and
//!   zero-extension of truncated v2 payloads
//! - v1/v2 encoder owning the link's sequence counter
//! - RC channel mapping for override frames and the RC echo
//!
//! # Example
//!
//! ```
//! use mavlink_proto::{FrameEncoder, MavMessage, MavlinkParser, Heartbeat, MAX_FRAME_SIZE};
//!
//! let mut encoder = FrameEncoder::gcs();
//! let mut buf = [0u8; MAX_FRAME_SIZE];
//! let len = encoder.encode_v2(&Heartbeat::gcs(), &mut buf);
//!
//! let mut parser = MavlinkParser::new();
//! let mut seen = None;
//! for &byte in &buf[..len] {
//!     if let Ok(Some(frame)) = parser.push_byte(byte) {
//!         seen = Some(frame.message);
//!     }
//! }
//! assert!(matches!(seen, Some(MavMessage::Heartbeat(_))));
//! ```
//!
//! # MAVLink Message Types
//!
//! - **HEARTBEAT** (0): vehicle presence, target system/component discovery
//! - **SYS_STATUS** (1): battery voltage, current, remaining
//! - **SCALED_IMU** (26): vertical acceleration
//! - **ATTITUDE** (30), **GLOBAL_POSITION_INT** (33), **VFR_HUD** (74): telemetry
//! - **RC_CHANNELS** (65): RC echo for the channel mirror
//! - **RC_CHANNELS_OVERRIDE** (70): gimbal, camera and deploy setpoints
//! - **COMMAND_LONG** (76): DO_SET_SERVO
//! - **MOUNT_CONFIGURE** (156): gimbal mount mode

#![cfg_attr(not(feature = "std"), no_std)]

pub mod crc;
pub mod encoder;
pub mod mapping;
pub mod messages;
pub mod parser;

pub use encoder::{FrameEncoder, GCS_COMPONENT_ID, GCS_SYSTEM_ID};
pub use mapping::{
    pwm_to_channel, ChannelMapping, MirroredChannels, OverrideValues, DEFAULT_CHANNEL_MAPPING,
    RC_CHANNEL_COUNT,
};
pub use messages::{
    Attitude, CommandLong, GlobalPositionInt, Heartbeat, MavMessage, Message, MountConfigure,
    MountMode, RcChannels, RcChannelsOverride, ScaledImu, SysStatus, VfrHud,
    MAV_CMD_DO_SET_SERVO, MAX_PAYLOAD_LEN,
};
pub use parser::{Frame, MavlinkParser, ParseError, Version, MAVLINK_STX_V1, MAVLINK_STX_V2, MAX_FRAME_SIZE};
