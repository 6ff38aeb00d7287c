//! Vehicle state, control arbitration and link plumbing for the payload relay.
//!
//! This crate holds everything between the wire formats and the host runtime.
//! It has no sockets of its own: every transport is reached through the
//! [`DatagramSource`] and [`DatagramSink`] traits, so the same loops run under
//! the std executor and in tests with mock transports.
//!
//! # Overview
//!
//! - [`state`]: [`VehicleState`], the shared record split into field groups
//! - [`expo`]: joystick response curve ([`normalize`])
//! - [`arbiter`]: control-authority transition function ([`step`])
//! - [`control`]: the tick loop around the arbiter ([`ControlLoop`])
//! - [`dispatch`]: serialized MAVLink command path ([`LinkDispatcher`])
//! - [`mount`]: gimbal mount bring-up after the first HEARTBEAT
//! - [`ingest`]: per-channel receive loops ([`Ingest`]) and their handlers
//! - [`fanout`]: periodic telemetry publishers ([`Fanout`])
//! - [`monitor`]: bounded queue mirroring link traffic ([`Monitor`])
//! - [`shutdown`]: cooperative cancellation ([`Shutdown`])
//!
//! # Example
//!
//! ```rust
//! use relay_core::{step, ActiveSource, StagedCommand, TickInputs, VehicleState};
//!
//! let state = VehicleState::new();
//! state.authority.update(|a| {
//!     a.active = ActiveSource::Autonomous;
//!     a.autonomous = StagedCommand { camera: 1, command1: 1100, command2: 1200 };
//! });
//!
//! let inputs = TickInputs {
//!     authority: state.authority.load(),
//!     joystick: state.joystick.load(),
//!     gimbal: state.gimbal_config.load(),
//!     setpoint: state.setpoint.load(),
//! };
//! let transition = step(&inputs);
//! assert!(transition.dispatch);
//! assert_eq!(transition.setpoint.camera, 1095);
//! ```
//!
//! # Features
//!
//! - **`defmt`**: Enable defmt formatting of error types

pub mod arbiter;
pub mod control;
pub mod dispatch;
pub mod expo;
pub mod fanout;
pub mod ingest;
pub mod input;
pub mod monitor;
pub mod mount;
pub mod output;
pub mod shutdown;
pub mod state;

pub use arbiter::{
    clamp_pwm, step, translate_camera, TickInputs, Transition, CAMERA_MODE_A_PWM, CAMERA_MODE_B_PWM,
};
pub use control::{ControlLoop, ControlTiming};
pub use dispatch::{DispatchError, LinkDispatcher, SetpointCommand};
pub use expo::{normalize, ResponseCurve};
pub use fanout::{meta_telemetry, overlay_state, Fanout, META_PERIOD, OVERLAY_PERIOD};
pub use ingest::{
    apply_frame, DatagramHandler, Ingest, IngestError, JoystickHandler, MetaCommandHandler,
    TemperatureHandler, TouchHandler, UsbJoystickHandler, VehicleLinkHandler, RECV_BUFFER_LEN,
};
pub use input::{DatagramSource, InputError};
pub use monitor::{drain, Direction, Monitor, MonitorEvent};
pub use mount::{mount_setup, MountTiming};
pub use output::{DatagramSink, OutputError};
pub use shutdown::{Shutdown, SLEEP_SLICE};
pub use state::{
    ActiveSource, Battery, ControlAuthority, ControlFlags, GimbalConfig, GimbalSetpoint, Group,
    Identity, JoystickSample, LinkFault, LinkStatus, RcMirror, StagedCommand, StateConfig,
    Telemetry, VehicleState,
};
