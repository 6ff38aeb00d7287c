//! Fixed binary datagram layouts for the payload relay.
//!
//! The relay talks to its ground-side peers over plain UDP datagrams whose
//! layouts are fixed by the peers, not negotiated:
//!
//! | Peer | Direction | Type |
//! |------|-----------|------|
//! | Touch app | in | [`TouchCommand`] |
//! | Joystick host | in | [`JoystickDatagram`] |
//! | Temperature sensor | in | [`TemperatureReading`] |
//! | Meta device | in | [`MetaCommand`] |
//! | Meta device | out | [`MetaTelemetry`] |
//! | Video app | out | [`OverlayState`] |
//!
//! [`JsEvent`] is the 8-byte record produced by a Linux joystick device and
//! is decoded with the same machinery.
//!
//! All layouts are little-endian with no padding and are checked for exact
//! length on decode.
//!
//! # Example
//!
//! ```
//! use relay_proto::{parse_touch, Serialize, TouchCommand};
//!
//! let cmd = TouchCommand { active_source: 2, camera: 1, ..TouchCommand::default() };
//! let mut buf = [0u8; TouchCommand::SIZE];
//! let len = cmd.serialize(&mut buf).unwrap();
//! assert_eq!(parse_touch(&buf[..len]).unwrap().active_source, 2);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting
//! - **`heapless`**: Enable `serialize_to_vec()`

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod parser;
pub mod serialize;
pub mod types;

pub use parser::{
    parse_joystick, parse_js_event, parse_meta_command, parse_meta_telemetry, parse_overlay,
    parse_temperature, parse_touch, ParseError,
};
pub use serialize::{Serialize, SerializeError, MAX_DATAGRAM_SIZE};
pub use types::{
    JoystickDatagram, JsEvent, MetaCommand, MetaTelemetry, OverlayState, TemperatureReading,
    TouchCommand,
};
