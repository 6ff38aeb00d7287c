//! Host runtime for the payload relay.
//!
//! Binds the [`relay_core`] loops to UDP sockets, a Linux joystick device and
//! a JSON configuration file, and runs them as embassy tasks on the std
//! executor.
//!
//! - [`config`]: [`RelayConfig`] and its validation
//! - [`udp`]: peer sockets and the shared vehicle link socket
//! - [`joystick_dev`]: reader thread for `/dev/input/js*`
//! - [`reload`]: configuration file watcher
//! - [`tasks`]: the embassy tasks and their shared [`RelayContext`]

pub mod config;
pub mod joystick_dev;
pub mod reload;
pub mod tasks;
pub mod udp;

pub use config::{ConfigError, JoystickMode, RelayConfig};
pub use joystick_dev::{EventQueue, EventSource};
pub use reload::ConfigWatcher;
pub use tasks::{Dispatcher, PeerChannel, RelayContext, Workers};
pub use udp::{BindError, Endpoints, MavlinkLink, UdpSink, UdpSource};
