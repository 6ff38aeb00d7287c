//! Gimbal mount bring-up.
//!
//! Once the vehicle has announced itself with a HEARTBEAT the mount is cycled
//! RETRACT, NEUTRAL and finally RC_TARGETING so that the RC override channels
//! drive it.

use embassy_time::Duration;
use log::{info, warn};
use mavlink_proto::MountMode;

use crate::dispatch::LinkDispatcher;
use crate::output::DatagramSink;
use crate::shutdown::{Shutdown, SLEEP_SLICE};
use crate::state::VehicleState;

/// Hold times between mount modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountTiming {
    pub retract_hold: Duration,
    pub neutral_hold: Duration,
}

impl MountTiming {
    pub const DEFAULT: Self = Self {
        retract_hold: Duration::from_secs(5),
        neutral_hold: Duration::from_secs(10),
    };
}

impl Default for MountTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Wait for the first vehicle HEARTBEAT, then run the mount sequence.
///
/// Returns `false` if shutdown interrupted the sequence. Send failures are
/// logged and the sequence carries on; they are also visible as a link fault.
pub async fn mount_setup<T: DatagramSink>(
    state: &VehicleState,
    dispatcher: &LinkDispatcher<'_, T>,
    shutdown: &Shutdown,
    timing: MountTiming,
) -> bool {
    while !state.link.load().heartbeat_seen {
        if !shutdown.sleep(SLEEP_SLICE).await {
            return false;
        }
    }

    let steps = [
        (MountMode::Retract, timing.retract_hold),
        (MountMode::Neutral, timing.neutral_hold),
    ];
    for (mode, hold) in steps {
        if let Err(e) = dispatcher.configure_mount(mode).await {
            warn!("mount {mode:?}: {e}");
        }
        if !shutdown.sleep(hold).await {
            return false;
        }
    }
    if let Err(e) = dispatcher.configure_mount(MountMode::RcTargeting).await {
        warn!("mount {:?}: {e}", MountMode::RcTargeting);
        return true;
    }
    info!("mount in RC targeting mode");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputError;
    use core::future::Future;
    use embassy_futures::block_on;
    use mavlink_proto::{FrameEncoder, MavMessage, MavlinkParser};
    use std::sync::{Arc, Mutex};
    use std::vec::Vec;

    struct MockLink {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl DatagramSink for MockLink {
        fn send(&mut self, datagram: &[u8]) -> impl Future<Output = Result<(), OutputError>> {
            self.frames.lock().unwrap().push(datagram.to_vec());
            core::future::ready(Ok(()))
        }
    }

    const FAST: MountTiming = MountTiming {
        retract_hold: Duration::from_millis(1),
        neutral_hold: Duration::from_millis(1),
    };

    fn mount_modes(frames: &[Vec<u8>]) -> Vec<u8> {
        let mut parser = MavlinkParser::new();
        let mut modes = Vec::new();
        for frame in frames {
            for &b in frame {
                if let Some(f) = parser.push_byte(b).unwrap() {
                    if let MavMessage::MountConfigure(m) = f.message {
                        modes.push(m.mount_mode);
                    }
                }
            }
        }
        modes
    }

    #[test]
    fn test_sequence_after_heartbeat() {
        let state = VehicleState::new();
        state.link.update(|l| l.heartbeat_seen = true);
        let frames = Arc::new(Mutex::new(Vec::new()));
        let link = MockLink {
            frames: frames.clone(),
        };
        let dispatcher = LinkDispatcher::new(link, FrameEncoder::gcs(), &state, None);
        let shutdown = Shutdown::new();

        assert!(block_on(mount_setup(&state, &dispatcher, &shutdown, FAST)));
        assert_eq!(
            mount_modes(&frames.lock().unwrap()),
            [
                MountMode::Retract as u8,
                MountMode::Neutral as u8,
                MountMode::RcTargeting as u8
            ]
        );
    }

    #[test]
    fn test_no_heartbeat_sends_nothing() {
        let state = VehicleState::new();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let link = MockLink {
            frames: frames.clone(),
        };
        let dispatcher = LinkDispatcher::new(link, FrameEncoder::gcs(), &state, None);
        let shutdown = Shutdown::new();
        shutdown.trigger();

        assert!(!block_on(mount_setup(&state, &dispatcher, &shutdown, FAST)));
        assert!(frames.lock().unwrap().is_empty());
    }
}
