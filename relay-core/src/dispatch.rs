//! Serialized command path to the vehicle link.
//!
//! Every outgoing frame goes through one async lock that also owns the
//! MAVLink sequence counter, so frames from the control loop and the mount
//! setup sequence never interleave or reuse a sequence number.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use log::{info, warn};
use mavlink_proto::{
    pwm_to_channel, FrameEncoder, Message, MountConfigure, MountMode, OverrideValues,
    MAX_FRAME_SIZE,
};

use crate::monitor::{mirror, Direction, Monitor};
use crate::output::{DatagramSink, OutputError};
use crate::state::{GimbalSetpoint, LinkFault, VehicleState};

/// Error type for dispatch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// The link transport failed to send the frame.
    Link(OutputError),
}

impl From<OutputError> for DispatchError {
    fn from(err: OutputError) -> Self {
        DispatchError::Link(err)
    }
}

impl core::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link transmit failed: {e}"),
        }
    }
}

/// Values for one RC override dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetpointCommand {
    pub deploy1: i32,
    pub deploy2: i32,
    pub camera: i32,
    pub pitch: i32,
    pub yaw: i32,
}

impl From<&GimbalSetpoint> for SetpointCommand {
    fn from(sp: &GimbalSetpoint) -> Self {
        Self {
            deploy1: sp.deploy1,
            deploy2: sp.deploy2,
            camera: sp.camera,
            pitch: sp.pitch,
            yaw: sp.yaw,
        }
    }
}

struct LinkWriter<T> {
    transport: T,
    encoder: FrameEncoder,
    frame: [u8; MAX_FRAME_SIZE],
}

/// Sends commands to the vehicle over a [`DatagramSink`].
pub struct LinkDispatcher<'a, T> {
    writer: Mutex<CriticalSectionRawMutex, LinkWriter<T>>,
    state: &'a VehicleState,
    monitor: Option<&'a Monitor>,
}

impl<'a, T: DatagramSink> LinkDispatcher<'a, T> {
    pub fn new(
        transport: T,
        encoder: FrameEncoder,
        state: &'a VehicleState,
        monitor: Option<&'a Monitor>,
    ) -> Self {
        Self {
            writer: Mutex::new(LinkWriter {
                transport,
                encoder,
                frame: [0u8; MAX_FRAME_SIZE],
            }),
            state,
            monitor,
        }
    }

    /// Send one RC_CHANNELS_OVERRIDE carrying the setpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Link`] if the transport fails; the failure is
    /// also recorded in `LinkStatus::fault`.
    pub async fn send_setpoint(&self, cmd: &SetpointCommand) -> Result<(), DispatchError> {
        let link = self.state.link.load();
        let values = OverrideValues {
            deploy1: pwm_to_channel(cmd.deploy1),
            deploy2: pwm_to_channel(cmd.deploy2),
            camera: pwm_to_channel(cmd.camera),
            pitch: pwm_to_channel(cmd.pitch),
            yaw: pwm_to_channel(cmd.yaw),
        };
        let msg = self.state.channel_map.load().override_message(
            link.target_system,
            link.target_component,
            &values,
        );
        self.send(
            &msg,
            format_args!(
                "RC_CHANNELS_OVERRIDE deploy1={} deploy2={} camera={} pitch={} yaw={}",
                cmd.deploy1, cmd.deploy2, cmd.camera, cmd.pitch, cmd.yaw
            ),
        )
        .await
    }

    /// Switch the gimbal mount mode.
    ///
    /// # Errors
    ///
    /// See [`send_setpoint`](Self::send_setpoint).
    pub async fn configure_mount(&self, mode: MountMode) -> Result<(), DispatchError> {
        let link = self.state.link.load();
        let msg = MountConfigure::stabilized(link.target_system, link.target_component, mode);
        self.send(&msg, format_args!("MOUNT_CONFIGURE mode={mode:?}"))
            .await
    }

    async fn send<M: Message>(
        &self,
        msg: &M,
        description: core::fmt::Arguments<'_>,
    ) -> Result<(), DispatchError> {
        let result = {
            let mut writer = self.writer.lock().await;
            let LinkWriter {
                transport,
                encoder,
                frame,
            } = &mut *writer;
            let len = encoder.encode_v2(msg, frame);
            transport.send(&frame[..len]).await
        };

        match result {
            Ok(()) => {
                mirror(self.monitor, Direction::Sent, description);
                self.clear_fault();
                Ok(())
            }
            Err(e) => {
                self.record_fault(e);
                Err(DispatchError::Link(e))
            }
        }
    }

    fn record_fault(&self, error: OutputError) {
        let failures = self.state.link.update(|link| {
            let failures = link.fault.map_or(0, |f| f.consecutive_failures) + 1;
            link.fault = Some(LinkFault {
                consecutive_failures: failures,
                last_error: error,
            });
            failures
        });
        warn!("link transmit failed ({failures} in a row): {error}");
    }

    fn clear_fault(&self) {
        let cleared = self.state.link.update(|link| link.fault.take());
        if let Some(fault) = cleared {
            info!(
                "link recovered after {} failed sends",
                fault.consecutive_failures
            );
        }
    }

    #[cfg(test)]
    async fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut writer = self.writer.lock().await;
        f(&mut writer.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::Future;
    use embassy_futures::block_on;
    use mavlink_proto::{MavMessage, MavlinkParser};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::vec::Vec;

    // Mock link recording frames; fails while `fail` is set
    struct MockLink {
        frames: Arc<StdMutex<Vec<Vec<u8>>>>,
        fail: bool,
    }

    impl MockLink {
        fn new() -> Self {
            Self {
                frames: Arc::new(StdMutex::new(Vec::new())),
                fail: false,
            }
        }
    }

    impl DatagramSink for MockLink {
        fn send(&mut self, datagram: &[u8]) -> impl Future<Output = Result<(), OutputError>> {
            let result = if self.fail {
                Err(OutputError::Io)
            } else {
                self.frames.lock().unwrap().push(datagram.to_vec());
                Ok(())
            };
            core::future::ready(result)
        }
    }

    fn decode(frame: &[u8]) -> mavlink_proto::Frame {
        let mut parser = MavlinkParser::new();
        let mut found = None;
        for &b in frame {
            if let Some(f) = parser.push_byte(b).unwrap() {
                found = Some(f);
            }
        }
        found.unwrap()
    }

    #[test]
    fn test_setpoint_frame_layout() {
        let state = VehicleState::new();
        let monitor = Monitor::new();
        let link = MockLink::new();
        let frames = link.frames.clone();
        let dispatcher = LinkDispatcher::new(link, FrameEncoder::gcs(), &state, Some(&monitor));

        let cmd = SetpointCommand {
            deploy1: 1100,
            deploy2: 1200,
            camera: 1535,
            pitch: 1825,
            yaw: 1675,
        };
        block_on(dispatcher.send_setpoint(&cmd)).unwrap();

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        let frame = decode(&frames[0]);
        assert_eq!(frame.system_id, 255);
        assert_eq!(frame.component_id, 190);
        let MavMessage::RcChannelsOverride(msg) = frame.message else {
            panic!("unexpected {:?}", frame.message);
        };
        let mut expected = [0u16; 18];
        expected[5] = 1100;
        expected[6] = 1200;
        expected[8] = 1825;
        expected[10] = 1675;
        expected[11] = 1535;
        assert_eq!(msg.channels, expected);

        let event = monitor.try_next().unwrap();
        assert_eq!(event.direction, Direction::Sent);
        assert!(event.description.starts_with("RC_CHANNELS_OVERRIDE"));
    }

    #[test]
    fn test_sequence_shared_across_commands() {
        let state = VehicleState::new();
        let link = MockLink::new();
        let frames = link.frames.clone();
        let dispatcher = LinkDispatcher::new(link, FrameEncoder::gcs(), &state, None);

        block_on(async {
            dispatcher.configure_mount(MountMode::Retract).await.unwrap();
            dispatcher.configure_mount(MountMode::Neutral).await.unwrap();
            dispatcher
                .send_setpoint(&SetpointCommand::default())
                .await
                .unwrap();
        });

        let frames = frames.lock().unwrap();
        let seqs: Vec<u8> = frames.iter().map(|f| decode(f).sequence).collect();
        assert_eq!(seqs, [0, 1, 2]);
        assert!(matches!(
            decode(&frames[0]).message,
            MavMessage::MountConfigure(m) if m.mount_mode == MountMode::Retract as u8
        ));
        assert!(matches!(
            decode(&frames[1]).message,
            MavMessage::MountConfigure(m) if m.mount_mode == MountMode::Neutral as u8
        ));
        assert!(matches!(
            decode(&frames[2]).message,
            MavMessage::RcChannelsOverride(_)
        ));
    }

    #[test]
    fn test_link_fault_set_and_cleared() {
        let state = VehicleState::new();
        let monitor = Monitor::new();
        let mut link = MockLink::new();
        link.fail = true;
        let dispatcher = LinkDispatcher::new(link, FrameEncoder::gcs(), &state, Some(&monitor));
        let cmd = SetpointCommand::default();

        block_on(async {
            assert_eq!(
                dispatcher.send_setpoint(&cmd).await,
                Err(DispatchError::Link(OutputError::Io))
            );
            assert!(dispatcher.send_setpoint(&cmd).await.is_err());
        });
        let fault = state.link.load().fault.unwrap();
        assert_eq!(fault.consecutive_failures, 2);
        assert_eq!(fault.last_error, OutputError::Io);
        // Failed sends are not mirrored
        assert!(monitor.try_next().is_none());

        block_on(async {
            dispatcher.with_transport(|t| t.fail = false).await;
            dispatcher.send_setpoint(&cmd).await.unwrap();
        });
        assert!(state.link.load().fault.is_none());
    }

    #[test]
    fn test_targets_learned_link() {
        let state = VehicleState::new();
        state.link.update(|l| {
            l.target_system = 42;
            l.target_component = 7;
        });
        let link = MockLink::new();
        let frames = link.frames.clone();
        let dispatcher = LinkDispatcher::new(link, FrameEncoder::gcs(), &state, None);
        block_on(async {
            dispatcher.configure_mount(MountMode::RcTargeting).await.unwrap();
            dispatcher
                .send_setpoint(&SetpointCommand::default())
                .await
                .unwrap();
        });

        let frames = frames.lock().unwrap();
        let MavMessage::MountConfigure(mount) = decode(&frames[0]).message else {
            panic!("expected MOUNT_CONFIGURE");
        };
        assert_eq!((mount.target_system, mount.target_component), (42, 7));
        let MavMessage::RcChannelsOverride(rc) = decode(&frames[1]).message else {
            panic!("expected RC_CHANNELS_OVERRIDE");
        };
        assert_eq!((rc.target_system, rc.target_component), (42, 7));
    }
}
