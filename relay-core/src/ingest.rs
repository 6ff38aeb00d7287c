//! Inbound channels: receive loops that decode one stream into VehicleState.

use log::{debug, info, warn};
use mavlink_proto::{Frame, Heartbeat, MavMessage, MavlinkParser};
use relay_proto::{
    parse_joystick, parse_js_event, parse_meta_command, parse_temperature, parse_touch, JsEvent,
};

use crate::input::{DatagramSource, InputError};
use crate::monitor::{mirror, Direction, Monitor};
use crate::shutdown::Shutdown;
use crate::state::{ActiveSource, RcMirror, StagedCommand, VehicleState};

/// Receive buffer size; large enough for a datagram of several MAVLink frames.
pub const RECV_BUFFER_LEN: usize = 2048;

/// Standard gravity, for milli-g to m/s² conversion.
pub const STANDARD_GRAVITY: f32 = 9.806_65;

/// Error type for one ingest iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IngestError {
    /// Error from the datagram source.
    Input(InputError),
    /// Datagram did not match its fixed layout.
    Decode(relay_proto::ParseError),
    /// Touch app sent an activeSource outside {0, 1, 2}.
    UnknownSource(i32),
    /// A MAVLink frame failed validation.
    Link(mavlink_proto::ParseError),
}

impl From<InputError> for IngestError {
    fn from(err: InputError) -> Self {
        IngestError::Input(err)
    }
}

impl From<relay_proto::ParseError> for IngestError {
    fn from(err: relay_proto::ParseError) -> Self {
        IngestError::Decode(err)
    }
}

impl From<mavlink_proto::ParseError> for IngestError {
    fn from(err: mavlink_proto::ParseError) -> Self {
        IngestError::Link(err)
    }
}

impl core::fmt::Display for IngestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Input(e) => write!(f, "receive failed: {e}"),
            Self::Decode(e) => write!(f, "bad datagram: {e}"),
            Self::UnknownSource(raw) => write!(f, "unknown active source {raw}"),
            Self::Link(e) => write!(f, "bad MAVLink frame: {e}"),
        }
    }
}

/// Decodes one datagram and writes the result into state.
pub trait DatagramHandler {
    /// # Errors
    ///
    /// Returns an [`IngestError`] if the datagram is rejected. State may have
    /// been partially updated only for streams carrying several independent
    /// frames per datagram.
    fn handle(&mut self, datagram: &[u8], state: &VehicleState) -> Result<(), IngestError>;
}

/// A receive loop binding one source to one handler.
///
/// Errors are logged and the loop continues. It ends on shutdown or when the
/// source reports it is disconnected.
pub struct Ingest<'a, S, H> {
    name: &'static str,
    source: S,
    handler: H,
    state: &'a VehicleState,
    shutdown: &'a Shutdown,
}

impl<'a, S: DatagramSource, H: DatagramHandler> Ingest<'a, S, H> {
    pub fn new(
        name: &'static str,
        source: S,
        handler: H,
        state: &'a VehicleState,
        shutdown: &'a Shutdown,
    ) -> Self {
        Self {
            name,
            source,
            handler,
            state,
            shutdown,
        }
    }

    /// Run until shutdown.
    pub async fn run(&mut self) {
        info!("{} ingest started", self.name);
        while !self.shutdown.is_triggered() {
            match self.process_one().await {
                Ok(()) => {}
                Err(IngestError::Input(InputError::Disconnected)) => {
                    warn!("{}: source closed", self.name);
                    break;
                }
                Err(e) => warn!("{}: {}", self.name, e),
            }
        }
        info!("{} ingest stopped", self.name);
    }

    /// Receive and apply a single datagram.
    ///
    /// A receive timeout is not an error.
    pub async fn process_one(&mut self) -> Result<(), IngestError> {
        let mut buf = [0u8; RECV_BUFFER_LEN];
        let len = match self.source.receive(&mut buf).await {
            Ok(len) => len,
            Err(InputError::Timeout) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        self.handler.handle(&buf[..len], self.state)
    }
}

/// Touch app: control authority, manual staged values and payload flags.
#[derive(Debug, Default)]
pub struct TouchHandler;

impl DatagramHandler for TouchHandler {
    fn handle(&mut self, datagram: &[u8], state: &VehicleState) -> Result<(), IngestError> {
        let cmd = parse_touch(datagram)?;
        let active = ActiveSource::from_raw(cmd.active_source)
            .ok_or(IngestError::UnknownSource(cmd.active_source))?;
        state.authority.update(|authority| {
            authority.active = active;
            authority.manual = StagedCommand {
                camera: cmd.camera,
                command1: cmd.command1,
                command2: cmd.command2,
            };
            authority.flags.neural_net = cmd.neural_net;
            authority.flags.smart_deploy = cmd.smart_deploy;
        });
        debug!("touch: active source {active:?}");
        Ok(())
    }
}

/// Meta device: autonomous staged values.
#[derive(Debug, Default)]
pub struct MetaCommandHandler;

impl DatagramHandler for MetaCommandHandler {
    fn handle(&mut self, datagram: &[u8], state: &VehicleState) -> Result<(), IngestError> {
        let cmd = parse_meta_command(datagram)?;
        state.authority.update(|authority| {
            authority.autonomous = StagedCommand {
                camera: cmd.camera,
                command1: cmd.command1,
                command2: cmd.command2,
            };
        });
        Ok(())
    }
}

/// Network joystick: four floats, shaped by the current response curve.
#[derive(Debug, Default)]
pub struct JoystickHandler;

impl DatagramHandler for JoystickHandler {
    fn handle(&mut self, datagram: &[u8], state: &VehicleState) -> Result<(), IngestError> {
        let sample = parse_joystick(datagram)?;
        let curve = state.curve.load();
        state.joystick.update(|joystick| {
            joystick.x = curve.apply(sample.x);
            joystick.y = curve.apply(sample.y);
            joystick.z = curve.apply(sample.z);
            joystick.previous_button = joystick.button;
            // Pressed only on an exact 1.0
            joystick.button = i32::from(sample.button == 1.0);
        });
        Ok(())
    }
}

/// USB joystick: Linux `js_event` records.
#[derive(Debug, Default)]
pub struct UsbJoystickHandler;

impl UsbJoystickHandler {
    /// Axis carrying joystick X.
    pub const AXIS_X: u8 = 0;
    pub const AXIS_Y: u8 = 1;
    pub const AXIS_Z: u8 = 2;
    /// Button used for re-centering.
    pub const BUTTON_RECENTER: u8 = 0;
}

impl DatagramHandler for UsbJoystickHandler {
    fn handle(&mut self, datagram: &[u8], state: &VehicleState) -> Result<(), IngestError> {
        let event = parse_js_event(datagram)?;
        match event.event_type() {
            JsEvent::AXIS => {
                let value = state.curve.load().apply(event.axis_value());
                state.joystick.update(|joystick| match event.number {
                    Self::AXIS_X => joystick.x = value,
                    Self::AXIS_Y => joystick.y = value,
                    Self::AXIS_Z => joystick.z = value,
                    _ => {}
                });
            }
            JsEvent::BUTTON if event.number == Self::BUTTON_RECENTER => {
                state.joystick.update(|joystick| {
                    joystick.previous_button = joystick.button;
                    joystick.button = i32::from(event.value != 0);
                });
            }
            _ => {}
        }
        Ok(())
    }
}

/// Temperature sensor.
#[derive(Debug, Default)]
pub struct TemperatureHandler;

impl DatagramHandler for TemperatureHandler {
    fn handle(&mut self, datagram: &[u8], state: &VehicleState) -> Result<(), IngestError> {
        let reading = parse_temperature(datagram)?;
        state
            .joystick
            .update(|joystick| joystick.temperature = reading.celsius);
        Ok(())
    }
}

/// Vehicle link: MAVLink telemetry and RC echo.
pub struct VehicleLinkHandler<'a> {
    parser: MavlinkParser,
    monitor: Option<&'a Monitor>,
}

impl<'a> VehicleLinkHandler<'a> {
    pub fn new(monitor: Option<&'a Monitor>) -> Self {
        Self {
            parser: MavlinkParser::new(),
            monitor,
        }
    }
}

impl DatagramHandler for VehicleLinkHandler<'_> {
    fn handle(&mut self, datagram: &[u8], state: &VehicleState) -> Result<(), IngestError> {
        let monitor = self.monitor;
        let mut last_error = None;
        // A frame never spans datagrams
        self.parser.reset();
        self.parser.push_bytes(
            datagram,
            |frame| {
                mirror(
                    monitor,
                    Direction::Received,
                    format_args!(
                        "{} from {}/{}",
                        frame.message.name(),
                        frame.system_id,
                        frame.component_id
                    ),
                );
                apply_frame(&frame, state);
            },
            |e| last_error = Some(e),
        );
        match last_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Apply one decoded vehicle frame to state.
pub fn apply_frame(frame: &Frame, state: &VehicleState) {
    match frame.message {
        MavMessage::Heartbeat(hb) => {
            // Other ground stations on the link are not the vehicle
            if hb.mav_type == Heartbeat::MAV_TYPE_GCS {
                return;
            }
            let first = state.link.update(|link| {
                let first = !link.heartbeat_seen;
                link.target_system = frame.system_id;
                link.target_component = frame.component_id;
                link.heartbeat_seen = true;
                first
            });
            if first {
                info!(
                    "vehicle heartbeat from {}/{}",
                    frame.system_id, frame.component_id
                );
            }
        }
        MavMessage::RcChannels(rc) => {
            let mirrored = state.channel_map.load().mirror(&rc);
            state.rc_mirror.store(RcMirror {
                deploy1: i32::from(mirrored.deploy1),
                deploy2: i32::from(mirrored.deploy2),
                safety: i32::from(mirrored.safety),
                camera: i32::from(mirrored.camera),
            });
        }
        MavMessage::VfrHud(hud) => state.telemetry.update(|t| {
            t.groundspeed = hud.groundspeed;
            t.altitude = hud.alt;
            t.heading = f32::from(hud.heading);
            t.vertical_speed = hud.climb;
        }),
        MavMessage::Attitude(att) => state.telemetry.update(|t| {
            t.roll = att.roll;
            t.pitch = att.pitch;
        }),
        MavMessage::GlobalPositionInt(pos) => state.telemetry.update(|t| {
            t.latitude = (f64::from(pos.lat) / 1e7) as f32;
            t.longitude = (f64::from(pos.lon) / 1e7) as f32;
            t.altitude = pos.alt as f32 / 1000.0;
        }),
        MavMessage::SysStatus(status) => state.battery.update(|b| {
            b.voltage = f32::from(status.voltage_battery) / 1000.0;
            b.current = f32::from(status.current_battery) / 100.0;
            b.remaining = f32::from(status.battery_remaining);
        }),
        MavMessage::ScaledImu(imu) => state.telemetry.update(|t| {
            t.accel_z = f32::from(imu.zacc) * STANDARD_GRAVITY / 1000.0;
        }),
        MavMessage::RcChannelsOverride(_)
        | MavMessage::CommandLong(_)
        | MavMessage::MountConfigure(_)
        | MavMessage::Unknown(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::Future;
    use embassy_futures::block_on;
    use mavlink_proto::{
        FrameEncoder, GlobalPositionInt, RcChannels, ScaledImu, SysStatus, VfrHud,
        MAX_FRAME_SIZE,
    };
    use relay_proto::{JoystickDatagram, MetaCommand, Serialize, TemperatureReading, TouchCommand};
    use std::collections::VecDeque;
    use std::vec::Vec;

    use crate::expo::ResponseCurve;

    // Mock source replaying queued results, then timing out
    struct MockSource {
        queue: VecDeque<Result<Vec<u8>, InputError>>,
    }

    impl MockSource {
        fn new(items: Vec<Result<Vec<u8>, InputError>>) -> Self {
            Self {
                queue: items.into(),
            }
        }
    }

    impl DatagramSource for MockSource {
        fn receive(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, InputError>> {
            let result = match self.queue.pop_front() {
                Some(Ok(data)) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                Some(Err(e)) => Err(e),
                None => Err(InputError::Timeout),
            };
            core::future::ready(result)
        }
    }

    fn encode<T: Serialize>(value: &T) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let len = value.serialize(&mut buf).unwrap();
        buf[..len].to_vec()
    }

    fn touch(active_source: i32) -> Vec<u8> {
        encode(&TouchCommand {
            active_source,
            camera: 2,
            neural_net: 1,
            smart_deploy: 1,
            command1: 1100,
            command2: 1900,
            ..TouchCommand::default()
        })
    }

    fn vehicle_frame<M: mavlink_proto::Message>(encoder: &mut FrameEncoder, msg: &M) -> Vec<u8> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = encoder.encode_v2(msg, &mut buf);
        buf[..len].to_vec()
    }

    #[test]
    fn test_touch_updates_authority() {
        let state = VehicleState::new();
        TouchHandler.handle(&touch(2), &state).unwrap();
        let authority = state.authority.load();
        assert_eq!(authority.active, ActiveSource::Manual);
        assert_eq!(
            authority.manual,
            StagedCommand {
                camera: 2,
                command1: 1100,
                command2: 1900,
            }
        );
        assert_eq!(authority.flags.neural_net, 1);
        assert_eq!(authority.flags.smart_deploy, 1);
        assert_eq!(authority.autonomous, StagedCommand::default());
    }

    #[test]
    fn test_touch_rejects_unknown_source() {
        let state = VehicleState::new();
        TouchHandler.handle(&touch(1), &state).unwrap();
        let before = state.authority.load();
        assert_eq!(
            TouchHandler.handle(&touch(5), &state),
            Err(IngestError::UnknownSource(5))
        );
        assert_eq!(state.authority.load(), before);
    }

    #[test]
    fn test_wrong_length_rejected_state_unchanged() {
        let state = VehicleState::new();
        let mut data = touch(2);
        data.pop();
        assert!(matches!(
            TouchHandler.handle(&data, &state),
            Err(IngestError::Decode(_))
        ));
        assert_eq!(state.authority.load().active, ActiveSource::None);
    }

    #[test]
    fn test_meta_command_stages_autonomous() {
        let state = VehicleState::new();
        let data = encode(&MetaCommand {
            camera: 1,
            command1: 1300,
            command2: 1400,
        });
        MetaCommandHandler.handle(&data, &state).unwrap();
        assert_eq!(
            state.authority.load().autonomous,
            StagedCommand {
                camera: 1,
                command1: 1300,
                command2: 1400,
            }
        );
    }

    #[test]
    fn test_joystick_applies_curve_and_tracks_button() {
        let state = VehicleState::new();
        state.curve.store(ResponseCurve {
            exponent: 2.0,
            dead_zone: 0.1,
        });
        let mut handler = JoystickHandler;
        let data = encode(&JoystickDatagram {
            x: 0.5,
            y: -0.5,
            z: 0.05,
            button: 1.0,
        });
        handler.handle(&data, &state).unwrap();
        let data = encode(&JoystickDatagram {
            x: 0.5,
            y: -0.5,
            z: 0.05,
            button: 0.0,
        });
        handler.handle(&data, &state).unwrap();
        let joystick = state.joystick.load();
        assert!((joystick.x - 0.25).abs() < 1e-6);
        assert!((joystick.y + 0.25).abs() < 1e-6);
        assert_eq!(joystick.z, 0.0);
        assert_eq!(joystick.button, 0);
        assert_eq!(joystick.previous_button, 1);
    }

    #[test]
    fn test_joystick_button_pressed_only_at_one() {
        let state = VehicleState::new();
        let mut handler = JoystickHandler;
        for (button, pressed) in [(0.6, 0), (0.99, 0), (1.0, 1), (1.4, 0), (f32::NAN, 0)] {
            let data = encode(&JoystickDatagram {
                button,
                ..JoystickDatagram::default()
            });
            handler.handle(&data, &state).unwrap();
            assert_eq!(state.joystick.load().button, pressed, "button {button}");
        }
    }

    #[test]
    fn test_usb_joystick_events() {
        let state = VehicleState::new();
        let mut handler = UsbJoystickHandler;
        let axis = |number, value| {
            encode(&JsEvent {
                time_ms: 0,
                value,
                kind: JsEvent::AXIS,
                number,
            })
        };
        handler.handle(&axis(0, i16::MAX), &state).unwrap();
        handler.handle(&axis(1, -i16::MAX), &state).unwrap();
        handler.handle(&axis(5, 100), &state).unwrap();
        let button = encode(&JsEvent {
            time_ms: 0,
            value: 1,
            kind: JsEvent::BUTTON | JsEvent::INIT,
            number: 0,
        });
        handler.handle(&button, &state).unwrap();

        let joystick = state.joystick.load();
        assert!((joystick.x - 1.0).abs() < 1e-6);
        assert!((joystick.y + 1.0).abs() < 1e-6);
        assert_eq!(joystick.z, 0.0);
        assert_eq!(joystick.button, 1);
    }

    #[test]
    fn test_temperature() {
        let state = VehicleState::new();
        let data = encode(&TemperatureReading { celsius: 36.6 });
        TemperatureHandler.handle(&data, &state).unwrap();
        assert_eq!(state.joystick.load().temperature, 36.6);
    }

    #[test]
    fn test_vehicle_telemetry_mapping() {
        let state = VehicleState::new();
        let monitor = Monitor::new();
        let mut handler = VehicleLinkHandler::new(Some(&monitor));
        let mut vehicle = FrameEncoder::new(1, 1);

        let mut rc = RcChannels::default();
        rc.channels[5] = 1100;
        rc.channels[6] = 1900;
        rc.channels[7] = 1500;
        rc.channels[11] = 1535;
        let mut datagram = vehicle_frame(&mut vehicle, &rc);
        datagram.extend(vehicle_frame(
            &mut vehicle,
            &VfrHud {
                groundspeed: 12.0,
                alt: 50.0,
                climb: -1.5,
                heading: 270,
                ..VfrHud::default()
            },
        ));
        datagram.extend(vehicle_frame(
            &mut vehicle,
            &GlobalPositionInt {
                lat: 404_167_750,
                lon: -37_037_900,
                alt: 120_500,
                ..GlobalPositionInt::default()
            },
        ));
        datagram.extend(vehicle_frame(
            &mut vehicle,
            &SysStatus {
                voltage_battery: 22_200,
                current_battery: 1_250,
                battery_remaining: 87,
                ..SysStatus::default()
            },
        ));
        datagram.extend(vehicle_frame(
            &mut vehicle,
            &ScaledImu {
                zacc: -1000,
                ..ScaledImu::default()
            },
        ));
        handler.handle(&datagram, &state).unwrap();

        assert_eq!(
            state.rc_mirror.load(),
            RcMirror {
                deploy1: 1100,
                deploy2: 1900,
                safety: 1500,
                camera: 1535,
            }
        );
        let t = state.telemetry.load();
        assert_eq!(t.groundspeed, 12.0);
        assert_eq!(t.heading, 270.0);
        assert_eq!(t.vertical_speed, -1.5);
        assert!((t.latitude - 40.416_775).abs() < 1e-5);
        assert!((t.longitude + 3.703_79).abs() < 1e-5);
        // GLOBAL_POSITION_INT arrived after VFR_HUD and wins
        assert!((t.altitude - 120.5).abs() < 1e-4);
        assert!((t.accel_z + STANDARD_GRAVITY).abs() < 1e-4);
        let b = state.battery.load();
        assert!((b.voltage - 22.2).abs() < 1e-4);
        assert!((b.current - 12.5).abs() < 1e-4);
        assert_eq!(b.remaining, 87.0);

        let mut received = 0;
        while let Some(event) = monitor.try_next() {
            assert_eq!(event.direction, Direction::Received);
            received += 1;
        }
        assert_eq!(received, 5);
    }

    #[test]
    fn test_heartbeat_sets_link_target() {
        let state = VehicleState::new();
        let mut handler = VehicleLinkHandler::new(None);
        let mut gcs = FrameEncoder::new(250, 190);
        let mut vehicle = FrameEncoder::new(3, 1);

        handler
            .handle(&vehicle_frame(&mut gcs, &Heartbeat::gcs()), &state)
            .unwrap();
        assert!(!state.link.load().heartbeat_seen);

        let hb = Heartbeat {
            mav_type: 2,
            autopilot: 3,
            ..Heartbeat::default()
        };
        handler
            .handle(&vehicle_frame(&mut vehicle, &hb), &state)
            .unwrap();
        let link = state.link.load();
        assert!(link.heartbeat_seen);
        assert_eq!((link.target_system, link.target_component), (3, 1));
    }

    #[test]
    fn test_bad_frame_reported_good_frames_applied() {
        let state = VehicleState::new();
        let mut handler = VehicleLinkHandler::new(None);
        let mut vehicle = FrameEncoder::new(1, 1);
        let mut bad = vehicle_frame(&mut vehicle, &VfrHud::default());
        let last = bad.len() - 1;
        bad[last] ^= 0x5A;
        let mut datagram = bad;
        datagram.extend(vehicle_frame(
            &mut vehicle,
            &VfrHud {
                groundspeed: 3.0,
                ..VfrHud::default()
            },
        ));
        assert!(matches!(
            handler.handle(&datagram, &state),
            Err(IngestError::Link(_))
        ));
        assert_eq!(state.telemetry.load().groundspeed, 3.0);
    }

    #[test]
    fn test_truncated_datagram_does_not_swallow_next() {
        let state = VehicleState::new();
        let mut handler = VehicleLinkHandler::new(None);
        let mut vehicle = FrameEncoder::new(1, 1);

        // Stray start marker plus a partial header at the end of a datagram
        let mut first = vehicle_frame(
            &mut vehicle,
            &VfrHud {
                groundspeed: 1.0,
                ..VfrHud::default()
            },
        );
        first.extend([0xFD, 0x20, 0x00]);
        handler.handle(&first, &state).unwrap();
        assert_eq!(state.telemetry.load().groundspeed, 1.0);

        let second = vehicle_frame(
            &mut vehicle,
            &VfrHud {
                groundspeed: 7.0,
                ..VfrHud::default()
            },
        );
        handler.handle(&second, &state).unwrap();
        assert_eq!(state.telemetry.load().groundspeed, 7.0);
    }

    #[test]
    fn test_ingest_loop_survives_errors() {
        let state = VehicleState::new();
        let shutdown = Shutdown::new();
        let source = MockSource::new(std::vec![
            Err(InputError::Io),
            Ok(std::vec![1, 2, 3]),
            Ok(touch(2)),
        ]);
        let mut ingest = Ingest::new("touch", source, TouchHandler, &state, &shutdown);

        block_on(async {
            assert_eq!(
                ingest.process_one().await,
                Err(IngestError::Input(InputError::Io))
            );
            assert!(matches!(
                ingest.process_one().await,
                Err(IngestError::Decode(_))
            ));
            assert_eq!(ingest.process_one().await, Ok(()));
            // Timeout is not an error
            assert_eq!(ingest.process_one().await, Ok(()));
        });
        assert_eq!(state.authority.load().active, ActiveSource::Manual);
    }

    #[test]
    fn test_ingest_run_stops_on_shutdown() {
        let state = VehicleState::new();
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut ingest = Ingest::new(
            "temperature",
            MockSource::new(Vec::new()),
            TemperatureHandler,
            &state,
            &shutdown,
        );
        block_on(ingest.run());
    }
}
