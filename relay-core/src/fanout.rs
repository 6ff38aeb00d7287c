//! Periodic telemetry publishers.
//!
//! A [`Fanout`] snapshots [`VehicleState`] once per period, serializes the
//! resulting datagram and sends it without retry.

use embassy_time::Duration;
use log::{info, warn};
use relay_proto::{MetaTelemetry, OverlayState, Serialize, MAX_DATAGRAM_SIZE};

use crate::output::{DatagramSink, OutputError};
use crate::shutdown::Shutdown;
use crate::state::VehicleState;

/// Overlay period for the video application.
pub const OVERLAY_PERIOD: Duration = Duration::from_millis(50);

/// Default meta telemetry period.
pub const META_PERIOD: Duration = Duration::from_millis(50);

/// Build the video overlay datagram.
pub fn overlay_state(state: &VehicleState) -> OverlayState {
    let telemetry = state.telemetry.load();
    OverlayState {
        altitude: telemetry.altitude,
        battery_remaining: state.battery.load().remaining,
        neural_net_toggle: state.authority.load().flags.neural_net,
        accel_z: telemetry.accel_z,
        temperature: state.joystick.load().temperature,
    }
}

/// Build the meta telemetry datagram.
pub fn meta_telemetry(state: &VehicleState) -> MetaTelemetry {
    let t = state.telemetry.load();
    let rc = state.rc_mirror.load();
    MetaTelemetry {
        vehicle_id: state.identity.load().vehicle_id,
        roll: t.roll,
        pitch: t.pitch,
        heading: t.heading,
        latitude: t.latitude,
        longitude: t.longitude,
        altitude: t.altitude,
        groundspeed: t.groundspeed,
        vertical_speed: t.vertical_speed,
        voltage: state.battery.load().voltage,
        deploy1: rc.deploy1,
        deploy2: rc.deploy2,
        safety: rc.safety,
        camera: rc.camera,
    }
}

/// One periodic publisher.
pub struct Fanout<'a, S, F> {
    name: &'static str,
    sink: S,
    period: Duration,
    build: F,
    state: &'a VehicleState,
    shutdown: &'a Shutdown,
}

impl<'a, S, F, D> Fanout<'a, S, F>
where
    S: DatagramSink,
    F: Fn(&VehicleState) -> D,
    D: Serialize,
{
    pub fn new(
        name: &'static str,
        sink: S,
        period: Duration,
        build: F,
        state: &'a VehicleState,
        shutdown: &'a Shutdown,
    ) -> Self {
        Self {
            name,
            sink,
            period,
            build,
            state,
            shutdown,
        }
    }

    /// Snapshot, serialize and send one datagram.
    ///
    /// # Errors
    ///
    /// Returns the transport or encode error; nothing is retried.
    pub async fn publish_once(&mut self) -> Result<(), OutputError> {
        let datagram = (self.build)(self.state);
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let len = datagram.serialize(&mut buf)?;
        self.sink.send(&buf[..len]).await
    }

    /// Publish every period until shutdown.
    ///
    /// A failing sink is logged when it starts failing and again when it
    /// recovers, not on every period.
    pub async fn run(&mut self) {
        info!("{} fanout started", self.name);
        let mut failing = false;
        while !self.shutdown.is_triggered() {
            match self.publish_once().await {
                Ok(()) if failing => {
                    info!("{}: sending again", self.name);
                    failing = false;
                }
                Ok(()) => {}
                Err(e) if !failing => {
                    warn!("{}: {e}", self.name);
                    failing = true;
                }
                Err(_) => {}
            }
            self.shutdown.sleep(self.period).await;
        }
        info!("{} fanout stopped", self.name);
    }

    #[cfg(test)]
    fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ActiveSource, RcMirror};
    use core::future::Future;
    use embassy_futures::block_on;
    use relay_proto::{parse_meta_telemetry, parse_overlay};
    use std::vec::Vec;

    #[derive(Default)]
    struct MockSink {
        sent: Vec<Vec<u8>>,
        fail: bool,
    }

    impl DatagramSink for MockSink {
        fn send(&mut self, datagram: &[u8]) -> impl Future<Output = Result<(), OutputError>> {
            let result = if self.fail {
                Err(OutputError::NoPeer)
            } else {
                self.sent.push(datagram.to_vec());
                Ok(())
            };
            core::future::ready(result)
        }
    }

    fn populated_state() -> VehicleState {
        let state = VehicleState::new();
        state.telemetry.update(|t| {
            t.altitude = 120.5;
            t.accel_z = -9.8;
            t.roll = 0.1;
            t.heading = 270.0;
            t.latitude = 40.4;
            t.vertical_speed = 1.5;
        });
        state.battery.update(|b| {
            b.voltage = 22.2;
            b.remaining = 87.0;
        });
        state.authority.update(|a| {
            a.active = ActiveSource::Manual;
            a.flags.neural_net = 1;
        });
        state.joystick.update(|j| j.temperature = 36.5);
        state.rc_mirror.store(RcMirror {
            deploy1: 1100,
            deploy2: 1200,
            safety: 1900,
            camera: 1535,
        });
        state
    }

    #[test]
    fn test_overlay_snapshot() {
        let state = populated_state();
        let overlay = overlay_state(&state);
        assert_eq!(
            overlay,
            OverlayState {
                altitude: 120.5,
                battery_remaining: 87.0,
                neural_net_toggle: 1,
                accel_z: -9.8,
                temperature: 36.5,
            }
        );
    }

    #[test]
    fn test_meta_snapshot() {
        let state = populated_state();
        let meta = meta_telemetry(&state);
        assert_eq!(meta.vehicle_id, 13);
        assert_eq!(meta.altitude, 120.5);
        assert_eq!(meta.voltage, 22.2);
        assert_eq!(meta.vertical_speed, 1.5);
        assert_eq!(
            (meta.deploy1, meta.deploy2, meta.safety, meta.camera),
            (1100, 1200, 1900, 1535)
        );
    }

    #[test]
    fn test_publish_once_wire_format() {
        let state = populated_state();
        let shutdown = Shutdown::new();
        let mut overlay = Fanout::new(
            "overlay",
            MockSink::default(),
            OVERLAY_PERIOD,
            overlay_state,
            &state,
            &shutdown,
        );
        let mut meta = Fanout::new(
            "meta",
            MockSink::default(),
            META_PERIOD,
            meta_telemetry,
            &state,
            &shutdown,
        );
        block_on(async {
            overlay.publish_once().await.unwrap();
            meta.publish_once().await.unwrap();
        });

        let sent = overlay.into_sink().sent;
        assert_eq!(sent[0].len(), OverlayState::SIZE);
        assert_eq!(parse_overlay(&sent[0]).unwrap().temperature, 36.5);

        let sent = meta.into_sink().sent;
        assert_eq!(sent[0].len(), MetaTelemetry::SIZE);
        assert_eq!(parse_meta_telemetry(&sent[0]).unwrap().safety, 1900);
    }

    #[test]
    fn test_send_failure_is_reported() {
        let state = VehicleState::new();
        let shutdown = Shutdown::new();
        let sink = MockSink {
            fail: true,
            ..MockSink::default()
        };
        let mut fanout = Fanout::new("meta", sink, META_PERIOD, meta_telemetry, &state, &shutdown);
        assert_eq!(block_on(fanout.publish_once()), Err(OutputError::NoPeer));
    }

    #[test]
    fn test_run_publishes_until_shutdown() {
        let state = VehicleState::new();
        let shutdown = Shutdown::new();
        let mut fanout = Fanout::new(
            "overlay",
            MockSink::default(),
            Duration::from_millis(1),
            overlay_state,
            &state,
            &shutdown,
        );
        block_on(async {
            embassy_futures::select::select(fanout.run(), async {
                embassy_time::Timer::after_millis(20).await;
                shutdown.trigger();
                core::future::pending::<()>().await;
            })
            .await;
        });
        assert!(!fanout.into_sink().sent.is_empty());
    }
}
