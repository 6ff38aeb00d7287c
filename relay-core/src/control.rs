//! The arbiter control loop.
//!
//! Each tick snapshots the groups the arbiter reads, evaluates
//! [`arbiter::step`](crate::arbiter::step), writes the transition back and, if
//! required, dispatches the setpoint. After a dispatch the loop waits the
//! dispatch interval; otherwise it waits one tick interval.

use embassy_time::Duration;
use log::{info, warn};

use crate::arbiter::{step, TickInputs};
use crate::dispatch::{DispatchError, LinkDispatcher, SetpointCommand};
use crate::output::DatagramSink;
use crate::shutdown::Shutdown;
use crate::state::VehicleState;

/// Loop pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTiming {
    /// Wait between ticks that do not dispatch.
    pub tick: Duration,
    /// Minimum wait after each dispatch.
    pub dispatch_interval: Duration,
}

impl ControlTiming {
    pub const DEFAULT: Self = Self {
        tick: Duration::from_millis(20),
        dispatch_interval: Duration::from_millis(200),
    };
}

impl Default for ControlTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub struct ControlLoop<'a, T> {
    state: &'a VehicleState,
    dispatcher: &'a LinkDispatcher<'a, T>,
    shutdown: &'a Shutdown,
    timing: ControlTiming,
}

impl<'a, T: DatagramSink> ControlLoop<'a, T> {
    pub fn new(
        state: &'a VehicleState,
        dispatcher: &'a LinkDispatcher<'a, T>,
        shutdown: &'a Shutdown,
        timing: ControlTiming,
    ) -> Self {
        Self {
            state,
            dispatcher,
            shutdown,
            timing,
        }
    }

    /// Evaluate one tick. Returns whether a dispatch was attempted and succeeded.
    ///
    /// # Errors
    ///
    /// A failed dispatch keeps the new setpoint but does not advance the
    /// previous-value fields.
    pub async fn tick(&self) -> Result<bool, DispatchError> {
        let inputs = TickInputs {
            authority: self.state.authority.load(),
            joystick: self.state.joystick.load(),
            gimbal: self.state.gimbal_config.load(),
            setpoint: self.state.setpoint.load(),
        };
        let transition = step(&inputs);

        self.state.setpoint.store(transition.setpoint);
        self.state
            .authority
            .update(|authority| authority.previous = transition.previous_source);
        if inputs.authority.previous != transition.previous_source {
            info!("control authority: {:?}", transition.previous_source);
        }

        if !transition.dispatch {
            return Ok(false);
        }

        let sent = transition.setpoint;
        self.dispatcher
            .send_setpoint(&SetpointCommand::from(&sent))
            .await?;
        self.state.setpoint.update(|sp| {
            sp.previous_pitch = sent.pitch;
            sp.previous_yaw = sent.yaw;
            sp.previous_deploy1 = sent.deploy1;
            sp.previous_deploy2 = sent.deploy2;
        });
        Ok(true)
    }

    /// Run until shutdown.
    ///
    /// Repeated identical errors are logged once.
    pub async fn run(&self) {
        info!("control loop started");
        let mut last_error = None;
        while !self.shutdown.is_triggered() {
            let (wait, error) = match self.tick().await {
                Ok(true) => (self.timing.dispatch_interval, None),
                Ok(false) => (self.timing.tick, None),
                Err(e) => (self.timing.dispatch_interval, Some(e)),
            };
            if let Some(e) = error {
                if last_error != Some(e) {
                    warn!("control: {e}");
                }
            }
            last_error = error;
            self.shutdown.sleep(wait).await;
        }
        info!("control loop stopped");
    }
}
