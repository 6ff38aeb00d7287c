//! Control-authority state machine.
//!
//! [`step`] is a pure transition function: it takes a snapshot of the groups
//! it depends on and returns the next setpoint, the source to remember for
//! the next tick and whether the setpoint must be dispatched. The control
//! loop owns reading and writing [`VehicleState`](crate::VehicleState).

use crate::state::{
    ActiveSource, ControlAuthority, GimbalConfig, GimbalSetpoint, JoystickSample, StagedCommand,
};

/// Canonical PWM for camera selector 1.
pub const CAMERA_MODE_A_PWM: i32 = 1095;
/// Canonical PWM for camera selector 2.
pub const CAMERA_MODE_B_PWM: i32 = 1535;

/// Everything one tick reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInputs {
    pub authority: ControlAuthority,
    pub joystick: JoystickSample,
    pub gimbal: GimbalConfig,
    pub setpoint: GimbalSetpoint,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub setpoint: GimbalSetpoint,
    /// Value for `ControlAuthority::previous` after this tick.
    pub previous_source: ActiveSource,
    pub dispatch: bool,
}

/// Translate a camera selector to its canonical PWM.
///
/// 1 and 2 map to the two camera modes; any other value passes through.
#[inline]
#[must_use]
pub const fn translate_camera(value: i32) -> i32 {
    match value {
        1 => CAMERA_MODE_A_PWM,
        2 => CAMERA_MODE_B_PWM,
        other => other,
    }
}

/// Clamp into `[min, max]`, checking the upper bound first.
///
/// Unlike `i32::clamp` this never panics on an inverted range; `min` wins.
#[inline]
#[must_use]
pub const fn clamp_pwm(value: i32, min: i32, max: i32) -> i32 {
    let value = if value > max { max } else { value };
    if value < min {
        min
    } else {
        value
    }
}

fn copy_staged(setpoint: &mut GimbalSetpoint, staged: StagedCommand) {
    setpoint.camera = staged.camera;
    setpoint.deploy1 = staged.command1;
    setpoint.deploy2 = staged.command2;
}

fn finalize(setpoint: &mut GimbalSetpoint, gimbal: &GimbalConfig) {
    setpoint.pitch = clamp_pwm(setpoint.pitch, gimbal.pitch_min, gimbal.pitch_max);
    setpoint.yaw = clamp_pwm(setpoint.yaw, gimbal.yaw_min, gimbal.yaw_max);
    setpoint.camera = translate_camera(setpoint.camera);
}

#[inline]
fn integrate(axis: f32, gain: f32) -> i32 {
    // Saturating float-to-int cast; NaN becomes 0
    (axis * gain).round() as i32
}

/// Evaluate one arbiter tick.
///
/// Staged values start zeroed, so a source selected before it has staged
/// anything still dispatches.
#[must_use]
pub fn step(inputs: &TickInputs) -> Transition {
    let authority = &inputs.authority;
    let gimbal = &inputs.gimbal;
    let mut setpoint = inputs.setpoint;

    let dispatch = match authority.active {
        ActiveSource::None => {
            setpoint.camera = 0;
            setpoint.deploy1 = 0;
            setpoint.deploy2 = 0;
            setpoint.pitch = 0;
            setpoint.yaw = 0;
            false
        }
        ActiveSource::Autonomous => {
            copy_staged(&mut setpoint, authority.autonomous);
            finalize(&mut setpoint, gimbal);
            true
        }
        ActiveSource::Manual => {
            let entering = authority.previous != ActiveSource::Manual;
            if entering || inputs.joystick.button == 1 {
                setpoint.pitch = gimbal.neutral_pitch;
                setpoint.yaw = gimbal.neutral_yaw;
            }
            copy_staged(&mut setpoint, authority.manual);
            setpoint.pitch = setpoint
                .pitch
                .saturating_add(integrate(inputs.joystick.y, gimbal.gain));
            setpoint.yaw = setpoint
                .yaw
                .saturating_add(integrate(inputs.joystick.x, gimbal.gain));
            finalize(&mut setpoint, gimbal);
            true
        }
    };

    Transition {
        setpoint,
        previous_source: authority.active,
        dispatch,
    }
}
