//! Datagram payload types: one struct per fixed binary layout.

/// Control packet from the touchscreen ground-control app.
///
/// Wire layout: 7 × `i32`
/// `[unused, active_source, camera, neural_net, smart_deploy, command1, command2]`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchCommand {
    /// First word of the packet. Carried for completeness, never interpreted.
    pub reserved: i32,
    /// Raw control-authority selector (0 = none, 1 = autonomous, 2 = manual).
    pub active_source: i32,
    /// Camera mode selector staged for the manual source.
    pub camera: i32,
    /// Neural-net enable flag.
    pub neural_net: i32,
    /// Smart-deploy flag.
    pub smart_deploy: i32,
    /// First auxiliary command (deploy channel 1) staged for the manual source.
    pub command1: i32,
    /// Second auxiliary command (deploy channel 2) staged for the manual source.
    pub command2: i32,
}

impl TouchCommand {
    /// Encoded size in bytes.
    pub const SIZE: usize = 7 * 4;
}

/// Joystick sample forwarded over the network.
///
/// Wire layout: 4 × `f32` `[x, y, z, button]`. Axis values are raw, before the
/// response curve is applied.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoystickDatagram {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Button state. Sent as a float by the joystick host; 1.0 means pressed.
    pub button: f32,
}

impl JoystickDatagram {
    /// Encoded size in bytes.
    pub const SIZE: usize = 4 * 4;
}

/// Temperature sensor reading. Wire layout: 1 × `f32`.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureReading {
    pub celsius: f32,
}

impl TemperatureReading {
    /// Encoded size in bytes.
    pub const SIZE: usize = 4;
}

/// Command values staged by the autonomous (meta) controller.
///
/// Wire layout: 3 × `i32` `[camera, command1, command2]`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MetaCommand {
    pub camera: i32,
    pub command1: i32,
    pub command2: i32,
}

impl MetaCommand {
    /// Encoded size in bytes.
    pub const SIZE: usize = 3 * 4;
}

/// Vehicle telemetry published to the meta device.
///
/// Wire layout: `i32`, 9 × `f32`, 4 × `i32`.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MetaTelemetry {
    pub vehicle_id: i32,
    pub roll: f32,
    pub pitch: f32,
    pub heading: f32,
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
    pub groundspeed: f32,
    pub vertical_speed: f32,
    pub voltage: f32,
    pub deploy1: i32,
    pub deploy2: i32,
    pub safety: i32,
    pub camera: i32,
}

impl MetaTelemetry {
    /// Encoded size in bytes.
    pub const SIZE: usize = 14 * 4;
}

/// Overlay feed for the video application.
///
/// Wire layout: 2 × `f32`, `i32`, 2 × `f32`
/// `[altitude, battery_remaining, neural_net_toggle, accel_z, temperature]`.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OverlayState {
    pub altitude: f32,
    pub battery_remaining: f32,
    pub neural_net_toggle: i32,
    pub accel_z: f32,
    pub temperature: f32,
}

impl OverlayState {
    /// Encoded size in bytes.
    pub const SIZE: usize = 5 * 4;
}

/// Linux joystick API event (`struct js_event`).
///
/// Wire layout: `u32` timestamp (ms), `i16` value, `u8` type, `u8` number.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JsEvent {
    pub time_ms: u32,
    pub value: i16,
    pub kind: u8,
    pub number: u8,
}

impl JsEvent {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;
    /// Button pressed/released.
    pub const BUTTON: u8 = 0x01;
    /// Axis moved.
    pub const AXIS: u8 = 0x02;
    /// Synthetic event describing the initial device state.
    pub const INIT: u8 = 0x80;

    /// Event type with the init flag masked off.
    #[inline]
    #[must_use]
    pub const fn event_type(&self) -> u8 {
        self.kind & !Self::INIT
    }

    /// Axis value scaled from the driver range to `[-1.0, 1.0]`.
    #[inline]
    #[must_use]
    pub fn axis_value(&self) -> f32 {
        (self.value as f32 / i16::MAX as f32).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_event_type_masks_init_flag() {
        let event = JsEvent {
            kind: JsEvent::AXIS | JsEvent::INIT,
            ..JsEvent::default()
        };
        assert_eq!(event.event_type(), JsEvent::AXIS);
    }

    #[test]
    fn test_js_event_axis_value_range() {
        let full = JsEvent {
            value: i16::MAX,
            ..JsEvent::default()
        };
        assert_eq!(full.axis_value(), 1.0);
        let min = JsEvent {
            value: i16::MIN,
            ..JsEvent::default()
        };
        assert_eq!(min.axis_value(), -1.0);
        let center = JsEvent::default();
        assert_eq!(center.axis_value(), 0.0);
    }
}
