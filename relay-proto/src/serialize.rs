//! Datagram encoding.
//!
//! The [`Serialize`] trait writes a layout into a caller-provided buffer and
//! returns the number of bytes written, so fanout loops can reuse one stack
//! buffer per iteration.

use crate::types::{
    JoystickDatagram, JsEvent, MetaCommand, MetaTelemetry, OverlayState, TemperatureReading,
    TouchCommand,
};

/// Largest encoded layout, suitable for sizing a shared send buffer.
pub const MAX_DATAGRAM_SIZE: usize = MetaTelemetry::SIZE;

/// Error type for serialization operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerializeError {
    /// The output buffer is too small to hold the datagram.
    BufferTooSmall,
}

impl core::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

/// Sequential little-endian field writer.
struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    fn with_capacity(buf: &'a mut [u8], size: usize) -> Result<Self, SerializeError> {
        if buf.len() < size {
            return Err(SerializeError::BufferTooSmall);
        }
        Ok(Self { buf, pos: 0 })
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    #[inline]
    fn i32(&mut self, value: i32) {
        self.put(&value.to_le_bytes());
    }

    #[inline]
    fn f32(&mut self, value: f32) {
        self.put(&value.to_le_bytes());
    }

    #[inline]
    fn finish(self) -> usize {
        self.pos
    }
}

/// Serialize a datagram layout.
///
/// # Example
///
/// ```
/// use relay_proto::{Serialize, TemperatureReading};
///
/// let mut buf = [0u8; 8];
/// let len = TemperatureReading { celsius: 20.0 }.serialize(&mut buf).unwrap();
/// assert_eq!(len, 4);
/// ```
pub trait Serialize {
    /// Serialize to the provided buffer.
    ///
    /// Returns the number of bytes written on success.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if the buffer is not large enough.
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError>;

    /// Serialize to a `heapless::Vec`.
    #[cfg(feature = "heapless")]
    fn serialize_to_vec<const N: usize>(&self) -> Result<heapless::Vec<u8, N>, SerializeError> {
        let mut vec = heapless::Vec::new();
        vec.resize(N, 0)
            .map_err(|_| SerializeError::BufferTooSmall)?;
        let len = self.serialize(&mut vec)?;
        vec.truncate(len);
        Ok(vec)
    }
}

impl Serialize for TouchCommand {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = FieldWriter::with_capacity(buf, Self::SIZE)?;
        w.i32(self.reserved);
        w.i32(self.active_source);
        w.i32(self.camera);
        w.i32(self.neural_net);
        w.i32(self.smart_deploy);
        w.i32(self.command1);
        w.i32(self.command2);
        Ok(w.finish())
    }
}

impl Serialize for JoystickDatagram {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = FieldWriter::with_capacity(buf, Self::SIZE)?;
        w.f32(self.x);
        w.f32(self.y);
        w.f32(self.z);
        w.f32(self.button);
        Ok(w.finish())
    }
}

impl Serialize for TemperatureReading {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = FieldWriter::with_capacity(buf, Self::SIZE)?;
        w.f32(self.celsius);
        Ok(w.finish())
    }
}

impl Serialize for MetaCommand {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = FieldWriter::with_capacity(buf, Self::SIZE)?;
        w.i32(self.camera);
        w.i32(self.command1);
        w.i32(self.command2);
        Ok(w.finish())
    }
}

impl Serialize for MetaTelemetry {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = FieldWriter::with_capacity(buf, Self::SIZE)?;
        w.i32(self.vehicle_id);
        w.f32(self.roll);
        w.f32(self.pitch);
        w.f32(self.heading);
        w.f32(self.latitude);
        w.f32(self.longitude);
        w.f32(self.altitude);
        w.f32(self.groundspeed);
        w.f32(self.vertical_speed);
        w.f32(self.voltage);
        w.i32(self.deploy1);
        w.i32(self.deploy2);
        w.i32(self.safety);
        w.i32(self.camera);
        Ok(w.finish())
    }
}

impl Serialize for OverlayState {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = FieldWriter::with_capacity(buf, Self::SIZE)?;
        w.f32(self.altitude);
        w.f32(self.battery_remaining);
        w.i32(self.neural_net_toggle);
        w.f32(self.accel_z);
        w.f32(self.temperature);
        Ok(w.finish())
    }
}

impl Serialize for JsEvent {
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let mut w = FieldWriter::with_capacity(buf, Self::SIZE)?;
        w.put(&self.time_ms.to_le_bytes());
        w.put(&self.value.to_le_bytes());
        w.put(&[self.kind, self.number]);
        Ok(w.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{
        parse_joystick, parse_meta_command, parse_meta_telemetry, parse_overlay, parse_touch,
    };

    #[test]
    fn test_touch_round_trip() {
        let cmd = TouchCommand {
            reserved: 0,
            active_source: 1,
            camera: 2,
            neural_net: 1,
            smart_deploy: 1,
            command1: 1100,
            command2: 1900,
        };
        let mut buf = [0u8; TouchCommand::SIZE];
        let len = cmd.serialize(&mut buf).unwrap();
        assert_eq!(parse_touch(&buf[..len]).unwrap(), cmd);
    }

    #[test]
    fn test_joystick_round_trip() {
        let sample = JoystickDatagram {
            x: -0.25,
            y: 0.75,
            z: 0.1,
            button: 1.0,
        };
        let mut buf = [0u8; 32];
        let len = sample.serialize(&mut buf).unwrap();
        assert_eq!(len, JoystickDatagram::SIZE);
        assert_eq!(parse_joystick(&buf[..len]).unwrap(), sample);
    }

    #[test]
    fn test_meta_telemetry_round_trip() {
        let telemetry = MetaTelemetry {
            vehicle_id: 13,
            roll: 0.05,
            pitch: -0.02,
            heading: 271.0,
            latitude: 40.416_775,
            longitude: -3.703_79,
            altitude: 120.5,
            groundspeed: 12.3,
            vertical_speed: -0.4,
            voltage: 22.2,
            deploy1: 1100,
            deploy2: 1900,
            safety: 1500,
            camera: 1535,
        };
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let len = telemetry.serialize(&mut buf).unwrap();
        assert_eq!(len, 56);
        let decoded = parse_meta_telemetry(&buf[..len]).unwrap();
        assert_eq!(decoded.vehicle_id, 13);
        assert!((decoded.latitude - 40.416_775).abs() < f32::EPSILON * 64.0);
        assert_eq!(decoded, telemetry);
    }

    #[test]
    fn test_meta_telemetry_id_comes_first() {
        let telemetry = MetaTelemetry {
            vehicle_id: 0x0102_0304,
            ..MetaTelemetry::default()
        };
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        telemetry.serialize(&mut buf).unwrap();
        assert_eq!(&buf[..4], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_overlay_round_trip() {
        let overlay = OverlayState {
            altitude: 35.0,
            battery_remaining: 87.0,
            neural_net_toggle: 1,
            accel_z: -9.81,
            temperature: 41.5,
        };
        let mut buf = [0u8; OverlayState::SIZE];
        let len = overlay.serialize(&mut buf).unwrap();
        assert_eq!(parse_overlay(&buf[..len]).unwrap(), overlay);
    }

    #[test]
    fn test_meta_command_round_trip() {
        let cmd = MetaCommand {
            camera: 2,
            command1: 1200,
            command2: 1800,
        };
        let mut buf = [0u8; MetaCommand::SIZE];
        let len = cmd.serialize(&mut buf).unwrap();
        assert_eq!(parse_meta_command(&buf[..len]).unwrap(), cmd);
    }

    #[test]
    fn test_buffer_too_small() {
        let mut buf = [0u8; 10];
        assert_eq!(
            OverlayState::default().serialize(&mut buf),
            Err(SerializeError::BufferTooSmall)
        );
    }
}
