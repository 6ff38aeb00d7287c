//! Datagram decoding.
//!
//! Every layout is fixed-size and little-endian. A datagram whose length does
//! not match the layout exactly is rejected, so a truncated or concatenated
//! packet never produces a half-filled value.

use crate::types::{
    JoystickDatagram, JsEvent, MetaCommand, MetaTelemetry, OverlayState, TemperatureReading,
    TouchCommand,
};

/// Error type for datagram decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Datagram length does not match the layout.
    Length { expected: usize, actual: usize },
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Length { expected, actual } => {
                write!(f, "expected {expected} bytes, got {actual}")
            }
        }
    }
}

/// Sequential little-endian field reader over a length-checked datagram.
struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn exact(data: &'a [u8], expected: usize) -> Result<Self, ParseError> {
        if data.len() != expected {
            return Err(ParseError::Length {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, pos: 0 })
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    #[inline]
    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    #[inline]
    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }
}

/// Decode a touch-app control packet.
pub fn parse_touch(data: &[u8]) -> Result<TouchCommand, ParseError> {
    let mut r = FieldReader::exact(data, TouchCommand::SIZE)?;
    Ok(TouchCommand {
        reserved: r.i32(),
        active_source: r.i32(),
        camera: r.i32(),
        neural_net: r.i32(),
        smart_deploy: r.i32(),
        command1: r.i32(),
        command2: r.i32(),
    })
}

/// Decode a network joystick sample.
pub fn parse_joystick(data: &[u8]) -> Result<JoystickDatagram, ParseError> {
    let mut r = FieldReader::exact(data, JoystickDatagram::SIZE)?;
    Ok(JoystickDatagram {
        x: r.f32(),
        y: r.f32(),
        z: r.f32(),
        button: r.f32(),
    })
}

/// Decode a temperature reading.
pub fn parse_temperature(data: &[u8]) -> Result<TemperatureReading, ParseError> {
    let mut r = FieldReader::exact(data, TemperatureReading::SIZE)?;
    Ok(TemperatureReading { celsius: r.f32() })
}

/// Decode an autonomous-controller command packet.
pub fn parse_meta_command(data: &[u8]) -> Result<MetaCommand, ParseError> {
    let mut r = FieldReader::exact(data, MetaCommand::SIZE)?;
    Ok(MetaCommand {
        camera: r.i32(),
        command1: r.i32(),
        command2: r.i32(),
    })
}

/// Decode a meta telemetry packet (used by observers and tests).
pub fn parse_meta_telemetry(data: &[u8]) -> Result<MetaTelemetry, ParseError> {
    let mut r = FieldReader::exact(data, MetaTelemetry::SIZE)?;
    Ok(MetaTelemetry {
        vehicle_id: r.i32(),
        roll: r.f32(),
        pitch: r.f32(),
        heading: r.f32(),
        latitude: r.f32(),
        longitude: r.f32(),
        altitude: r.f32(),
        groundspeed: r.f32(),
        vertical_speed: r.f32(),
        voltage: r.f32(),
        deploy1: r.i32(),
        deploy2: r.i32(),
        safety: r.i32(),
        camera: r.i32(),
    })
}

/// Decode a video overlay packet (used by observers and tests).
pub fn parse_overlay(data: &[u8]) -> Result<OverlayState, ParseError> {
    let mut r = FieldReader::exact(data, OverlayState::SIZE)?;
    Ok(OverlayState {
        altitude: r.f32(),
        battery_remaining: r.f32(),
        neural_net_toggle: r.i32(),
        accel_z: r.f32(),
        temperature: r.f32(),
    })
}

/// Decode one Linux joystick event record.
pub fn parse_js_event(data: &[u8]) -> Result<JsEvent, ParseError> {
    let mut r = FieldReader::exact(data, JsEvent::SIZE)?;
    let time_ms = u32::from_le_bytes(r.take());
    let value = i16::from_le_bytes(r.take());
    let [kind, number] = r.take();
    Ok(JsEvent {
        time_ms,
        value,
        kind,
        number,
    })
}
