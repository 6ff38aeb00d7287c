//! Byte-at-a-time MAVLink v1/v2 frame parser.
//!
//! The parser is fed one byte at a time and returns a [`Frame`] whenever a
//! complete, checksum-valid frame of a supported message has been seen. It
//! resynchronises on the next start byte after garbage or a bad frame, so a
//! datagram carrying several frames (or noise between them) is handled by
//! feeding it byte by byte.

use crate::crc::frame_crc;
use crate::messages::{self, MavMessage, MAX_PAYLOAD_LEN};

/// MAVLink 1 start byte.
pub const MAVLINK_STX_V1: u8 = 0xFE;

/// MAVLink 2 start byte.
pub const MAVLINK_STX_V2: u8 = 0xFD;

/// MAVLink 1 header length including the start byte.
pub const HEADER_LEN_V1: usize = 6;

/// MAVLink 2 header length including the start byte.
pub const HEADER_LEN_V2: usize = 10;

/// MAVLink 2 signature length.
pub const SIGNATURE_LEN: usize = 13;

/// Incompatibility flag: frame carries a signature.
pub const INCOMPAT_FLAG_SIGNED: u8 = 0x01;

/// Maximum MAVLink frame size (v2 header, payload, checksum, signature).
pub const MAX_FRAME_SIZE: usize = HEADER_LEN_V2 + MAX_PAYLOAD_LEN + 2 + SIGNATURE_LEN;

/// Protocol version of a parsed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Version {
    V1,
    V2,
}

/// A decoded frame with its header fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub version: Version,
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message: MavMessage,
}

/// Parser error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Checksum mismatch.
    CrcError { msg_id: u32 },
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CrcError { msg_id } => write!(f, "checksum mismatch for message {msg_id}"),
        }
    }
}

/// MAVLink frame parser.
pub struct MavlinkParser {
    buffer: [u8; MAX_FRAME_SIZE],
    pos: usize,
    state: ParserState,
}

#[derive(Clone, Copy)]
enum ParserState {
    WaitingForStart,
    ReadingHeader,
    ReadingPayload { expected_len: usize },
}

impl MavlinkParser {
    /// Create a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: [0u8; MAX_FRAME_SIZE],
            pos: 0,
            state: ParserState::WaitingForStart,
        }
    }

    /// Reset parser state.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.state = ParserState::WaitingForStart;
    }

    fn is_v2(&self) -> bool {
        self.buffer[0] == MAVLINK_STX_V2
    }

    fn header_len(&self) -> usize {
        if self.is_v2() {
            HEADER_LEN_V2
        } else {
            HEADER_LEN_V1
        }
    }

    /// Feed a byte to the parser.
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame was parsed.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for a complete frame that fails validation.
    /// The parser is already reset and ready for the next frame.
    pub fn push_byte(&mut self, byte: u8) -> Result<Option<Frame>, ParseError> {
        match self.state {
            ParserState::WaitingForStart => {
                if byte == MAVLINK_STX_V1 || byte == MAVLINK_STX_V2 {
                    self.buffer[0] = byte;
                    self.pos = 1;
                    self.state = ParserState::ReadingHeader;
                }
                Ok(None)
            }
            ParserState::ReadingHeader => {
                self.buffer[self.pos] = byte;
                self.pos += 1;

                let header_len = self.header_len();
                if self.pos >= header_len {
                    let payload_len = self.buffer[1] as usize;
                    let signed = self.is_v2() && self.buffer[2] & INCOMPAT_FLAG_SIGNED != 0;
                    let signature_len = if signed { SIGNATURE_LEN } else { 0 };
                    let expected_len = header_len + payload_len + 2 + signature_len;
                    self.state = ParserState::ReadingPayload { expected_len };
                }
                Ok(None)
            }
            ParserState::ReadingPayload { expected_len } => {
                self.buffer[self.pos] = byte;
                self.pos += 1;

                if self.pos >= expected_len {
                    let result = self.parse_frame();
                    self.reset();
                    result.map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Feed a whole datagram, invoking `on_frame` for every frame found.
    ///
    /// Frame errors are reported through `on_error` and do not stop parsing.
    pub fn push_bytes(
        &mut self,
        bytes: &[u8],
        mut on_frame: impl FnMut(Frame),
        mut on_error: impl FnMut(ParseError),
    ) {
        for &byte in bytes {
            match self.push_byte(byte) {
                Ok(Some(frame)) => on_frame(frame),
                Ok(None) => {}
                Err(e) => on_error(e),
            }
        }
    }

    /// Validate and decode the buffered frame.
    fn parse_frame(&self) -> Result<Frame, ParseError> {
        let payload_len = self.buffer[1] as usize;

        let (version, sequence, system_id, component_id, msg_id) = if self.is_v2() {
            // msgid is 3 bytes at offset 7..10
            let id = u32::from(self.buffer[7])
                | (u32::from(self.buffer[8]) << 8)
                | (u32::from(self.buffer[9]) << 16);
            (Version::V2, self.buffer[4], self.buffer[5], self.buffer[6], id)
        } else {
            (
                Version::V1,
                self.buffer[2],
                self.buffer[3],
                self.buffer[4],
                u32::from(self.buffer[5]),
            )
        };

        // Without a CRC_EXTRA the checksum cannot be verified; surface the ID only
        let Some(crc_extra) = messages::crc_extra(msg_id) else {
            return Ok(Frame {
                version,
                sequence,
                system_id,
                component_id,
                message: MavMessage::Unknown(msg_id),
            });
        };

        let payload_start = self.header_len();
        let crc_start = payload_start + payload_len;

        // Checksum covers header (without STX) and payload, seeded by CRC_EXTRA
        let calculated = frame_crc(&self.buffer[1..crc_start], crc_extra);
        let received =
            u16::from_le_bytes([self.buffer[crc_start], self.buffer[crc_start + 1]]);
        if calculated != received {
            return Err(ParseError::CrcError { msg_id });
        }

        // v2 senders strip trailing zeros; zero-extend back to full size
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        payload[..payload_len].copy_from_slice(&self.buffer[payload_start..crc_start]);

        Ok(Frame {
            version,
            sequence,
            system_id,
            component_id,
            message: messages::decode(msg_id, &payload),
        })
    }
}

impl Default for MavlinkParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;
    use crate::encoder::FrameEncoder;
    use crate::messages::{Heartbeat, Message, VfrHud};

    fn parse_all(bytes: &[u8]) -> (Vec<Frame>, Vec<ParseError>) {
        let mut parser = MavlinkParser::new();
        let mut frames = Vec::new();
        let mut errors = Vec::new();
        parser.push_bytes(bytes, |f| frames.push(f), |e| errors.push(e));
        (frames, errors)
    }

    #[test]
    fn test_parser_ignores_garbage() {
        let mut parser = MavlinkParser::new();
        assert!(parser.push_byte(0x00).unwrap().is_none());
        assert!(parser.push_byte(0x42).unwrap().is_none());
    }

    #[test]
    fn test_parse_v1_heartbeat() {
        // Hand-built v1 frame: STX, len, seq, sys, comp, msgid, payload, crc
        let hb = Heartbeat {
            mav_type: 2,
            autopilot: 3,
            mavlink_version: 3,
            ..Heartbeat::default()
        };
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        hb.write_payload(&mut payload);

        let mut frame = Vec::new();
        frame.extend_from_slice(&[MAVLINK_STX_V1, 9, 7, 1, 1, 0]);
        frame.extend_from_slice(&payload[..9]);
        let crc = frame_crc(&frame[1..], Heartbeat::CRC_EXTRA);
        frame.extend_from_slice(&crc.to_le_bytes());

        let (frames, errors) = parse_all(&frame);
        assert!(errors.is_empty());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].version, Version::V1);
        assert_eq!(frames[0].sequence, 7);
        assert_eq!(frames[0].system_id, 1);
        assert_eq!(frames[0].message, MavMessage::Heartbeat(hb));
    }

    #[test]
    fn test_crc_mismatch_rejected() {
        let mut enc = FrameEncoder::new(1, 1);
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = enc.encode_v2(&Heartbeat::gcs(), &mut buf);
        buf[len - 1] ^= 0xFF;
        let (frames, errors) = parse_all(&buf[..len]);
        assert!(frames.is_empty());
        assert_eq!(errors, [ParseError::CrcError { msg_id: 0 }]);
    }

    #[test]
    fn test_resync_after_garbage_between_frames() {
        let mut enc = FrameEncoder::new(1, 1);
        let hud = VfrHud {
            groundspeed: 12.5,
            alt: 100.0,
            heading: 90,
            ..VfrHud::default()
        };
        let mut bytes = Vec::new();
        let mut buf = [0u8; MAX_FRAME_SIZE];
        bytes.extend_from_slice(&[0x11, 0x22, 0x33]);
        let len = enc.encode_v2(&hud, &mut buf);
        bytes.extend_from_slice(&buf[..len]);
        bytes.extend_from_slice(&[0x00, 0x01]);
        let len = enc.encode_v1(&Heartbeat::gcs(), &mut buf);
        bytes.extend_from_slice(&buf[..len]);

        let (frames, errors) = parse_all(&bytes);
        assert!(errors.is_empty());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].message, MavMessage::VfrHud(hud));
        assert_eq!(frames[1].message, MavMessage::Heartbeat(Heartbeat::gcs()));
    }

    #[test]
    fn test_signed_v2_frame_is_consumed() {
        let mut enc = FrameEncoder::new(1, 1);
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let len = enc.encode_v2(&Heartbeat::gcs(), &mut buf);

        // Set the signed flag, recompute the checksum, append a dummy signature
        let mut bytes = buf[..len - 2].to_vec();
        bytes[2] |= INCOMPAT_FLAG_SIGNED;
        let crc = frame_crc(&bytes[1..], Heartbeat::CRC_EXTRA);
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; SIGNATURE_LEN]);
        // A second, unsigned frame right behind it must still parse
        bytes.extend_from_slice(&buf[..len]);

        let (frames, errors) = parse_all(&bytes);
        assert!(errors.is_empty());
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_unsupported_message_is_unknown() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[MAVLINK_STX_V1, 1, 0, 1, 1, 200, 0x00]);
        bytes.extend_from_slice(&[0x00, 0x00]);
        let (frames, errors) = parse_all(&bytes);
        assert!(errors.is_empty());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].message, MavMessage::Unknown(200));
    }
}
