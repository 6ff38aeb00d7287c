//! MAVLink frame encoder.

use crate::crc::frame_crc;
use crate::messages::{Message, MAX_PAYLOAD_LEN};
use crate::parser::{HEADER_LEN_V1, HEADER_LEN_V2, MAVLINK_STX_V1, MAVLINK_STX_V2, MAX_FRAME_SIZE};

/// Ground control station system ID.
pub const GCS_SYSTEM_ID: u8 = 255;

/// Ground control station component ID (MAV_COMP_ID_MISSIONPLANNER).
pub const GCS_COMPONENT_ID: u8 = 190;

/// Builds outgoing frames and owns the sequence counter.
///
/// The sequence number wraps at 256 and advances once per encoded frame,
/// so one encoder must be shared by everything writing to the same link.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    system_id: u8,
    component_id: u8,
    sequence: u8,
}

impl FrameEncoder {
    /// Create an encoder sending as `system_id`/`component_id`.
    #[must_use]
    pub const fn new(system_id: u8, component_id: u8) -> Self {
        Self {
            system_id,
            component_id,
            sequence: 0,
        }
    }

    /// Encoder identifying as a ground control station.
    #[must_use]
    pub const fn gcs() -> Self {
        Self::new(GCS_SYSTEM_ID, GCS_COMPONENT_ID)
    }

    /// Sequence number the next frame will carry.
    #[must_use]
    pub const fn next_sequence(&self) -> u8 {
        self.sequence
    }

    fn advance(&mut self) -> u8 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    /// Encode `msg` as a MAVLink 2 frame into `buf`, returning the frame length.
    ///
    /// Trailing zero bytes of the payload are truncated as MAVLink 2 requires.
    pub fn encode_v2<M: Message>(&mut self, msg: &M, buf: &mut [u8; MAX_FRAME_SIZE]) -> usize {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        msg.write_payload(&mut payload);

        let mut len = M::LEN;
        while len > 1 && payload[len - 1] == 0 {
            len -= 1;
        }

        let id = M::ID.to_le_bytes();
        buf[0] = MAVLINK_STX_V2;
        buf[1] = len as u8;
        buf[2] = 0; // incompat flags
        buf[3] = 0; // compat flags
        buf[4] = self.advance();
        buf[5] = self.system_id;
        buf[6] = self.component_id;
        buf[7..10].copy_from_slice(&id[..3]);
        buf[HEADER_LEN_V2..HEADER_LEN_V2 + len].copy_from_slice(&payload[..len]);

        self.finish(buf, HEADER_LEN_V2 + len, M::CRC_EXTRA)
    }

    /// Encode `msg` as a MAVLink 1 frame into `buf`, returning the frame length.
    ///
    /// Only the base fields are sent; extension fields are dropped.
    pub fn encode_v1<M: Message>(&mut self, msg: &M, buf: &mut [u8; MAX_FRAME_SIZE]) -> usize {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        msg.write_payload(&mut payload);

        let len = M::BASE_LEN;
        buf[0] = MAVLINK_STX_V1;
        buf[1] = len as u8;
        buf[2] = self.advance();
        buf[3] = self.system_id;
        buf[4] = self.component_id;
        buf[5] = M::ID as u8;
        buf[HEADER_LEN_V1..HEADER_LEN_V1 + len].copy_from_slice(&payload[..len]);

        self.finish(buf, HEADER_LEN_V1 + len, M::CRC_EXTRA)
    }

    fn finish(&self, buf: &mut [u8; MAX_FRAME_SIZE], crc_start: usize, crc_extra: u8) -> usize {
        let crc = frame_crc(&buf[1..crc_start], crc_extra);
        buf[crc_start..crc_start + 2].copy_from_slice(&crc.to_le_bytes());
        crc_start + 2
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::gcs()
    }
}
